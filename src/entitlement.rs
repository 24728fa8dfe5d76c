//! Regras de concessão e revogação de acesso premium.
//!
//! Tudo aqui é puro (sem banco): o serviço de webhooks lê o estado atual do
//! usuário, aplica a regra e grava o resultado na mesma transação.

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    auth::{AccessLevel, User},
    subscription::PlanType,
};

impl PlanType {
    /// Duração do plano; `None` para o vitalício.
    pub fn duration(self) -> Option<Duration> {
        match self {
            PlanType::Mensal => Some(Duration::days(30)),
            PlanType::Trimestral => Some(Duration::days(90)),
            PlanType::Semestral => Some(Duration::days(180)),
            PlanType::Anual => Some(Duration::days(365)),
            PlanType::Vitalicio => None,
        }
    }

    /// Descobre o plano pelos textos do payload (nome do plano, oferta, produto).
    /// A primeira dica que casar com alguma palavra-chave vence.
    pub fn resolve<'a, I>(hints: I, default: PlanType) -> PlanType
    where
        I: IntoIterator<Item = &'a str>,
    {
        hints
            .into_iter()
            .find_map(plan_from_text)
            .unwrap_or(default)
    }
}

fn plan_from_text(text: &str) -> Option<PlanType> {
    let text = text.to_lowercase();

    const RULES: &[(PlanType, &[&str])] = &[
        (PlanType::Vitalicio, &["vitalic", "vitalíc", "lifetime"]),
        (PlanType::Anual, &["anual", "annual", "yearly", "12 meses", "1 ano"]),
        (PlanType::Semestral, &["semestral", "6 meses"]),
        (PlanType::Trimestral, &["trimestral", "quarterly", "3 meses"]),
        (PlanType::Mensal, &["mensal", "monthly", "1 mes", "1 mês"]),
    ];

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(plan, _)| *plan)
}

/// Os campos de acesso guardados na linha do usuário.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub nivelacesso: AccessLevel,
    pub tipoplano: Option<PlanType>,
    pub dataassinatura: Option<DateTime<Utc>>,
    pub dataexpiracao: Option<DateTime<Utc>>,
    pub acessovitalicio: bool,
}

impl Entitlement {
    pub fn from_user(user: &User) -> Self {
        Self {
            nivelacesso: user.nivelacesso,
            tipoplano: user.tipoplano,
            dataassinatura: user.dataassinatura,
            dataexpiracao: user.dataexpiracao,
            acessovitalicio: user.acessovitalicio,
        }
    }

    /// Concede o plano sem nunca rebaixar o que o usuário já tem:
    /// vitalício é permanente e a expiração só avança.
    pub fn grant(&self, plan: PlanType, now: DateTime<Utc>) -> Self {
        let nivelacesso = if self.nivelacesso.is_staff() {
            self.nivelacesso
        } else {
            AccessLevel::Premium
        };

        let already_premium = self.nivelacesso == AccessLevel::Premium && !self.is_overdue(now);
        let dataassinatura = match (already_premium, self.dataassinatura) {
            (true, Some(start)) => Some(start),
            _ => Some(now),
        };

        if self.acessovitalicio || plan == PlanType::Vitalicio {
            return Self {
                nivelacesso,
                tipoplano: Some(PlanType::Vitalicio),
                dataassinatura,
                dataexpiracao: None,
                acessovitalicio: true,
            };
        }

        let candidate = plan.duration().map(|d| now + d);
        let dataexpiracao = match (self.dataexpiracao, candidate) {
            (Some(current), Some(new)) if already_premium => Some(current.max(new)),
            (_, new) => new,
        };

        // Mantém o plano maior quando a expiração atual vence a nova
        let tipoplano = match (self.tipoplano, self.dataexpiracao, candidate) {
            (Some(current_plan), Some(current), Some(new)) if already_premium && current > new => {
                Some(current_plan)
            }
            _ => Some(plan),
        };

        Self {
            nivelacesso,
            tipoplano,
            dataassinatura,
            dataexpiracao,
            acessovitalicio: false,
        }
    }

    /// Retira o acesso premium. Cargos da equipe mantêm o nível.
    pub fn revoke(&self, now: DateTime<Utc>) -> Self {
        let nivelacesso = if self.nivelacesso.is_staff() {
            self.nivelacesso
        } else {
            AccessLevel::Free
        };

        Self {
            nivelacesso,
            tipoplano: None,
            dataassinatura: self.dataassinatura,
            dataexpiracao: Some(now),
            acessovitalicio: false,
        }
    }

    /// Premium vencido volta a free; as datas ficam para o histórico.
    pub fn lapse(&self) -> Self {
        Self {
            nivelacesso: AccessLevel::Free,
            tipoplano: None,
            ..self.clone()
        }
    }

    /// Premium com data vencida e sem vitalício.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.nivelacesso == AccessLevel::Premium
            && !self.acessovitalicio
            && self.dataexpiracao.is_some_and(|exp| exp <= now)
    }
}
