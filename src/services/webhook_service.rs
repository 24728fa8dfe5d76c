// src/services/webhook_service.rs

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{PgConnection, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::Config,
    db::{user_repo::NewUser, SubscriptionRepository, UserRepository, WebhookLogRepository},
    entitlement::Entitlement,
    models::{
        auth::{AccessLevel, User},
        subscription::{PaymentProvider, PlanType, Subscription, SubscriptionStatus, UpsertSubscription},
        webhook::{WebhookLogUpdate, WebhookStatus},
    },
    services::auth::{available_username, hash_password},
    webhooks::{
        token::{self, TokenCheck},
        NormalizedPayload, PaymentEvent,
    },
};

/// Resultado do processamento de um webhook.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Granted {
        user_id: Uuid,
        user_created: bool,
        plan: PlanType,
    },
    Revoked {
        user_id: Uuid,
    },
    SubscriptionUpdated {
        user_id: Uuid,
        status: SubscriptionStatus,
    },
    Duplicate {
        transaction_id: String,
    },
    Ignored {
        reason: String,
    },
    Rejected {
        reason: String,
    },
    Failed {
        error: String,
    },
}

impl WebhookOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored { reason: reason.into() }
    }

    pub fn log_status(&self) -> WebhookStatus {
        match self {
            Self::Granted { .. } | Self::Revoked { .. } | Self::SubscriptionUpdated { .. } => {
                WebhookStatus::Processed
            }
            Self::Duplicate { .. } => WebhookStatus::Duplicate,
            Self::Ignored { .. } => WebhookStatus::Ignored,
            Self::Rejected { .. } => WebhookStatus::Rejected,
            Self::Failed { .. } => WebhookStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Rejected { .. } | Self::Failed { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::Granted { plan, user_created: true, .. } => {
                format!("Usuário criado com plano {}", plan.as_str())
            }
            Self::Granted { plan, .. } => format!("Plano {} concedido", plan.as_str()),
            Self::Revoked { .. } => "Acesso premium revogado".to_string(),
            Self::SubscriptionUpdated { .. } => "Assinatura atualizada".to_string(),
            Self::Duplicate { transaction_id } => {
                format!("Transação {transaction_id} já processada")
            }
            Self::Ignored { reason } => reason.clone(),
            Self::Rejected { reason } => reason.clone(),
            Self::Failed { error } => error.clone(),
        }
    }

    fn error_message(&self) -> Option<String> {
        match self {
            Self::Rejected { reason } => Some(reason.clone()),
            Self::Failed { error } => Some(error.clone()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct WebhookService {
    user_repo: UserRepository,
    subscription_repo: SubscriptionRepository,
    log_repo: WebhookLogRepository,
    config: Config,
    pool: PgPool,
}

impl WebhookService {
    pub fn new(
        user_repo: UserRepository,
        subscription_repo: SubscriptionRepository,
        log_repo: WebhookLogRepository,
        config: Config,
        pool: PgPool,
    ) -> Self {
        Self { user_repo, subscription_repo, log_repo, config, pool }
    }

    fn expected_token(&self, provider: PaymentProvider) -> Option<&str> {
        match provider {
            PaymentProvider::Hotmart => self.config.hotmart_hottok.as_deref(),
            PaymentProvider::Doppus => self.config.doppus_token.as_deref(),
            PaymentProvider::Manual => None,
        }
    }

    /// Ponto de entrada dos webhooks. Nunca falha: todo erro vira um `WebhookOutcome`
    /// e fica registrado em `webhook_logs`.
    pub async fn process(
        &self,
        provider: PaymentProvider,
        header_token: Option<&str>,
        body: &[u8],
        source_ip: Option<&str>,
    ) -> WebhookOutcome {
        let parsed = serde_json::from_slice::<Value>(body);
        let stored = match &parsed {
            Ok(payload) => payload.clone(),
            Err(_) => json!({ "raw": String::from_utf8_lossy(body) }),
        };

        let log_id = match self.log_repo.insert_received(provider, &stored, source_ip).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!("🔥 Falha ao registrar webhook {}: {}", provider.as_str(), e);
                None
            }
        };

        let (outcome, normalized) = match parsed {
            Err(e) => (
                WebhookOutcome::Rejected { reason: format!("JSON inválido: {e}") },
                None,
            ),
            Ok(payload) => {
                let normalized = NormalizedPayload::from_value(provider, &payload);
                let check = token::verify(
                    self.expected_token(provider),
                    header_token,
                    normalized.token.as_deref(),
                );

                let outcome = if check.is_accepted() {
                    if check == TokenCheck::NotConfigured {
                        tracing::warn!(
                            "⚠️ Token do provedor {} não configurado; webhook aceito sem validação",
                            provider.as_str()
                        );
                    }
                    self.apply(&normalized).await
                } else {
                    let reason = match check {
                        TokenCheck::Missing => "Token do webhook ausente",
                        _ => "Token do webhook inválido",
                    };
                    WebhookOutcome::Rejected { reason: reason.to_string() }
                };
                (outcome, Some(normalized))
            }
        };

        tracing::info!(
            provider = provider.as_str(),
            event = normalized.as_ref().and_then(|n| n.event.as_deref()).unwrap_or("-"),
            transaction = normalized.as_ref().and_then(|n| n.transaction_id.as_deref()).unwrap_or("-"),
            status = ?outcome.log_status(),
            "📬 Webhook processado: {}",
            outcome.message()
        );

        if let Some(log_id) = log_id {
            self.record(log_id, &outcome, normalized.as_ref()).await;
        }

        outcome
    }

    /// Reprocessa o payload guardado num log (sem checar token) e grava o novo resultado.
    pub async fn reprocess(&self, log_id: Uuid) -> Result<WebhookOutcome, AppError> {
        let log = self.log_repo
            .find_by_id(log_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("WebhookLog {log_id}")))?;

        let normalized = NormalizedPayload::from_value(log.provider, &log.payload);
        let outcome = self.apply(&normalized).await;

        tracing::info!("🔁 Webhook {} reprocessado: {}", log_id, outcome.message());
        self.record(log_id, &outcome, Some(&normalized)).await;

        Ok(outcome)
    }

    async fn record(&self, log_id: Uuid, outcome: &WebhookOutcome, normalized: Option<&NormalizedPayload>) {
        let update = WebhookLogUpdate {
            status: outcome.log_status(),
            event_type: normalized.and_then(|n| n.event.clone().or_else(|| n.status.clone())),
            email: normalized.and_then(|n| n.email.clone()),
            transaction_id: normalized.and_then(|n| n.transaction_id.clone()),
            error_message: outcome.error_message(),
        };

        if let Err(e) = self.log_repo.finish(log_id, &update).await {
            tracing::error!("🔥 Falha ao atualizar log do webhook {}: {}", log_id, e);
        }
    }

    async fn apply(&self, payload: &NormalizedPayload) -> WebhookOutcome {
        let event = PaymentEvent::classify(payload.event.as_deref(), payload.status.as_deref());

        let result = match &event {
            PaymentEvent::Approved => self.grant(payload).await,
            PaymentEvent::Canceled => self.cancel(payload).await,
            PaymentEvent::Refunded | PaymentEvent::Chargeback | PaymentEvent::Expired => {
                self.reverse(payload, &event).await
            }
            PaymentEvent::Pending => Ok(WebhookOutcome::ignored("Pagamento pendente")),
            PaymentEvent::Unknown(label) => {
                Ok(WebhookOutcome::ignored(format!("Evento não tratado: {label}")))
            }
        };

        result.unwrap_or_else(|e| {
            tracing::error!("🔥 Erro ao aplicar webhook: {}", e);
            WebhookOutcome::Failed { error: e.to_string() }
        })
    }

    // ---
    // Aprovação: cria/atualiza usuário e assinatura numa única transação
    // ---
    async fn grant(&self, payload: &NormalizedPayload) -> Result<WebhookOutcome, AppError> {
        let Some(transaction_id) = payload.transaction_id.as_deref() else {
            return Ok(WebhookOutcome::ignored("Transação não encontrada no payload"));
        };
        let Some(email) = payload.email.as_deref() else {
            return Ok(WebhookOutcome::Failed {
                error: "E-mail do comprador não encontrado no payload".to_string(),
            });
        };

        let now = Utc::now();
        let plan = PlanType::resolve(payload.plan_hints(), self.config.default_plan);
        let password_hash = self.prepare_buyer_password(Some(email)).await?;

        let mut tx = self.pool.begin().await?;
        self.subscription_repo.lock_transaction_key(&mut *tx, transaction_id).await?;

        if let Some(existing) = self.subscription_repo.lock_by_transaction(&mut *tx, transaction_id).await? {
            if existing.status.is_reversal() {
                return Ok(WebhookOutcome::ignored(format!(
                    "Transação {transaction_id} já estornada; aprovação ignorada"
                )));
            }
            if !existing.status.accepts_approval() {
                return Ok(WebhookOutcome::Duplicate { transaction_id: transaction_id.to_string() });
            }
        }

        let (user, user_created) = self
            .find_or_create_buyer(&mut tx, payload, email, password_hash)
            .await?;

        let entitlement = Entitlement::from_user(&user).grant(plan, now);
        let user = self.user_repo
            .update_entitlement(&mut *tx, user.id, &entitlement, Some(payload.provider))
            .await?;

        let start_date = payload.approved_at.unwrap_or(now);
        self.subscription_repo
            .upsert(&mut *tx, &self.subscription_input(payload, transaction_id, &user, plan, SubscriptionStatus::Active, start_date))
            .await?;

        tx.commit().await?;

        tracing::info!(
            "✅ Plano {} concedido para {} (transação {}, novo usuário: {})",
            plan.as_str(),
            user.email,
            transaction_id,
            user_created
        );

        Ok(WebhookOutcome::Granted { user_id: user.id, user_created, plan })
    }

    // ---
    // Estorno, chargeback e expiração
    // ---
    async fn reverse(&self, payload: &NormalizedPayload, event: &PaymentEvent) -> Result<WebhookOutcome, AppError> {
        let new_status = match event.subscription_status() {
            Some(status) if event.revokes_access() => status,
            _ => return Ok(WebhookOutcome::ignored("Evento não retira acesso")),
        };
        let Some(transaction_id) = payload.transaction_id.as_deref() else {
            return Ok(WebhookOutcome::ignored("Transação não encontrada no payload"));
        };

        let now = Utc::now();
        let password_hash = if new_status.is_reversal() {
            self.prepare_buyer_password(payload.email.as_deref()).await?
        } else {
            None
        };

        let mut tx = self.pool.begin().await?;
        self.subscription_repo.lock_transaction_key(&mut *tx, transaction_id).await?;

        let Some(subscription) = self.subscription_repo.lock_by_transaction(&mut *tx, transaction_id).await? else {
            // Estorno chegou antes da aprovação: grava a transação já estornada
            // para que a aprovação atrasada não conceda acesso.
            let outcome = self
                .record_early_reversal(&mut tx, payload, transaction_id, new_status, password_hash, now)
                .await?;
            tx.commit().await?;
            return Ok(outcome);
        };

        if subscription.status == new_status {
            return Ok(WebhookOutcome::Duplicate { transaction_id: transaction_id.to_string() });
        }
        // Estorno e chargeback são finais: expiração ou outro estorno não sobrescrevem
        if subscription.status.is_reversal() {
            return Ok(WebhookOutcome::ignored(format!(
                "Transação {transaction_id} já estornada"
            )));
        }

        let subscription = self.subscription_repo
            .update_status(&mut *tx, subscription.id, new_status, Some(now), payload.event.as_deref())
            .await?;

        let outcome = self.revoke_if_uncovered(&mut tx, &subscription, now).await?;
        tx.commit().await?;

        if let WebhookOutcome::Revoked { user_id } = &outcome {
            tracing::info!("⛔ Acesso revogado para {} (transação {})", user_id, transaction_id);
        }
        Ok(outcome)
    }

    async fn revoke_if_uncovered(
        &self,
        conn: &mut PgConnection,
        subscription: &Subscription,
        now: chrono::DateTime<Utc>,
    ) -> Result<WebhookOutcome, AppError> {
        let updated = WebhookOutcome::SubscriptionUpdated {
            user_id: subscription.user_id,
            status: subscription.status,
        };

        let covered = self.subscription_repo
            .has_other_active(&mut *conn, subscription.user_id, subscription.id, now)
            .await?;
        if covered {
            return Ok(updated);
        }

        let user = self.user_repo
            .lock_by_id(&mut *conn, subscription.user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        // Vitalício concedido por outra via não cai por causa desta transação
        if user.acessovitalicio && subscription.plan_type != PlanType::Vitalicio {
            return Ok(updated);
        }

        let revoked = Entitlement::from_user(&user).revoke(now);
        self.user_repo
            .update_entitlement(&mut *conn, user.id, &revoked, None)
            .await?;

        Ok(WebhookOutcome::Revoked { user_id: user.id })
    }

    async fn record_early_reversal(
        &self,
        conn: &mut PgConnection,
        payload: &NormalizedPayload,
        transaction_id: &str,
        status: SubscriptionStatus,
        password_hash: Option<String>,
        now: chrono::DateTime<Utc>,
    ) -> Result<WebhookOutcome, AppError> {
        let Some(email) = payload.email.as_deref() else {
            return Ok(WebhookOutcome::ignored(format!("Transação {transaction_id} desconhecida")));
        };
        if !status.is_reversal() {
            return Ok(WebhookOutcome::ignored(format!("Transação {transaction_id} desconhecida")));
        }

        let (user, _) = self.find_or_create_buyer(conn, payload, email, password_hash).await?;
        let plan = PlanType::resolve(payload.plan_hints(), self.config.default_plan);

        let mut input = self.subscription_input(payload, transaction_id, &user, plan, status, payload.approved_at.unwrap_or(now));
        input.end_date = Some(now);
        self.subscription_repo.upsert(&mut *conn, &input).await?;

        tracing::warn!("↩️ Estorno recebido antes da aprovação: transação {}", transaction_id);
        Ok(WebhookOutcome::SubscriptionUpdated { user_id: user.id, status })
    }

    // ---
    // Cancelamento de assinatura: o acesso segue até a expiração
    // ---
    async fn cancel(&self, payload: &NormalizedPayload) -> Result<WebhookOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let subscription = if let Some(transaction_id) = payload.transaction_id.as_deref() {
            self.subscription_repo.lock_transaction_key(&mut *tx, transaction_id).await?;
            self.subscription_repo.lock_by_transaction(&mut *tx, transaction_id).await?
        } else if let Some(code) = payload.subscriber_code.as_deref() {
            self.subscription_repo.lock_latest_by_subscriber_code(&mut *tx, code).await?
        } else if let Some(email) = payload.email.as_deref() {
            self.subscription_repo.lock_latest_active_by_email(&mut *tx, email).await?
        } else {
            None
        };

        let Some(subscription) = subscription else {
            return Ok(WebhookOutcome::ignored("Assinatura não encontrada para cancelamento"));
        };

        if subscription.status == SubscriptionStatus::Canceled {
            return Ok(WebhookOutcome::Duplicate { transaction_id: subscription.transaction_id });
        }
        if subscription.status.is_reversal() {
            return Ok(WebhookOutcome::ignored(format!(
                "Transação {} já estornada",
                subscription.transaction_id
            )));
        }

        let subscription = self.subscription_repo
            .update_status(&mut *tx, subscription.id, SubscriptionStatus::Canceled, None, payload.event.as_deref())
            .await?;
        tx.commit().await?;

        Ok(WebhookOutcome::SubscriptionUpdated {
            user_id: subscription.user_id,
            status: subscription.status,
        })
    }

    // ---
    // Auxiliares
    // ---

    /// Hash da senha aleatória de um comprador que ainda não tem conta.
    /// Calculado antes de abrir a transação para não segurar os locks durante o bcrypt.
    async fn prepare_buyer_password(&self, email: Option<&str>) -> Result<Option<String>, AppError> {
        let Some(email) = email else {
            return Ok(None);
        };
        if self.user_repo.find_by_email(email).await?.is_some() {
            return Ok(None);
        }
        // O comprador define a senha dele pelo fluxo de recuperação
        Ok(Some(hash_password(&Uuid::new_v4().to_string()).await?))
    }

    async fn find_or_create_buyer(
        &self,
        conn: &mut PgConnection,
        payload: &NormalizedPayload,
        email: &str,
        password_hash: Option<String>,
    ) -> Result<(User, bool), AppError> {
        if let Some(user) = self.user_repo.lock_by_email(&mut *conn, email).await? {
            self.user_repo
                .fill_contact(&mut *conn, user.id, payload.name.as_deref(), payload.phone.as_deref())
                .await?;
            return Ok((user, false));
        }

        // Conta apagada entre a checagem e a transação
        let password_hash = match password_hash {
            Some(hash) => hash,
            None => hash_password(&Uuid::new_v4().to_string()).await?,
        };
        let new_user = NewUser {
            username: available_username(&self.user_repo, &mut *conn, email).await?,
            email: email.to_string(),
            name: payload.name.clone(),
            phone: payload.phone.clone(),
            password_hash,
            nivelacesso: AccessLevel::Free,
        };

        if let Some(user) = self.user_repo.insert_if_absent(&mut *conn, &new_user).await? {
            tracing::info!("👤 Usuário criado via webhook: {}", user.email);
            return Ok((user, true));
        }

        // Outro webhook criou o mesmo e-mail no meio do caminho
        let user = self.user_repo
            .lock_by_email(&mut *conn, email)
            .await?
            .ok_or_else(|| AppError::UniqueConstraintViolation("users_username_key".to_string()))?;
        Ok((user, false))
    }

    fn subscription_input(
        &self,
        payload: &NormalizedPayload,
        transaction_id: &str,
        user: &User,
        plan: PlanType,
        status: SubscriptionStatus,
        start_date: chrono::DateTime<Utc>,
    ) -> UpsertSubscription {
        UpsertSubscription {
            user_id: user.id,
            provider: payload.provider,
            transaction_id: transaction_id.to_string(),
            subscriber_code: payload.subscriber_code.clone(),
            plan_type: plan,
            status,
            product_id: payload.product_id.clone(),
            product_name: payload.product_name.clone(),
            offer_code: payload.offer_code.clone(),
            amount: payload.amount,
            currency: payload.currency.clone(),
            start_date,
            end_date: plan.duration().map(|d| start_date + d),
            last_event: payload.event.clone().or_else(|| payload.status.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_maps_to_log_status() {
        let granted = WebhookOutcome::Granted {
            user_id: Uuid::new_v4(),
            user_created: true,
            plan: PlanType::Anual,
        };
        assert_eq!(granted.log_status(), WebhookStatus::Processed);
        assert!(granted.is_success());
        assert_eq!(granted.message(), "Usuário criado com plano anual");

        let duplicate = WebhookOutcome::Duplicate { transaction_id: "HP1".into() };
        assert_eq!(duplicate.log_status(), WebhookStatus::Duplicate);
        assert!(duplicate.is_success());

        let rejected = WebhookOutcome::Rejected { reason: "Token do webhook inválido".into() };
        assert_eq!(rejected.log_status(), WebhookStatus::Rejected);
        assert!(!rejected.is_success());
        assert_eq!(rejected.error_message().as_deref(), Some("Token do webhook inválido"));

        let failed = WebhookOutcome::Failed { error: "boom".into() };
        assert_eq!(failed.log_status(), WebhookStatus::Error);
        assert!(!failed.is_success());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = WebhookOutcome::Ignored { reason: "Pagamento pendente".into() };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({ "outcome": "ignored", "reason": "Pagamento pendente" }));
    }
}
