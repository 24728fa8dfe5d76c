// src/webhooks/events.rs

use serde::Serialize;

use crate::models::subscription::SubscriptionStatus;

/// O que o webhook significa para o acesso do usuário.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEvent {
    /// Pagamento confirmado: concede ou renova o plano
    Approved,
    /// Assinatura cancelada: o acesso segue até a data de expiração
    Canceled,
    Refunded,
    Chargeback,
    Expired,
    /// Boleto impresso, pagamento atrasado etc. Só registramos.
    Pending,
    Unknown(String),
}

impl PaymentEvent {
    /// Classifica pelo nome do evento e, se ele não disser nada, pelo status da compra.
    pub fn classify(event: Option<&str>, status: Option<&str>) -> Self {
        let from_event = event.and_then(Self::from_label);
        let from_status = status.and_then(Self::from_label);

        match (from_event, from_status) {
            (Some(found), _) | (None, Some(found)) => found,
            (None, None) => Self::Unknown(
                event
                    .or(status)
                    .map(str::to_string)
                    .unwrap_or_else(|| "sem evento".to_string()),
            ),
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let label = label.strip_prefix("purchase_").unwrap_or(&label);

        let event = match label {
            "approved" | "complete" | "completed" | "paid" | "aprovado" | "aprovada" | "pago" => {
                Self::Approved
            }
            "canceled" | "cancelled" | "cancelado" | "cancelada" | "subscription_cancellation" => {
                Self::Canceled
            }
            "refunded" | "reembolsado" | "reembolsada" | "estornado" => Self::Refunded,
            "chargeback" | "protest" | "dispute" => Self::Chargeback,
            "expired" | "expirado" | "expirada" => Self::Expired,
            "delayed" | "billet_printed" | "waiting_payment" | "pending" | "pendente"
            | "aguardando_pagamento" => Self::Pending,
            _ => return None,
        };
        Some(event)
    }

    /// Eventos que retiram o acesso na hora.
    pub fn revokes_access(&self) -> bool {
        matches!(self, Self::Refunded | Self::Chargeback | Self::Expired)
    }

    /// Status que a assinatura passa a ter depois do evento.
    pub fn subscription_status(&self) -> Option<SubscriptionStatus> {
        match self {
            Self::Approved => Some(SubscriptionStatus::Active),
            Self::Canceled => Some(SubscriptionStatus::Canceled),
            Self::Refunded => Some(SubscriptionStatus::Refunded),
            Self::Chargeback => Some(SubscriptionStatus::Chargeback),
            Self::Expired => Some(SubscriptionStatus::Expired),
            Self::Pending | Self::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_hotmart_events() {
        assert_eq!(PaymentEvent::classify(Some("PURCHASE_APPROVED"), None), PaymentEvent::Approved);
        assert_eq!(PaymentEvent::classify(Some("PURCHASE_COMPLETE"), None), PaymentEvent::Approved);
        assert_eq!(PaymentEvent::classify(Some("PURCHASE_REFUNDED"), None), PaymentEvent::Refunded);
        assert_eq!(PaymentEvent::classify(Some("PURCHASE_PROTEST"), None), PaymentEvent::Chargeback);
        assert_eq!(
            PaymentEvent::classify(Some("SUBSCRIPTION_CANCELLATION"), None),
            PaymentEvent::Canceled
        );
        assert_eq!(
            PaymentEvent::classify(Some("PURCHASE_BILLET_PRINTED"), None),
            PaymentEvent::Pending
        );
    }

    #[test]
    fn event_wins_over_status() {
        let event = PaymentEvent::classify(Some("PURCHASE_REFUNDED"), Some("APPROVED"));
        assert_eq!(event, PaymentEvent::Refunded);
    }

    #[test]
    fn falls_back_to_status_when_event_is_unknown_or_missing() {
        assert_eq!(
            PaymentEvent::classify(Some("order.updated"), Some("approved")),
            PaymentEvent::Approved
        );
        assert_eq!(PaymentEvent::classify(None, Some("Reembolsado")), PaymentEvent::Refunded);
    }

    #[test]
    fn unknown_keeps_the_received_label() {
        assert_eq!(
            PaymentEvent::classify(Some("CLUB_FIRST_ACCESS"), Some("whatever")),
            PaymentEvent::Unknown("CLUB_FIRST_ACCESS".into())
        );
        assert_eq!(
            PaymentEvent::classify(None, None),
            PaymentEvent::Unknown("sem evento".into())
        );
    }

    #[test]
    fn only_reversals_and_expiry_revoke() {
        assert!(PaymentEvent::Refunded.revokes_access());
        assert!(PaymentEvent::Chargeback.revokes_access());
        assert!(PaymentEvent::Expired.revokes_access());
        assert!(!PaymentEvent::Canceled.revokes_access());
        assert!(!PaymentEvent::Approved.revokes_access());
    }
}
