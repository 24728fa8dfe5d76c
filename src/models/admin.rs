// src/models/admin.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{
    auth::{AccessLevel, User},
    subscription::{PaymentProvider, PlanType, Subscription},
    webhook::WebhookStatus,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// Paginação normalizada (página começa em 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

// --- USUÁRIOS ---

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Busca parcial por e-mail, username ou nome
    pub search: Option<String>,
    pub nivel: Option<AccessLevel>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub items: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user: User,
    pub subscriptions: Vec<Subscription>,
}

// Alteração manual de entitlement feita pelo admin
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_entitlement_consistency"))]
pub struct UpdateEntitlementPayload {
    pub nivelacesso: AccessLevel,
    pub tipoplano: Option<PlanType>,
    pub dataexpiracao: Option<DateTime<Utc>>,
    #[serde(default)]
    pub acessovitalicio: bool,
}

fn validate_entitlement_consistency(
    payload: &UpdateEntitlementPayload,
) -> Result<(), validator::ValidationError> {
    // Premium sem vitalício precisa de uma data de expiração
    if payload.nivelacesso == AccessLevel::Premium
        && !payload.acessovitalicio
        && payload.dataexpiracao.is_none()
    {
        let mut err = validator::ValidationError::new("ExpirationRequired");
        err.message = Some("Premium não vitalício exige 'dataexpiracao'.".into());
        return Err(err);
    }
    Ok(())
}

// --- MÉTRICAS ---

#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCount {
    pub provider: PaymentProvider,
    pub total: i64,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatusCount {
    pub status: WebhookStatus,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetrics {
    pub total_users: i64,
    pub premium_active: i64,
    pub lifetime_users: i64,
    pub overdue_premium: i64,
    pub new_users_last_30_days: i64,
    pub active_subscriptions: Vec<ProviderCount>,
    pub webhooks_last_24_hours: Vec<WebhookStatusCount>,
    #[schema(value_type = f64, example = 15760.5)]
    pub revenue_last_30_days: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpireResponse {
    pub downgraded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let p = Pagination::new(Some(0), Some(1000));
        assert_eq!(p, Pagination { page: 1, limit: MAX_PAGE_SIZE });
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(Some(3), None);
        assert_eq!(p.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn premium_without_expiration_requires_lifetime() {
        let payload = UpdateEntitlementPayload {
            nivelacesso: AccessLevel::Premium,
            tipoplano: Some(PlanType::Anual),
            dataexpiracao: None,
            acessovitalicio: false,
        };
        assert!(payload.validate().is_err());

        let lifetime = UpdateEntitlementPayload {
            acessovitalicio: true,
            tipoplano: Some(PlanType::Vitalicio),
            ..payload
        };
        assert!(lifetime.validate().is_ok());
    }
}
