// src/models/subscription.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "plan_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Mensal,
    Trimestral,
    Semestral,
    Anual,
    Vitalicio,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Mensal => "mensal",
            PlanType::Trimestral => "trimestral",
            PlanType::Semestral => "semestral",
            PlanType::Anual => "anual",
            PlanType::Vitalicio => "vitalicio",
        }
    }
}

impl std::str::FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mensal" => Ok(PlanType::Mensal),
            "trimestral" => Ok(PlanType::Trimestral),
            "semestral" => Ok(PlanType::Semestral),
            "anual" => Ok(PlanType::Anual),
            "vitalicio" | "vitalício" => Ok(PlanType::Vitalicio),
            other => Err(format!("plano desconhecido: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Hotmart,
    Doppus,
    Manual,
}

impl PaymentProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentProvider::Hotmart => "hotmart",
            PaymentProvider::Doppus => "doppus",
            PaymentProvider::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Pending,
    Canceled,
    Refunded,
    Chargeback,
    Expired,
}

impl SubscriptionStatus {
    /// Estorno e chargeback não voltam atrás: uma aprovação atrasada não reativa a transação.
    pub fn is_reversal(self) -> bool {
        matches!(self, SubscriptionStatus::Refunded | SubscriptionStatus::Chargeback)
    }

    /// Só uma transação que nunca foi liberada aceita aprovação. Ativa, cancelada ou
    /// expirada já concedeu acesso uma vez; reenvio da aprovação não concede de novo.
    pub fn accepts_approval(self) -> bool {
        self == SubscriptionStatus::Pending
    }
}

// --- ASSINATURA ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: PaymentProvider,
    #[schema(example = "HP17715690036014")]
    pub transaction_id: String,
    pub subscriber_code: Option<String>,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub offer_code: Option<String>,
    #[schema(value_type = Option<f64>, example = 197.0)]
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub last_event: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Dados para o UPSERT por transaction_id
#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub user_id: Uuid,
    pub provider: PaymentProvider,
    pub transaction_id: String,
    pub subscriber_code: Option<String>,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub offer_code: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub last_event: Option<String>,
}
