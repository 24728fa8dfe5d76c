// src/models/webhook.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};

use crate::models::subscription::PaymentProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "webhook_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processed,
    Duplicate,
    Ignored,
    Rejected,
    Error,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLog {
    pub id: Uuid,
    pub provider: PaymentProvider,
    #[schema(example = "PURCHASE_APPROVED")]
    pub event_type: Option<String>,
    pub status: WebhookStatus,
    pub email: Option<String>,
    pub transaction_id: Option<String>,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub error_message: Option<String>,
    pub source_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// Resultado final gravado de volta na linha do log
#[derive(Debug, Clone)]
pub struct WebhookLogUpdate {
    pub status: WebhookStatus,
    pub event_type: Option<String>,
    pub email: Option<String>,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListWebhookLogsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<WebhookStatus>,
    pub provider: Option<PaymentProvider>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogPage {
    pub items: Vec<WebhookLog>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// Corpo devolvido ao provedor (sempre com HTTP 200)
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    pub status: WebhookStatus,
    #[schema(example = "Assinatura concedida")]
    pub message: String,
}
