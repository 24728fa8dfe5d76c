// src/db/webhook_log_repo.rs

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        admin::Pagination,
        subscription::PaymentProvider,
        webhook::{WebhookLog, WebhookLogUpdate, WebhookStatus},
    },
};

const LOG_COLUMNS: &str = r#"
    id, provider, event_type, status, email, transaction_id,
    payload, error_message, source_ip, created_at, processed_at
"#;

// Auditoria: cada chamada recebida vira uma linha, gravada fora da transação
// do processamento para sobreviver a um rollback.
#[derive(Clone)]
pub struct WebhookLogRepository {
    pool: PgPool,
}

impl WebhookLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_received(
        &self,
        provider: PaymentProvider,
        payload: &Value,
        source_ip: Option<&str>,
    ) -> Result<Uuid, AppError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO webhook_logs (provider, status, payload, source_ip)
            VALUES ($1, 'received', $2, $3)
            RETURNING id
            "#,
        )
        .bind(provider)
        .bind(payload)
        .bind(source_ip)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn finish(&self, id: Uuid, update: &WebhookLogUpdate) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE webhook_logs
            SET status = $2,
                event_type = COALESCE($3, event_type),
                email = COALESCE($4, email),
                transaction_id = COALESCE($5, transaction_id),
                error_message = $6,
                processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.event_type)
        .bind(&update.email)
        .bind(&update.transaction_id)
        .bind(&update.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookLog>, AppError> {
        let query = format!("SELECT {LOG_COLUMNS} FROM webhook_logs WHERE id = $1");
        let log = sqlx::query_as::<_, WebhookLog>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(log)
    }

    pub async fn list(
        &self,
        status: Option<WebhookStatus>,
        provider: Option<PaymentProvider>,
        pagination: Pagination,
    ) -> Result<(Vec<WebhookLog>, i64), AppError> {
        let filter = r#"
            ($1::webhook_status IS NULL OR status = $1)
            AND ($2::payment_provider IS NULL OR provider = $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM webhook_logs WHERE {filter}"
        ))
        .bind(status)
        .bind(provider)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "SELECT {LOG_COLUMNS} FROM webhook_logs WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
        let logs = sqlx::query_as::<_, WebhookLog>(&query)
            .bind(status)
            .bind(provider)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((logs, total))
    }
}
