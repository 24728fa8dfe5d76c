// src/db/subscription_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::subscription::{Subscription, SubscriptionStatus, UpsertSubscription},
};

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, provider, transaction_id, subscriber_code, plan_type, status,
    product_id, product_name, offer_code, amount, currency,
    start_date, end_date, last_event, created_at, updated_at
"#;

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Serializa o processamento de uma mesma transação do provedor, mesmo antes da linha existir.
    pub async fn lock_transaction_key<'e, E>(
        &self,
        executor: E,
        transaction_id: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(transaction_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Trava a assinatura da transação (se existir) até o fim da transação do banco.
    pub async fn lock_by_transaction<'e, E>(
        &self,
        executor: E,
        transaction_id: &str,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE transaction_id = $1 FOR UPDATE"
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(transaction_id)
            .fetch_optional(executor)
            .await?;
        Ok(subscription)
    }

    // Cancelamentos de assinatura da Hotmart chegam só com o código do assinante
    pub async fn lock_latest_by_subscriber_code<'e, E>(
        &self,
        executor: E,
        subscriber_code: &str,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
            WHERE subscriber_code = $1
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(subscriber_code)
            .fetch_optional(executor)
            .await?;
        Ok(subscription)
    }

    pub async fn lock_latest_active_by_email<'e, E>(
        &self,
        executor: E,
        email: &str,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
            WHERE status = 'active'
              AND user_id = (SELECT id FROM users WHERE LOWER(email) = LOWER($1))
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(email)
            .fetch_optional(executor)
            .await?;
        Ok(subscription)
    }

    /// Uma linha por transaction_id: reenvios do mesmo webhook só atualizam a linha.
    pub async fn upsert<'e, E>(
        &self,
        executor: E,
        input: &UpsertSubscription,
    ) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            r#"
            INSERT INTO subscriptions (
                user_id, provider, transaction_id, subscriber_code, plan_type, status,
                product_id, product_name, offer_code, amount, currency,
                start_date, end_date, last_event
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (transaction_id)
            DO UPDATE SET
                user_id = EXCLUDED.user_id,
                subscriber_code = COALESCE(EXCLUDED.subscriber_code, subscriptions.subscriber_code),
                plan_type = EXCLUDED.plan_type,
                status = EXCLUDED.status,
                product_id = COALESCE(EXCLUDED.product_id, subscriptions.product_id),
                product_name = COALESCE(EXCLUDED.product_name, subscriptions.product_name),
                offer_code = COALESCE(EXCLUDED.offer_code, subscriptions.offer_code),
                amount = COALESCE(EXCLUDED.amount, subscriptions.amount),
                currency = COALESCE(EXCLUDED.currency, subscriptions.currency),
                end_date = EXCLUDED.end_date,
                last_event = EXCLUDED.last_event,
                updated_at = NOW()
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(input.user_id)
            .bind(input.provider)
            .bind(&input.transaction_id)
            .bind(&input.subscriber_code)
            .bind(input.plan_type)
            .bind(input.status)
            .bind(&input.product_id)
            .bind(&input.product_name)
            .bind(&input.offer_code)
            .bind(input.amount)
            .bind(&input.currency)
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(&input.last_event)
            .fetch_one(executor)
            .await?;
        Ok(subscription)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
        last_event: Option<&str>,
    ) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            r#"
            UPDATE subscriptions
            SET status = $2,
                end_date = COALESCE($3, end_date),
                last_event = COALESCE($4, last_event),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(status)
            .bind(end_date)
            .bind(last_event)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Subscription {id}")))?;
        Ok(subscription)
    }

    /// Existe outra assinatura ativa e ainda válida para o usuário?
    pub async fn has_other_active<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        exclude_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM subscriptions
                WHERE user_id = $1
                  AND id <> $2
                  AND status = 'active'
                  AND (end_date IS NULL OR end_date > $3)
            )
            "#,
        )
        .bind(user_id)
        .bind(exclude_id)
        .bind(now)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Subscription>, AppError> {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let subscriptions = sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(subscriptions)
    }
}
