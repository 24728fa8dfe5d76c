// src/db/metrics_repo.rs

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::admin::{PlatformMetrics, ProviderCount, WebhookStatusCount},
};

#[derive(Clone)]
pub struct MetricsRepository {
    pool: PgPool,
}

impl MetricsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_platform_metrics(&self, now: DateTime<Utc>) -> Result<PlatformMetrics, AppError> {
        // Snapshot consistente dos dados
        let mut tx = self.pool.begin().await?;

        // A. Contadores de usuários
        let (total_users, premium_active, lifetime_users, overdue_premium, new_users_last_30_days) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (
                        WHERE nivelacesso = 'premium'
                          AND (acessovitalicio OR dataexpiracao IS NULL OR dataexpiracao > $1)
                    ),
                    COUNT(*) FILTER (WHERE acessovitalicio),
                    COUNT(*) FILTER (
                        WHERE nivelacesso = 'premium'
                          AND NOT acessovitalicio
                          AND dataexpiracao <= $1
                    ),
                    COUNT(*) FILTER (WHERE created_at >= $2)
                FROM users
                "#,
            )
            .bind(now)
            .bind(now - Duration::days(30))
            .fetch_one(&mut *tx)
            .await?;

        // B. Assinaturas ativas por provedor
        let active_subscriptions = sqlx::query_as::<_, ProviderCount>(
            r#"
            SELECT provider, COUNT(*) AS total
            FROM subscriptions
            WHERE status = 'active'
            GROUP BY provider
            ORDER BY total DESC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        // C. Webhooks das últimas 24h por status
        let webhooks_last_24_hours = sqlx::query_as::<_, WebhookStatusCount>(
            r#"
            SELECT status, COUNT(*) AS total
            FROM webhook_logs
            WHERE created_at >= $1
            GROUP BY status
            ORDER BY total DESC
            "#,
        )
        .bind(now - Duration::hours(24))
        .fetch_all(&mut *tx)
        .await?;

        // D. Receita aprovada nos últimos 30 dias
        let revenue_last_30_days = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM subscriptions
            WHERE status IN ('active', 'canceled', 'expired')
              AND start_date >= $1
            "#,
        )
        .bind(now - Duration::days(30))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PlatformMetrics {
            total_users,
            premium_active,
            lifetime_users,
            overdue_premium,
            new_users_last_30_days,
            active_subscriptions,
            webhooks_last_24_hours,
            revenue_last_30_days,
        })
    }
}
