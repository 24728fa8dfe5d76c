// src/services/admin_service.rs

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{MetricsRepository, SubscriptionRepository, UserRepository, WebhookLogRepository},
    entitlement::Entitlement,
    models::{
        admin::{ListUsersQuery, Pagination, PlatformMetrics, UpdateEntitlementPayload, UserDetail, UserPage},
        auth::User,
        subscription::PaymentProvider,
        webhook::{ListWebhookLogsQuery, WebhookLogPage},
    },
};

#[derive(Clone)]
pub struct AdminService {
    user_repo: UserRepository,
    subscription_repo: SubscriptionRepository,
    log_repo: WebhookLogRepository,
    metrics_repo: MetricsRepository,
    pool: PgPool,
}

impl AdminService {
    pub fn new(
        user_repo: UserRepository,
        subscription_repo: SubscriptionRepository,
        log_repo: WebhookLogRepository,
        metrics_repo: MetricsRepository,
        pool: PgPool,
    ) -> Self {
        Self { user_repo, subscription_repo, log_repo, metrics_repo, pool }
    }

    pub async fn list_users(&self, query: &ListUsersQuery) -> Result<UserPage, AppError> {
        let pagination = Pagination::new(query.page, query.limit);
        let (items, total) = self.user_repo
            .list(query.search.as_deref(), query.nivel, pagination)
            .await?;

        Ok(UserPage { items, total, page: pagination.page, limit: pagination.limit })
    }

    pub async fn get_user_detail(&self, user_id: Uuid) -> Result<UserDetail, AppError> {
        let user = self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        let subscriptions = self.subscription_repo.list_by_user(user_id).await?;

        Ok(UserDetail { user, subscriptions })
    }

    /// Ajuste manual de acesso feito pelo painel.
    pub async fn update_entitlement(
        &self,
        actor: &User,
        user_id: Uuid,
        payload: &UpdateEntitlementPayload,
    ) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        let target = self.user_repo
            .lock_by_id(&mut *tx, user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let now = Utc::now();
        let entitlement = Entitlement {
            nivelacesso: payload.nivelacesso,
            tipoplano: payload.tipoplano,
            dataassinatura: target.dataassinatura.or(Some(now)),
            dataexpiracao: if payload.acessovitalicio { None } else { payload.dataexpiracao },
            acessovitalicio: payload.acessovitalicio,
        };

        let updated = self.user_repo
            .update_entitlement(&mut *tx, user_id, &entitlement, Some(PaymentProvider::Manual))
            .await?;
        tx.commit().await?;

        tracing::info!(
            "🛠️ Acesso de {} alterado manualmente por {}: {:?}",
            updated.email,
            actor.email,
            updated.nivelacesso
        );
        Ok(updated)
    }

    pub async fn platform_metrics(&self) -> Result<PlatformMetrics, AppError> {
        self.metrics_repo.get_platform_metrics(Utc::now()).await
    }

    pub async fn list_webhook_logs(&self, query: &ListWebhookLogsQuery) -> Result<WebhookLogPage, AppError> {
        let pagination = Pagination::new(query.page, query.limit);
        let (items, total) = self.log_repo
            .list(query.status, query.provider, pagination)
            .await?;

        Ok(WebhookLogPage { items, total, page: pagination.page, limit: pagination.limit })
    }

    /// Rebaixa de uma vez todo premium com data vencida.
    pub async fn expire_overdue(&self) -> Result<u64, AppError> {
        let downgraded = self.user_repo.downgrade_overdue(&self.pool, Utc::now()).await?;
        if downgraded > 0 {
            tracing::info!("⏰ {} usuário(s) premium vencido(s) rebaixado(s)", downgraded);
        }
        Ok(downgraded)
    }
}
