// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Webhooks ---
        handlers::webhooks::hotmart,
        handlers::webhooks::doppus,
        handlers::webhooks::hotmart_probe,
        handlers::webhooks::doppus_probe,

        // --- Admin ---
        handlers::admin::list_users,
        handlers::admin::get_user,
        handlers::admin::update_entitlement,
        handlers::admin::platform_metrics,
        handlers::admin::expire_overdue,
        handlers::admin::list_webhook_logs,
        handlers::admin::reprocess_webhook,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::AccessLevel,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Assinaturas ---
            models::subscription::PlanType,
            models::subscription::PaymentProvider,
            models::subscription::SubscriptionStatus,
            models::subscription::Subscription,

            // --- Webhooks ---
            models::webhook::WebhookStatus,
            models::webhook::WebhookLog,
            models::webhook::WebhookLogPage,
            models::webhook::WebhookResponse,
            services::webhook_service::WebhookOutcome,

            // --- Admin ---
            models::admin::UserPage,
            models::admin::UserDetail,
            models::admin::UpdateEntitlementPayload,
            models::admin::ProviderCount,
            models::admin::WebhookStatusCount,
            models::admin::PlatformMetrics,
            models::admin::ExpireResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação"),
        (name = "Webhooks", description = "Postbacks da Hotmart e da Doppus"),
        (name = "Admin", description = "Painel administrativo: usuários, acessos e métricas")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_webhook_and_admin_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/webhook/hotmart"));
        assert!(paths.contains_key("/webhook/doppus"));
        assert!(paths.contains_key("/api/admin/users/{id}/entitlement"));
        assert!(paths.contains_key("/api/admin/webhook-logs/{id}/reprocess"));
    }
}
