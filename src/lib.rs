// src/lib.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod entitlement;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod webhooks;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

/// Monta o router completo da aplicação.
pub fn app(app_state: AppState) -> Router {
    // Rotas de autenticação
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .merge(
            Router::new()
                .route("/me", get(handlers::auth::get_me))
                .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard)),
        );

    // Painel admin: auth_guard aqui, nível de acesso em cada handler
    let admin_routes = Router::new()
        .route("/users", get(handlers::admin::list_users))
        .route("/users/{id}", get(handlers::admin::get_user))
        .route("/users/{id}/entitlement", put(handlers::admin::update_entitlement))
        .route("/platform-metrics", get(handlers::admin::platform_metrics))
        .route("/entitlements/expire", post(handlers::admin::expire_overdue))
        .route("/webhook-logs", get(handlers::admin::list_webhook_logs))
        .route("/webhook-logs/{id}/reprocess", post(handlers::admin::reprocess_webhook))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    // Webhooks são públicos; a validação é pelo token do provedor
    let legacy_webhook_routes = Router::new()
        .route(
            "/hotmart",
            post(handlers::webhooks::hotmart).get(handlers::webhooks::hotmart_probe),
        )
        .route(
            "/doppus",
            post(handlers::webhooks::doppus).get(handlers::webhooks::doppus_probe),
        );

    let api_webhook_routes = Router::new()
        .route("/hotmart", post(handlers::webhooks::hotmart))
        .route("/doppus", post(handlers::webhooks::doppus));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/webhook", legacy_webhook_routes)
        .nest("/api/webhooks", api_webhook_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
