// src/handlers/admin.rs

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, RoleAdmin, RoleSupport},
    },
    models::{
        admin::{ExpireResponse, ListUsersQuery, PlatformMetrics, UpdateEntitlementPayload, UserDetail, UserPage},
        auth::User,
        webhook::{ListWebhookLogsQuery, WebhookLogPage},
    },
    services::webhook_service::WebhookOutcome,
};

// =============================================================================
//  USUÁRIOS
// =============================================================================

// GET /api/admin/users
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Lista paginada de usuários", body = UserPage),
        (status = 401, description = "Não autorizado"),
        (status = 403, description = "Sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    locale: Locale,
    _role: RequireRole<RoleSupport>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserPage>, ApiError> {
    let page = app_state.admin_service
        .list_users(&query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(page))
}

// GET /api/admin/users/{id}
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "ID do usuário")),
    responses(
        (status = 200, description = "Usuário com histórico de assinaturas", body = UserDetail),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_user(
    State(app_state): State<AppState>,
    locale: Locale,
    _role: RequireRole<RoleSupport>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserDetail>, ApiError> {
    let detail = app_state.admin_service
        .get_user_detail(user_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(detail))
}

// PUT /api/admin/users/{id}/entitlement
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/entitlement",
    tag = "Admin",
    request_body = UpdateEntitlementPayload,
    params(("id" = Uuid, Path, description = "ID do usuário")),
    responses(
        (status = 200, description = "Acesso atualizado", body = User),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Apenas admin"),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_entitlement(
    State(app_state): State<AppState>,
    locale: Locale,
    _role: RequireRole<RoleAdmin>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateEntitlementPayload>,
) -> Result<Json<User>, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let user = app_state.admin_service
        .update_entitlement(&actor, user_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(user))
}

// =============================================================================
//  MÉTRICAS E MANUTENÇÃO
// =============================================================================

// GET /api/admin/platform-metrics
#[utoipa::path(
    get,
    path = "/api/admin/platform-metrics",
    tag = "Admin",
    responses(
        (status = 200, description = "Indicadores da plataforma", body = PlatformMetrics)
    ),
    security(("api_jwt" = []))
)]
pub async fn platform_metrics(
    State(app_state): State<AppState>,
    locale: Locale,
    _role: RequireRole<RoleSupport>,
) -> Result<Json<PlatformMetrics>, ApiError> {
    let metrics = app_state.admin_service
        .platform_metrics()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(metrics))
}

// POST /api/admin/entitlements/expire
#[utoipa::path(
    post,
    path = "/api/admin/entitlements/expire",
    tag = "Admin",
    responses(
        (status = 200, description = "Premium vencidos rebaixados", body = ExpireResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn expire_overdue(
    State(app_state): State<AppState>,
    locale: Locale,
    _role: RequireRole<RoleAdmin>,
) -> Result<Json<ExpireResponse>, ApiError> {
    let downgraded = app_state.admin_service
        .expire_overdue()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(ExpireResponse { downgraded }))
}

// =============================================================================
//  WEBHOOK LOGS
// =============================================================================

// GET /api/admin/webhook-logs
#[utoipa::path(
    get,
    path = "/api/admin/webhook-logs",
    tag = "Admin",
    params(ListWebhookLogsQuery),
    responses(
        (status = 200, description = "Histórico de webhooks recebidos", body = WebhookLogPage)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_webhook_logs(
    State(app_state): State<AppState>,
    locale: Locale,
    _role: RequireRole<RoleSupport>,
    Query(query): Query<ListWebhookLogsQuery>,
) -> Result<Json<WebhookLogPage>, ApiError> {
    let page = app_state.admin_service
        .list_webhook_logs(&query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(page))
}

// POST /api/admin/webhook-logs/{id}/reprocess
#[utoipa::path(
    post,
    path = "/api/admin/webhook-logs/{id}/reprocess",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "ID do log do webhook")),
    responses(
        (status = 200, description = "Resultado do reprocessamento", body = WebhookOutcome),
        (status = 404, description = "Log não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn reprocess_webhook(
    State(app_state): State<AppState>,
    locale: Locale,
    _role: RequireRole<RoleAdmin>,
    Path(log_id): Path<Uuid>,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let outcome = app_state.webhook_service
        .reprocess(log_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(outcome))
}
