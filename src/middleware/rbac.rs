// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::AccessLevel,
};

/// Define quais níveis de acesso liberam uma rota.
pub trait RoleDef: Send + Sync + 'static {
    fn allowed() -> &'static [AccessLevel];
}

/// Extrator que barra quem não tem um dos níveis de `T`.
/// Depende do `auth_guard` ter rodado antes.
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Ok(locale) = Locale::from_request_parts(parts, state).await;

        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))?;

        if !T::allowed().contains(&user.0.nivelacesso) {
            tracing::warn!("🚫 {} tentou acessar rota restrita", user.0.email);
            return Err(AppError::Forbidden.to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// NÍVEIS
// ---

pub struct RoleAdmin;
impl RoleDef for RoleAdmin {
    fn allowed() -> &'static [AccessLevel] { &[AccessLevel::Admin] }
}

// Suporte enxerga o painel, mas não altera nada
pub struct RoleSupport;
impl RoleDef for RoleSupport {
    fn allowed() -> &'static [AccessLevel] { &[AccessLevel::Admin, AccessLevel::Suporte] }
}
