// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::subscription::{PaymentProvider, PlanType};

// Mapeia o CREATE TYPE nivel_acesso do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "nivel_acesso", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Free,
    Premium,
    Designer,
    DesignerAdm,
    Suporte,
    Admin,
}

impl AccessLevel {
    /// Cargos da equipe: webhooks de pagamento nunca mexem neles.
    pub fn is_staff(self) -> bool {
        matches!(
            self,
            AccessLevel::Designer | AccessLevel::DesignerAdm | AccessLevel::Suporte | AccessLevel::Admin
        )
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "maria.silva")]
    pub username: String,
    #[schema(example = "maria@exemplo.com")]
    pub email: String,
    pub name: Option<String>,
    #[schema(example = "5511999998888")]
    pub phone: Option<String>,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    pub password_hash: String,

    // Entitlement
    pub nivelacesso: AccessLevel,
    pub origemassinatura: Option<PaymentProvider>,
    pub tipoplano: Option<PlanType>,
    pub dataassinatura: Option<DateTime<Utc>>,
    pub dataexpiracao: Option<DateTime<Utc>>,
    pub acessovitalicio: bool,

    pub isactive: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    #[schema(example = "admin@designauto.com.br")]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}
