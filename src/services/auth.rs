// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{user_repo::NewUser, UserRepository},
    entitlement::Entitlement,
    models::auth::{AccessLevel, Claims, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    pool: PgPool,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String, pool: PgPool) -> Self {
        Self { user_repo, jwt_secret, pool }
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self.user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !user.isactive {
            return Err(AppError::InvalidCredentials);
        }

        let is_password_valid = verify_password(password, &user.password_hash).await?;
        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        // Premium vencido perde o acesso no primeiro login depois da data
        let current = Entitlement::from_user(&user);
        if current.is_overdue(Utc::now()) {
            tracing::info!("⏰ Premium vencido rebaixado no login: {}", user.email);
            self.user_repo
                .update_entitlement(&self.pool, user.id, &current.lapse(), None)
                .await?;
        }

        self.create_token(user.id)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self.user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if !user.isactive {
            return Err(AppError::InvalidToken);
        }
        Ok(user)
    }

    /// Garante que a conta de admin configurada exista (e com a senha atual).
    pub async fn ensure_bootstrap_admin(&self, email: &str, password: &str) -> Result<User, AppError> {
        let password_hash = hash_password(password).await?;
        let mut tx = self.pool.begin().await?;

        let admin = match self.user_repo.lock_by_email(&mut *tx, email).await? {
            Some(existing) => {
                self.user_repo
                    .update_password(&mut *tx, existing.id, &password_hash)
                    .await?;
                let entitlement = Entitlement {
                    nivelacesso: AccessLevel::Admin,
                    ..Entitlement::from_user(&existing)
                };
                self.user_repo
                    .update_entitlement(&mut *tx, existing.id, &entitlement, None)
                    .await?
            }
            None => {
                let username = available_username(&self.user_repo, &mut *tx, email).await?;
                let new_user = NewUser {
                    username,
                    email: email.to_string(),
                    name: Some("Administrador".to_string()),
                    phone: None,
                    password_hash,
                    nivelacesso: AccessLevel::Admin,
                };
                self.user_repo.create_user(&mut *tx, &new_user).await?
            }
        };

        tx.commit().await?;
        Ok(admin)
    }

    pub fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

// Executa o hashing em um thread separado
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password_clone = password.to_owned();
    let password_hash_clone = password_hash.to_owned();
    let is_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
    Ok(is_valid)
}

/// "Maria.Silva+promo@gmail.com" -> "maria.silva"
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let local = local.split('+').next().unwrap_or_default();

    let cleaned: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    if cleaned.is_empty() {
        "usuario".to_string()
    } else {
        cleaned
    }
}

/// Username livre derivado do e-mail; em caso de colisão ganha um sufixo aleatório.
pub async fn available_username(
    user_repo: &UserRepository,
    conn: &mut sqlx::PgConnection,
    email: &str,
) -> Result<String, AppError> {
    let base = username_from_email(email);
    if !user_repo.username_exists(&mut *conn, &base).await? {
        return Ok(base);
    }

    loop {
        let suffix = Uuid::new_v4().simple().to_string();
        let candidate = format!("{}-{}", base, &suffix[..6]);
        if !user_repo.username_exists(&mut *conn, &candidate).await? {
            return Ok(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/designauto_test")
            .unwrap();
        AuthService::new(UserRepository::new(pool.clone()), "segredo-de-teste".into(), pool)
    }

    #[test]
    fn username_strips_tags_and_symbols() {
        assert_eq!(username_from_email("Maria.Silva+promo@gmail.com"), "maria.silva");
        assert_eq!(username_from_email("joão_123@exemplo.com"), "joo_123");
        assert_eq!(username_from_email("+++@exemplo.com"), "usuario");
    }

    #[tokio::test]
    async fn token_carries_the_user_id() {
        let service = service();
        let user_id = Uuid::new_v4();

        let token = service.create_token(user_id).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret("segredo-de-teste".as_ref()),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.sub, user_id);
        assert!(data.claims.exp > data.claims.iat);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let service = service();
        let token = service.create_token(Uuid::new_v4()).unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret("outro-segredo".as_ref()),
            &Validation::default(),
        );

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn hashed_password_verifies() {
        let hashed = hash_password("senha-forte").await.unwrap();
        assert!(verify_password("senha-forte", &hashed).await.unwrap());
        assert!(!verify_password("senha-fraca", &hashed).await.unwrap());
    }
}
