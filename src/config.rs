// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, str::FromStr, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{MetricsRepository, SubscriptionRepository, UserRepository, WebhookLogRepository},
    models::subscription::PlanType,
    services::{admin_service::AdminService, auth::AuthService, webhook_service::WebhookService},
};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub hotmart_hottok: Option<String>,
    pub doppus_token: Option<String>,
    pub default_plan: PlanType,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        Ok(Self {
            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3000)?,
            hotmart_hottok: optional_var("HOTMART_HOTTOK"),
            doppus_token: optional_var("DOPPUS_TOKEN"),
            default_plan: parse_plan(optional_var("DEFAULT_PLAN").as_deref())?,
            admin_email: optional_var("ADMIN_EMAIL"),
            admin_password: optional_var("ADMIN_PASSWORD"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Variável vazia conta como ausente
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} inválida ({raw}): {e}")),
        None => Ok(default),
    }
}

fn parse_plan(raw: Option<&str>) -> anyhow::Result<PlanType> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|e: String| anyhow::anyhow!("DEFAULT_PLAN inválido: {e}")),
        None => Ok(PlanType::Anual),
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Config,
    pub i18n_store: I18nStore,

    pub auth_service: AuthService,
    pub webhook_service: WebhookService,
    pub admin_service: AdminService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::with_pool(config, db_pool)
    }

    /// Monta o gráfico de dependências sobre um pool já criado.
    pub fn with_pool(config: Config, db_pool: PgPool) -> anyhow::Result<Self> {
        let i18n_store = I18nStore::new()?;

        let user_repo = UserRepository::new(db_pool.clone());
        let subscription_repo = SubscriptionRepository::new(db_pool.clone());
        let webhook_log_repo = WebhookLogRepository::new(db_pool.clone());
        let metrics_repo = MetricsRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo.clone(),
            config.jwt_secret.clone(),
            db_pool.clone(),
        );
        let webhook_service = WebhookService::new(
            user_repo.clone(),
            subscription_repo.clone(),
            webhook_log_repo.clone(),
            config.clone(),
            db_pool.clone(),
        );
        let admin_service = AdminService::new(
            user_repo,
            subscription_repo,
            webhook_log_repo,
            metrics_repo,
            db_pool.clone(),
        );

        Ok(Self {
            db_pool,
            config,
            i18n_store,
            auth_service,
            webhook_service,
            admin_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_parses_known_names() {
        assert_eq!(parse_plan(None).unwrap(), PlanType::Anual);
        assert_eq!(parse_plan(Some("Mensal")).unwrap(), PlanType::Mensal);
        assert_eq!(parse_plan(Some("vitalício")).unwrap(), PlanType::Vitalicio);
        assert!(parse_plan(Some("quinzenal")).is_err());
    }
}
