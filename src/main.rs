// src/main.rs

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use designauto::config::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    // Sem configuração válida a aplicação não sobe
    let config = Config::from_env()?;
    if config.hotmart_hottok.is_none() {
        tracing::warn!("⚠️ HOTMART_HOTTOK não definido: webhooks da Hotmart serão aceitos sem validação");
    }
    if config.doppus_token.is_none() {
        tracing::warn!("⚠️ DOPPUS_TOKEN não definido: webhooks da Doppus serão aceitos sem validação");
    }

    let app_state = AppState::new(config.clone()).await?;

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados")?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let admin = app_state.auth_service
            .ensure_bootstrap_admin(email, password)
            .await
            .context("Falha ao criar o usuário admin")?;
        tracing::info!("👑 Admin disponível: {}", admin.email);
    }

    let app = designauto::app(app_state);

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .context("Falha ao iniciar o listener TCP")?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Erro no servidor Axum")?;

    Ok(())
}
