// src/handlers/webhooks.rs

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Extension, Json,
};
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::{
    config::AppState,
    models::{subscription::PaymentProvider, webhook::WebhookResponse},
};

pub const HOTMART_TOKEN_HEADER: &str = "x-hotmart-hottok";
pub const DOPPUS_TOKEN_HEADER: &str = "x-doppus-token";

type PeerAddr = Option<Extension<ConnectInfo<SocketAddr>>>;

// POST /webhook/hotmart (e /api/webhooks/hotmart)
#[utoipa::path(
    post,
    path = "/webhook/hotmart",
    tag = "Webhooks",
    description = "Postback da Hotmart. Também atende em /api/webhooks/hotmart. Sempre responde 200.",
    request_body(content = Object, description = "Payload bruto da Hotmart"),
    params(
        ("X-HOTMART-HOTTOK" = Option<String>, Header, description = "Hottok configurado na Hotmart")
    ),
    responses(
        (status = 200, description = "Resultado do processamento", body = WebhookResponse)
    )
)]
pub async fn hotmart(
    State(app_state): State<AppState>,
    peer: PeerAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookResponse> {
    receive(&app_state, PaymentProvider::Hotmart, HOTMART_TOKEN_HEADER, &headers, peer, &body).await
}

// POST /webhook/doppus (e /api/webhooks/doppus)
#[utoipa::path(
    post,
    path = "/webhook/doppus",
    tag = "Webhooks",
    description = "Postback da Doppus. Também atende em /api/webhooks/doppus. Sempre responde 200.",
    request_body(content = Object, description = "Payload bruto da Doppus"),
    params(
        ("X-Doppus-Token" = Option<String>, Header, description = "Token configurado na Doppus")
    ),
    responses(
        (status = 200, description = "Resultado do processamento", body = WebhookResponse)
    )
)]
pub async fn doppus(
    State(app_state): State<AppState>,
    peer: PeerAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookResponse> {
    receive(&app_state, PaymentProvider::Doppus, DOPPUS_TOKEN_HEADER, &headers, peer, &body).await
}

// GET /webhook/hotmart e /webhook/doppus: usado pelos provedores para testar a URL
#[utoipa::path(
    get,
    path = "/webhook/hotmart",
    tag = "Webhooks",
    responses((status = 200, description = "Endpoint ativo"))
)]
pub async fn hotmart_probe() -> Json<Value> {
    probe(PaymentProvider::Hotmart)
}

#[utoipa::path(
    get,
    path = "/webhook/doppus",
    tag = "Webhooks",
    responses((status = 200, description = "Endpoint ativo"))
)]
pub async fn doppus_probe() -> Json<Value> {
    probe(PaymentProvider::Doppus)
}

fn probe(provider: PaymentProvider) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": provider.as_str(),
        "message": "Webhook ativo"
    }))
}

async fn receive(
    app_state: &AppState,
    provider: PaymentProvider,
    token_header: &str,
    headers: &HeaderMap,
    peer: PeerAddr,
    body: &Bytes,
) -> Json<WebhookResponse> {
    let header_token = headers.get(token_header).and_then(|v| v.to_str().ok());
    let source_ip = source_ip(headers, peer.map(|Extension(ConnectInfo(addr))| addr));

    let outcome = app_state
        .webhook_service
        .process(provider, header_token, body, source_ip.as_deref())
        .await;

    Json(WebhookResponse {
        success: outcome.is_success(),
        status: outcome.log_status(),
        message: outcome.message(),
    })
}

// Atrás de proxy o IP real vem no X-Forwarded-For
fn source_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_peer_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        assert_eq!(source_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.7"));
        assert_eq!(source_ip(&HeaderMap::new(), Some(peer)).as_deref(), Some("10.0.0.1"));
        assert_eq!(source_ip(&HeaderMap::new(), None), None);
    }
}
