// tests/entitlement_writer.rs
//
// Fluxo completo dos webhooks contra um Postgres real (TEST_DATABASE_URL).
// Cada teste usa e-mails e transações próprios, então podem rodar em paralelo.

mod common;

use serde_json::json;
use uuid::Uuid;

use designauto::{
    config::AppState,
    models::subscription::{PaymentProvider, PlanType},
    services::webhook_service::WebhookOutcome,
};

const HOTTOK: &str = "hottok-correto";

struct Buyer {
    email: String,
}

impl Buyer {
    fn new() -> Self {
        Self { email: format!("comprador-{}@exemplo.com", Uuid::new_v4().simple()) }
    }
}

fn transaction() -> String {
    format!("HP{}", Uuid::new_v4().simple())
}

fn hotmart(event: &str, transaction: &str, buyer: &Buyer, plan: &str) -> Vec<u8> {
    json!({
        "event": event,
        "data": {
            "buyer": { "email": buyer.email, "name": "Comprador Teste" },
            "purchase": {
                "transaction": transaction,
                "price": { "value": 47.9, "currency_value": "BRL" }
            },
            "subscription": { "plan": { "name": plan } }
        }
    })
    .to_string()
    .into_bytes()
}

async fn send(state: &AppState, event: &str, transaction: &str, buyer: &Buyer, plan: &str) -> WebhookOutcome {
    state
        .webhook_service
        .process(PaymentProvider::Hotmart, Some(HOTTOK), &hotmart(event, transaction, buyer, plan), None)
        .await
}

async fn subscription_rows(state: &AppState, transaction: &str) -> Vec<String> {
    sqlx::query_scalar::<_, String>("SELECT status::TEXT FROM subscriptions WHERE transaction_id = $1")
        .bind(transaction)
        .fetch_all(&state.db_pool)
        .await
        .unwrap()
}

async fn access(state: &AppState, buyer: &Buyer) -> (String, Option<chrono::DateTime<chrono::Utc>>) {
    sqlx::query_as::<_, (String, Option<chrono::DateTime<chrono::Utc>>)>(
        "SELECT nivelacesso::TEXT, dataexpiracao FROM users WHERE LOWER(email) = LOWER($1)",
    )
    .bind(&buyer.email)
    .fetch_one(&state.db_pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn repeated_approval_grants_only_once() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, tx) = (Buyer::new(), transaction());

    let first = send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal").await;
    assert!(matches!(first, WebhookOutcome::Granted { user_created: true, plan: PlanType::Mensal, .. }));
    let after_first = access(&state, &buyer).await;

    let second = send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal").await;
    assert_eq!(second, WebhookOutcome::Duplicate { transaction_id: tx.clone() });

    assert_eq!(subscription_rows(&state, &tx).await, vec!["active"]);
    assert_eq!(access(&state, &buyer).await, after_first);
    assert_eq!(after_first.0, "premium");
}

#[tokio::test]
async fn canceled_transaction_is_not_granted_again() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, tx) = (Buyer::new(), transaction());

    send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal").await;
    let before = access(&state, &buyer).await;

    let canceled = send(&state, "SUBSCRIPTION_CANCELLATION", &tx, &buyer, "Plano Mensal").await;
    assert!(matches!(canceled, WebhookOutcome::SubscriptionUpdated { .. }));

    let retried = send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal").await;
    assert_eq!(retried, WebhookOutcome::Duplicate { transaction_id: tx.clone() });

    assert_eq!(subscription_rows(&state, &tx).await, vec!["canceled"]);
    // Cancelamento não revoga e o reenvio não estende a expiração
    assert_eq!(access(&state, &buyer).await, before);
}

#[tokio::test]
async fn refund_stays_final_after_expiry_and_late_approval() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, tx) = (Buyer::new(), transaction());

    send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Anual").await;

    let refunded = send(&state, "PURCHASE_REFUNDED", &tx, &buyer, "Plano Anual").await;
    assert!(matches!(refunded, WebhookOutcome::Revoked { .. }));

    let expired = send(&state, "PURCHASE_EXPIRED", &tx, &buyer, "Plano Anual").await;
    assert!(matches!(expired, WebhookOutcome::Ignored { .. }));

    let late = send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Anual").await;
    assert!(matches!(late, WebhookOutcome::Ignored { .. }));

    assert_eq!(subscription_rows(&state, &tx).await, vec!["refunded"]);
    assert_eq!(access(&state, &buyer).await.0, "free");
}

#[tokio::test]
async fn refund_before_approval_blocks_the_grant() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, tx) = (Buyer::new(), transaction());

    let early = send(&state, "PURCHASE_CHARGEBACK", &tx, &buyer, "Plano Anual").await;
    assert!(matches!(early, WebhookOutcome::SubscriptionUpdated { .. }));

    let approval = send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Anual").await;
    assert!(matches!(approval, WebhookOutcome::Ignored { .. }));

    assert_eq!(subscription_rows(&state, &tx).await, vec!["chargeback"]);
    assert_eq!(access(&state, &buyer).await.0, "free");
}

#[tokio::test]
async fn concurrent_approvals_leave_a_single_row() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, tx) = (Buyer::new(), transaction());

    let (a, b) = tokio::join!(
        send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal"),
        send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal"),
    );

    let granted = [&a, &b]
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Granted { .. }))
        .count();
    let duplicates = [&a, &b]
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Duplicate { .. }))
        .count();
    assert_eq!((granted, duplicates), (1, 1), "{a:?} / {b:?}");
    assert_eq!(subscription_rows(&state, &tx).await, vec!["active"]);

    let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(&buyer.email)
        .fetch_one(&state.db_pool)
        .await
        .unwrap();
    assert_eq!(users, 1);
}

#[tokio::test]
async fn staff_level_survives_grant_and_refund() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, tx) = (Buyer::new(), transaction());

    sqlx::query(
        "INSERT INTO users (username, email, password_hash, nivelacesso) VALUES ($1, $2, 'x', 'designer')",
    )
    .bind(format!("designer-{}", Uuid::new_v4().simple()))
    .bind(&buyer.email)
    .execute(&state.db_pool)
    .await
    .unwrap();

    let granted = send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal").await;
    assert!(matches!(granted, WebhookOutcome::Granted { user_created: false, .. }));
    assert_eq!(access(&state, &buyer).await.0, "designer");

    send(&state, "PURCHASE_REFUNDED", &tx, &buyer, "Plano Mensal").await;
    assert_eq!(access(&state, &buyer).await.0, "designer");
}

#[tokio::test]
async fn refund_keeps_access_covered_by_another_subscription() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, first, second) = (Buyer::new(), transaction(), transaction());

    send(&state, "PURCHASE_APPROVED", &first, &buyer, "Plano Mensal").await;
    send(&state, "PURCHASE_APPROVED", &second, &buyer, "Plano Anual").await;

    let refunded = send(&state, "PURCHASE_REFUNDED", &first, &buyer, "Plano Mensal").await;
    assert!(matches!(refunded, WebhookOutcome::SubscriptionUpdated { .. }));
    assert_eq!(access(&state, &buyer).await.0, "premium");
}

#[tokio::test]
async fn reprocessing_a_processed_approval_is_a_duplicate() {
    let Some(state) = common::db_state().await else { return };
    let (buyer, tx) = (Buyer::new(), transaction());

    send(&state, "PURCHASE_APPROVED", &tx, &buyer, "Plano Mensal").await;

    let log_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM webhook_logs WHERE transaction_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&tx)
    .fetch_one(&state.db_pool)
    .await
    .unwrap();

    let outcome = state.webhook_service.reprocess(log_id).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Duplicate { transaction_id: tx.clone() });

    let status = sqlx::query_scalar::<_, String>("SELECT status::TEXT FROM webhook_logs WHERE id = $1")
        .bind(log_id)
        .fetch_one(&state.db_pool)
        .await
        .unwrap();
    assert_eq!(status, "duplicate");
    assert_eq!(subscription_rows(&state, &tx).await, vec!["active"]);
}
