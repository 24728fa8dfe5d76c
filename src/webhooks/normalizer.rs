// src/webhooks/normalizer.rs
//
// Os provedores mandam o mesmo dado em lugares diferentes (e mudam de versão
// sem aviso). Primeiro tentamos os caminhos conhecidos; se nada aparecer,
// varremos o documento inteiro atrás de chaves com nome parecido.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use validator::ValidateEmail;

use crate::models::subscription::PaymentProvider;

const MAX_DEPTH: usize = 12;
const MIN_PHONE_DIGITS: usize = 8;
// Limite da coluna subscriptions.amount (NUMERIC(12, 2))
const MAX_AMOUNT_DIGITS: u32 = 10;

// Subárvores de outras partes da venda (o e-mail ali não é do comprador)
const FOREIGN_PARTIES: &[&str] = &["producer", "affiliate", "affiliates", "seller", "commissions"];

const HOTMART_EMAIL_PATHS: &[&str] = &[
    "data.buyer.email",
    "buyer.email",
    "data.subscriber.email",
    "data.subscription.subscriber.email",
    "email",
];

const DOPPUS_EMAIL_PATHS: &[&str] = &[
    "customer.email",
    "data.customer.email",
    "buyer.email",
    "email",
];

const PHONE_PATHS: &[&str] = &[
    "data.buyer.checkout_phone",
    "buyer.checkout_phone",
    "data.buyer.phone",
    "buyer.phone",
    "customer.phone",
    "data.customer.phone",
    "checkout_phone",
    "phone",
];

const PHONE_KEYS: &[&str] = &[
    "checkout_phone",
    "phone",
    "phone_number",
    "cellphone",
    "telefone",
    "celular",
    "mobile",
];

const TRANSACTION_PATHS: &[&str] = &[
    "data.purchase.transaction",
    "purchase.transaction",
    "transaction.code",
    "transaction",
];

const TRANSACTION_KEYS: &[&str] = &[
    "transaction",
    "transaction_id",
    "transactionid",
    "transaction_code",
    "order_id",
    "orderid",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPayload {
    pub provider: PaymentProvider,
    pub event: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub transaction_id: Option<String>,
    pub subscriber_code: Option<String>,
    pub plan_name: Option<String>,
    pub offer_code: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub token: Option<String>,
}

impl NormalizedPayload {
    pub fn from_value(provider: PaymentProvider, payload: &Value) -> Self {
        let email_paths = match provider {
            PaymentProvider::Doppus => DOPPUS_EMAIL_PATHS,
            _ => HOTMART_EMAIL_PATHS,
        };

        Self {
            provider,
            event: first_text(payload, &["event", "event_type", "eventType", "type"]),
            status: first_text(
                payload,
                &["data.purchase.status", "purchase.status", "status.code", "status", "data.status"],
            ),
            email: find_email(payload, email_paths),
            phone: find_phone(payload),
            name: first_text(
                payload,
                &["data.buyer.name", "buyer.name", "customer.name", "data.customer.name", "name"],
            ),
            transaction_id: first_text(payload, TRANSACTION_PATHS)
                .or_else(|| search(payload, &|key| TRANSACTION_KEYS.contains(&key), &as_text, 0)),
            subscriber_code: first_text(
                payload,
                &[
                    "data.subscription.subscriber.code",
                    "subscription.subscriber.code",
                    "data.subscriber.code",
                    "subscriber.code",
                    "recurrence.code",
                ],
            ),
            plan_name: first_text(
                payload,
                &[
                    "data.subscription.plan.name",
                    "subscription.plan.name",
                    "plan.name",
                    "plan_name",
                    "recurrence.name",
                ],
            ),
            offer_code: first_text(
                payload,
                &["data.purchase.offer.code", "purchase.offer.code", "offer.code", "offer_code", "off"],
            ),
            product_id: first_text(
                payload,
                &["data.product.id", "product.id", "items.0.code", "items.0.id", "prod"],
            ),
            product_name: first_text(
                payload,
                &["data.product.name", "product.name", "items.0.name", "prod_name"],
            ),
            amount: first_value(
                payload,
                &[
                    "data.purchase.price.value",
                    "purchase.price.value",
                    "data.purchase.full_price.value",
                    "transaction.total",
                    "amount",
                    "value",
                    "price",
                ],
                as_decimal,
            ),
            currency: first_text(
                payload,
                &[
                    "data.purchase.price.currency_value",
                    "purchase.price.currency_value",
                    "transaction.currency",
                    "currency_code",
                    "currency",
                ],
            )
            .map(|c| c.to_uppercase()),
            approved_at: first_value(
                payload,
                &["data.purchase.approved_date", "purchase.approved_date", "approved_date"],
                as_datetime,
            ),
            token: first_text(payload, &["hottok", "token"]),
        }
    }

    /// Textos usados para descobrir o plano, do mais específico ao mais genérico.
    pub fn plan_hints(&self) -> impl Iterator<Item = &str> {
        [&self.plan_name, &self.offer_code, &self.product_name]
            .into_iter()
            .filter_map(|hint| hint.as_deref())
    }
}

// ---
// Caminhos conhecidos
// ---

fn at<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let pointer = format!("/{}", path.replace('.', "/"));
    payload.pointer(&pointer)
}

fn first_value<T>(payload: &Value, paths: &[&str], accept: impl Fn(&Value) -> Option<T>) -> Option<T> {
    paths
        .iter()
        .filter_map(|path| at(payload, path))
        .find_map(accept)
}

fn first_text(payload: &Value, paths: &[&str]) -> Option<String> {
    first_value(payload, paths, as_text)
}

// ---
// Busca recursiva
// ---

/// Busca em profundidade. Em cada objeto as chaves do próprio nível são
/// testadas antes de descer, então a ocorrência mais rasa de cada ramo vence.
fn search(
    value: &Value,
    matches: &dyn Fn(&str) -> bool,
    accept: &dyn Fn(&Value) -> Option<String>,
    depth: usize,
) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }

    match value {
        Value::Object(map) => {
            let direct = map.iter().find_map(|(key, child)| {
                let key = key.to_lowercase();
                if is_foreign_party(&key) || !matches(&key) {
                    return None;
                }
                accept(child)
            });

            direct.or_else(|| {
                map.iter()
                    .filter(|(key, _)| !is_foreign_party(&key.to_lowercase()))
                    .find_map(|(_, child)| search(child, matches, accept, depth + 1))
            })
        }
        Value::Array(items) => items
            .iter()
            .find_map(|item| search(item, matches, accept, depth + 1)),
        _ => None,
    }
}

fn is_foreign_party(key: &str) -> bool {
    FOREIGN_PARTIES
        .iter()
        .any(|party| key == *party || key.starts_with(&format!("{party}_")))
}

// ---
// Campos específicos
// ---

fn find_email(payload: &Value, paths: &[&str]) -> Option<String> {
    first_value(payload, paths, as_email).or_else(|| {
        search(
            payload,
            &|key| key == "email" || key.ends_with("email"),
            &as_email,
            0,
        )
    })
}

fn find_phone(payload: &Value) -> Option<String> {
    let holders = ["data.buyer", "buyer", "data.customer", "customer"]
        .iter()
        .filter_map(|path| at(payload, path))
        .chain(std::iter::once(payload));

    first_value(payload, PHONE_PATHS, as_phone)
        .or_else(|| holders.into_iter().find_map(split_phone))
        .or_else(|| search(payload, &|key| PHONE_KEYS.contains(&key), &as_phone, 0))
}

// ---
// Conversores
// ---

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_email(value: &Value) -> Option<String> {
    let candidate = as_text(value)?.to_lowercase();
    candidate.validate_email().then_some(candidate)
}

fn as_phone(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => split_phone(value),
        _ => {
            let digits: String = as_text(value)?.chars().filter(char::is_ascii_digit).collect();
            (digits.len() >= MIN_PHONE_DIGITS).then_some(digits)
        }
    }
}

// DDD e número separados: { "phone_local_code": "11", "phone_number": "99999-8888" }
fn split_phone(value: &Value) -> Option<String> {
    let area = first_text(value, &["phone_local_code", "ddd", "area_code", "local_code"]);
    let number = first_text(value, &["phone_number", "number"])?;
    let joined: String = format!("{}{}", area.unwrap_or_default(), number)
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    (joined.len() >= MIN_PHONE_DIGITS).then_some(joined)
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let amount = parse_decimal(value)?.round_dp(2);
    // Valor que não cabe na coluna vira None em vez de derrubar a concessão
    (amount.abs() < Decimal::from(10u64.pow(MAX_AMOUNT_DIGITS))).then_some(amount)
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(&s.trim().replace(',', ".")).ok(),
        Value::Object(_) => at(value, "value").and_then(parse_decimal),
        _ => None,
    }
}

fn as_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        // Hotmart manda epoch em milissegundos
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hotmart_v2() -> Value {
        json!({
            "id": "5b3a1c7e-0000-4b1b-9c8f-3f0e5d1c2a11",
            "creation_date": 1710072000000i64,
            "event": "PURCHASE_APPROVED",
            "version": "2.0.0",
            "data": {
                "product": { "id": 3528193, "name": "DesignAuto Premium" },
                "producer": { "name": "DesignAuto", "email": "financeiro@designauto.com.br" },
                "buyer": {
                    "email": "  Cliente@Exemplo.com ",
                    "name": "Cliente Teste",
                    "checkout_phone": "+55 (11) 99999-8888"
                },
                "purchase": {
                    "approved_date": 1710072000000i64,
                    "price": { "value": 197.0, "currency_value": "brl" },
                    "offer": { "code": "anual2024" },
                    "status": "APPROVED",
                    "transaction": "HP17715690036014"
                },
                "subscription": {
                    "status": "ACTIVE",
                    "plan": { "id": 881, "name": "Plano Anual" },
                    "subscriber": { "code": "SUB-X9" }
                }
            }
        })
    }

    #[test]
    fn reads_hotmart_v2_known_paths() {
        let n = NormalizedPayload::from_value(PaymentProvider::Hotmart, &hotmart_v2());

        assert_eq!(n.event.as_deref(), Some("PURCHASE_APPROVED"));
        assert_eq!(n.status.as_deref(), Some("APPROVED"));
        assert_eq!(n.email.as_deref(), Some("cliente@exemplo.com"));
        assert_eq!(n.phone.as_deref(), Some("5511999998888"));
        assert_eq!(n.name.as_deref(), Some("Cliente Teste"));
        assert_eq!(n.transaction_id.as_deref(), Some("HP17715690036014"));
        assert_eq!(n.subscriber_code.as_deref(), Some("SUB-X9"));
        assert_eq!(n.plan_name.as_deref(), Some("Plano Anual"));
        assert_eq!(n.offer_code.as_deref(), Some("anual2024"));
        assert_eq!(n.product_id.as_deref(), Some("3528193"));
        assert_eq!(n.amount, Some(Decimal::from_str("197.0").unwrap()));
        assert_eq!(n.currency.as_deref(), Some("BRL"));
        assert_eq!(n.approved_at.map(|d| d.timestamp()), Some(1710072000));
    }

    #[test]
    fn reads_flat_legacy_postback() {
        let payload = json!({
            "hottok": "segredo",
            "email": "legacy@exemplo.com",
            "transaction": "HP000111",
            "status": "approved",
            "prod": 12345,
            "prod_name": "DesignAuto Mensal",
            "price": "47,90",
            "phone_local_code": "21",
            "phone_number": "98888-7777"
        });

        let n = NormalizedPayload::from_value(PaymentProvider::Hotmart, &payload);

        assert_eq!(n.event, None);
        assert_eq!(n.status.as_deref(), Some("approved"));
        assert_eq!(n.email.as_deref(), Some("legacy@exemplo.com"));
        assert_eq!(n.transaction_id.as_deref(), Some("HP000111"));
        assert_eq!(n.product_id.as_deref(), Some("12345"));
        assert_eq!(n.amount, Some(Decimal::from_str("47.90").unwrap()));
        assert_eq!(n.token.as_deref(), Some("segredo"));
        assert_eq!(n.phone.as_deref(), Some("21988887777"));
    }

    #[test]
    fn reads_doppus_shape() {
        let payload = json!({
            "customer": {
                "name": "Ana Doppus",
                "email": "ana@doppus.com",
                "phone": { "ddd": "31", "number": "97777-6666" }
            },
            "items": [{ "code": "DA-SEM", "name": "DesignAuto Semestral" }],
            "transaction": { "code": "DP-7781", "total": 297, "currency": "brl" },
            "status": { "code": "approved", "message": "Pagamento aprovado" },
            "recurrence": { "code": "REC-55" }
        });

        let n = NormalizedPayload::from_value(PaymentProvider::Doppus, &payload);

        assert_eq!(n.status.as_deref(), Some("approved"));
        assert_eq!(n.email.as_deref(), Some("ana@doppus.com"));
        assert_eq!(n.phone.as_deref(), Some("31977776666"));
        assert_eq!(n.transaction_id.as_deref(), Some("DP-7781"));
        assert_eq!(n.subscriber_code.as_deref(), Some("REC-55"));
        assert_eq!(n.product_id.as_deref(), Some("DA-SEM"));
        assert_eq!(n.product_name.as_deref(), Some("DesignAuto Semestral"));
        assert_eq!(n.amount, Some(Decimal::from(297)));
        assert_eq!(n.currency.as_deref(), Some("BRL"));
    }

    #[test]
    fn finds_buried_email_but_skips_producer() {
        let payload = json!({
            "event": "PURCHASE_COMPLETE",
            "payload": {
                "producer": { "email": "produtor@designauto.com.br" },
                "wrapper": {
                    "contact": { "buyer_email": "Enterrado@Exemplo.com" },
                    "order_id": 998877
                }
            }
        });

        let n = NormalizedPayload::from_value(PaymentProvider::Hotmart, &payload);

        assert_eq!(n.email.as_deref(), Some("enterrado@exemplo.com"));
        assert_eq!(n.transaction_id.as_deref(), Some("998877"));
    }

    #[test]
    fn invalid_emails_are_skipped_in_favour_of_valid_ones() {
        let payload = json!({
            "data": { "buyer": { "email": "não-informado" } },
            "extra": { "email": "valido@exemplo.com" }
        });

        let n = NormalizedPayload::from_value(PaymentProvider::Hotmart, &payload);

        assert_eq!(n.email.as_deref(), Some("valido@exemplo.com"));
    }

    #[test]
    fn missing_fields_stay_empty() {
        let n = NormalizedPayload::from_value(PaymentProvider::Hotmart, &json!({ "foo": [1, 2, 3] }));

        assert_eq!(n.email, None);
        assert_eq!(n.transaction_id, None);
        assert_eq!(n.amount, None);
        assert_eq!(n.plan_hints().count(), 0);
    }

    #[test]
    fn short_phone_numbers_are_rejected() {
        let n = NormalizedPayload::from_value(
            PaymentProvider::Doppus,
            &json!({ "customer": { "phone": "1234" } }),
        );
        assert_eq!(n.phone, None);
    }

    #[test]
    fn amount_outside_the_column_range_is_dropped() {
        let huge = NormalizedPayload::from_value(
            PaymentProvider::Doppus,
            &json!({ "transaction": { "code": "DP-1", "total": "123456789012.50" } }),
        );
        assert_eq!(huge.amount, None);
        assert_eq!(huge.transaction_id.as_deref(), Some("DP-1"));

        let rounded = NormalizedPayload::from_value(
            PaymentProvider::Doppus,
            &json!({ "transaction": { "total": 47.9049 } }),
        );
        assert_eq!(rounded.amount, Some(Decimal::from_str("47.90").unwrap()));
    }

    #[test]
    fn plan_hints_follow_specificity_order() {
        let n = NormalizedPayload::from_value(PaymentProvider::Hotmart, &hotmart_v2());
        let hints: Vec<&str> = n.plan_hints().collect();
        assert_eq!(hints, vec!["Plano Anual", "anual2024", "DesignAuto Premium"]);
    }
}
