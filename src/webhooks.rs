//! Ingestão de webhooks de pagamento (Hotmart, Doppus).
//!
//! `normalizer` extrai os dados do comprador de payloads com formato variável,
//! `events` classifica o evento e `token` valida o segredo compartilhado.

pub mod events;
pub mod normalizer;
pub mod token;

pub use events::PaymentEvent;
pub use normalizer::NormalizedPayload;
