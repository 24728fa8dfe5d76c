pub mod user_repo;
pub use user_repo::UserRepository;
pub mod subscription_repo;
pub use subscription_repo::SubscriptionRepository;
pub mod webhook_log_repo;
pub use webhook_log_repo::WebhookLogRepository;
pub mod metrics_repo;
pub use metrics_repo::MetricsRepository;
