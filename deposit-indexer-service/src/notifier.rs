use async_trait::async_trait;
use tracing::info;

/// Best-effort outbound channel. Implementations swallow and log their own failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: String);
}

/// Used when no channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: String) {
        info!("Notification (no channel configured): {}", message);
    }
}
