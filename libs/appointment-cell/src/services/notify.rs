// libs/appointment-cell/src/services/notify.rs
use tracing::info;
use uuid::Uuid;

/// Fire-and-forget notification collaborator. Delivery is another
/// system's job; failures here never affect booking or money movement.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: Uuid, event: &str, message: &str);
}

/// Default implementation that records the notification in the log
/// stream.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, recipient: Uuid, event: &str, message: &str) {
        info!("notify {} [{}]: {}", recipient, event, message);
    }
}
