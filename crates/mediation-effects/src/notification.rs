//! Tracing-backed change notifications

use async_trait::async_trait;
use mediation_core::effects::{NotificationEffects, NotificationError, RecordEvent};

/// Emits record change events as `tracing` events on the
/// `mediation::events` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Create a notifier
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationEffects for TracingNotifier {
    async fn notify(&self, event: RecordEvent) -> Result<(), NotificationError> {
        tracing::info!(
            target: "mediation::events",
            topic = %event.topic,
            record_id = %event.record_id,
            reason = %event.reason,
            payload = %event.payload,
            "Record changed"
        );
        Ok(())
    }
}
