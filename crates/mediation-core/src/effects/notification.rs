//! Change-notification sink
//!
//! Invoked whenever a record that external observers care about is saved.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A record change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent {
    /// Event topic, e.g. `mediation`
    pub topic: String,
    /// Id of the changed record
    pub record_id: String,
    /// Serialized record after the change
    pub payload: serde_json::Value,
    /// Human-readable reason for the change
    pub reason: String,
}

/// Notification sink errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    /// Event could not be delivered
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Observer notification
#[async_trait]
pub trait NotificationEffects: Send + Sync {
    /// Publish a record change event
    async fn notify(&self, event: RecordEvent) -> Result<(), NotificationError>;
}
