//! Reply transport
//!
//! Sends a message back over the connection an inbound message arrived on.
//! Delivery failures are reported to the caller and never roll back state
//! already persisted by the handler.

use crate::messages::OutboundMessage;
use async_trait::async_trait;

/// Reply transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Message could not be handed to the transport
    #[error("Failed to send message to {connection_id}: {reason}")]
    SendFailed {
        /// Destination connection
        connection_id: String,
        /// Reason for the failure
        reason: String,
    },

    /// Transport has been shut down
    #[error("Transport closed")]
    Closed,
}

/// Outbound message delivery
#[async_trait]
pub trait TransportEffects: Send + Sync {
    /// Send `reply` on its destination connection
    async fn send_reply(&self, reply: OutboundMessage) -> Result<(), TransportError>;
}
