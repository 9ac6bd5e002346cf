//! Connection-state oracle
//!
//! The connection protocol owns handshake state. The mediation subsystem only
//! needs to know whether a connection can currently carry messages.

use crate::identifiers::ConnectionId;
use async_trait::async_trait;

/// Connection oracle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The connection id is unknown to the oracle
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// The oracle could not be consulted
    #[error("Connection lookup failed: {0}")]
    LookupFailed(String),
}

/// Readiness of connections for messaging
#[async_trait]
pub trait ConnectionEffects: Send + Sync {
    /// Whether `connection_id` is established and usable for messaging
    async fn is_connection_ready(&self, connection_id: &ConnectionId) -> Result<bool, ConnectionError>;
}
