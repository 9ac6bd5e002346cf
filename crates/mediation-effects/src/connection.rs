//! In-memory connection readiness registry

use async_trait::async_trait;
use mediation_core::effects::{ConnectionEffects, ConnectionError};
use mediation_core::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifecycle of a connection as seen by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake still in progress
    Pending,
    /// Usable for messaging
    Active,
    /// Closed or abandoned
    Inactive,
}

/// Connection oracle fed by the connection protocol
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionState>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state of a connection
    pub async fn set_state(&self, connection_id: impl Into<ConnectionId>, state: ConnectionState) {
        self.connections
            .write()
            .await
            .insert(connection_id.into(), state);
    }

    /// Mark a connection as ready for messaging
    pub async fn activate(&self, connection_id: impl Into<ConnectionId>) {
        self.set_state(connection_id, ConnectionState::Active).await;
    }
}

#[async_trait]
impl ConnectionEffects for ConnectionRegistry {
    async fn is_connection_ready(&self, connection_id: &ConnectionId) -> Result<bool, ConnectionError> {
        let connections = self.connections.read().await;
        match connections.get(connection_id) {
            Some(state) => Ok(*state == ConnectionState::Active),
            None => Err(ConnectionError::UnknownConnection(connection_id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn only_active_connections_are_ready() {
        let registry = ConnectionRegistry::new();
        registry.activate("c1").await;
        registry.set_state("c2", ConnectionState::Pending).await;

        assert!(registry.is_connection_ready(&"c1".into()).await.unwrap());
        assert!(!registry.is_connection_ready(&"c2".into()).await.unwrap());
        assert_matches!(
            registry.is_connection_ready(&"c3".into()).await,
            Err(ConnectionError::UnknownConnection(_))
        );
    }
}
