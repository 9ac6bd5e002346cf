//! Composite effects bundle

use crate::{ChannelTransport, ConnectionRegistry, LocalKeyIssuer, MemoryRecordStore, TracingNotifier};
use async_trait::async_trait;
use mediation_core::effects::{
    ConnectionEffects, ConnectionError, DidInfo, KeyIssuerEffects, KeyIssuerError,
    NotificationEffects, NotificationError, RecordEvent, RecordStorageEffects, StorageError,
    StorageRecord, TagFilter, TransportEffects, TransportError,
};
use mediation_core::{ConnectionId, OutboundMessage};
use std::collections::BTreeMap;

/// One handler per collaborator, delegated to trait by trait.
///
/// The transport and notifier are type parameters so tests can substitute
/// recording implementations.
#[derive(Debug, Clone)]
pub struct AgentEffects<T = ChannelTransport, N = TracingNotifier> {
    /// Record store
    pub storage: MemoryRecordStore,
    /// DID issuer
    pub keys: LocalKeyIssuer,
    /// Connection oracle
    pub connections: ConnectionRegistry,
    /// Reply transport
    pub transport: T,
    /// Change notification sink
    pub notifier: N,
}

impl<T, N> AgentEffects<T, N> {
    /// Bundle fresh in-memory handlers with the given transport and notifier
    pub fn new(transport: T, notifier: N) -> Self {
        Self {
            storage: MemoryRecordStore::new(),
            keys: LocalKeyIssuer::new(),
            connections: ConnectionRegistry::new(),
            transport,
            notifier,
        }
    }
}

#[async_trait]
impl<T: Send + Sync, N: Send + Sync> RecordStorageEffects for AgentEffects<T, N> {
    async fn add_record(&self, record: StorageRecord) -> Result<(), StorageError> {
        self.storage.add_record(record).await
    }

    async fn get_record(&self, record_type: &str, id: &str) -> Result<StorageRecord, StorageError> {
        self.storage.get_record(record_type, id).await
    }

    async fn update_record(&self, record: StorageRecord) -> Result<(), StorageError> {
        self.storage.update_record(record).await
    }

    async fn delete_record(&self, record_type: &str, id: &str) -> Result<(), StorageError> {
        self.storage.delete_record(record_type, id).await
    }

    async fn find_records(
        &self,
        record_type: &str,
        filter: &TagFilter,
    ) -> Result<Vec<StorageRecord>, StorageError> {
        self.storage.find_records(record_type, filter).await
    }
}

#[async_trait]
impl<T: Send + Sync, N: Send + Sync> KeyIssuerEffects for AgentEffects<T, N> {
    async fn create_local_did(
        &self,
        metadata: BTreeMap<String, String>,
    ) -> Result<DidInfo, KeyIssuerError> {
        self.keys.create_local_did(metadata).await
    }
}

#[async_trait]
impl<T: Send + Sync, N: Send + Sync> ConnectionEffects for AgentEffects<T, N> {
    async fn is_connection_ready(&self, connection_id: &ConnectionId) -> Result<bool, ConnectionError> {
        self.connections.is_connection_ready(connection_id).await
    }
}

#[async_trait]
impl<T: TransportEffects, N: Send + Sync> TransportEffects for AgentEffects<T, N> {
    async fn send_reply(&self, reply: OutboundMessage) -> Result<(), TransportError> {
        self.transport.send_reply(reply).await
    }
}

#[async_trait]
impl<T: Send + Sync, N: NotificationEffects> NotificationEffects for AgentEffects<T, N> {
    async fn notify(&self, event: RecordEvent) -> Result<(), NotificationError> {
        self.notifier.notify(event).await
    }
}
