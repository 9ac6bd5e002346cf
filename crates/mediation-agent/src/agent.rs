//! Mediation agent runtime
//!
//! Wraps the protocol dispatcher with the effects bundle it runs against and
//! serializes work per connection: an inbound message or operator action on
//! one connection waits for the previous one on that connection to finish,
//! while different connections proceed concurrently.

use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::logging::init_tracing;
use anyhow::Context;
use async_lock::{Mutex as AsyncMutex, MutexGuardArc};
use mediation_coordinate::{
    MediationError, MediationManager, MediationQuery, MediationRecord, MediationRecordStore,
    MediationRole, MediationState,
};
use mediation_core::effects::MediationEffects;
use mediation_core::messages::KeylistUpdate;
use mediation_core::{ConnectionId, InboundMessage, MediationId, MediationMessage, OutboundMessage};
use mediation_effects::{AgentEffects, ChannelTransport, TracingNotifier};
use mediation_protocol::{DispatchError, MediationProtocol};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Capacity of the outbound channel created by [`MediationAgent::in_memory`]
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Agent backed by the in-memory effect handlers
pub type InMemoryAgent = MediationAgent<AgentEffects<ChannelTransport, TracingNotifier>>;

type ConnectionLocks = Mutex<HashMap<ConnectionId, Arc<AsyncMutex<()>>>>;

/// A mediation participant: dispatcher, effects and per-connection ordering
pub struct MediationAgent<E>
where
    E: MediationEffects + 'static,
{
    effects: E,
    protocol: MediationProtocol<E>,
    connection_locks: ConnectionLocks,
}

impl<E> MediationAgent<E>
where
    E: MediationEffects + 'static,
{
    /// Validate `config`, build the dispatcher and apply the startup
    /// default-mediator settings
    pub async fn new(config: &AgentConfig, effects: E) -> AgentResult<Self> {
        config.validate()?;
        let agent = Self {
            effects,
            protocol: MediationProtocol::new(config.mediation.clone()),
            connection_locks: Mutex::new(HashMap::new()),
        };
        agent.apply_startup_settings(config).await?;
        Ok(agent)
    }

    async fn apply_startup_settings(&self, config: &AgentConfig) -> AgentResult<()> {
        let manager = self.manager();
        if config.clear_default_mediator {
            manager.clear_default_mediator(&self.effects).await?;
        } else if let Some(mediation_id) = &config.default_mediator_id {
            manager
                .set_default_mediator_by_id(&self.effects, mediation_id)
                .await?;
        }
        Ok(())
    }

    /// Effects bundle the agent runs against
    pub fn effects(&self) -> &E {
        &self.effects
    }

    /// Protocol dispatcher
    pub fn protocol(&self) -> &MediationProtocol<E> {
        &self.protocol
    }

    /// Coordinator shared with the dispatcher
    pub fn manager(&self) -> &MediationManager {
        self.protocol.manager()
    }

    /// Wait for earlier work on `connection_id` to finish. The returned turn
    /// holds the connection until dropped.
    async fn connection_turn(&self, connection_id: &ConnectionId) -> ConnectionTurn<'_> {
        let lock = self
            .connection_locks
            .lock()
            .entry(connection_id.clone())
            .or_default()
            .clone();
        let guard = lock.lock_arc().await;
        ConnectionTurn {
            locks: &self.connection_locks,
            connection_id: connection_id.clone(),
            guard: Some(guard),
        }
    }

    /// Connections with work running or queued
    pub fn tracked_connections(&self) -> usize {
        self.connection_locks.lock().len()
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Dispatch an inbound message once earlier work on its connection has
    /// finished. Returns the reply that was sent, if any.
    pub async fn handle_inbound(
        &self,
        inbound: InboundMessage,
    ) -> Result<Option<OutboundMessage>, DispatchError> {
        let _turn = self.connection_turn(&inbound.connection_id).await;
        self.protocol.dispatch(inbound, &self.effects).await
    }

    // ========================================================================
    // Mediator operations
    // ========================================================================

    /// Server records still waiting for a grant or denial
    pub async fn pending_requests(&self) -> AgentResult<Vec<MediationRecord>> {
        let query = MediationQuery::new()
            .role(MediationRole::Server)
            .state(MediationState::Requested);
        Ok(MediationRecordStore::query(&self.effects, &query).await?)
    }

    /// Grant the request recorded as `mediation_id` and send the grant
    pub async fn grant_request(&self, mediation_id: &MediationId) -> AgentResult<MediationRecord> {
        let connection_id = self.connection_of(mediation_id).await?;
        let _turn = self.connection_turn(&connection_id).await;

        let record = self.load_record(mediation_id, MediationRole::Server).await?;
        let (record, grant) = self.manager().grant_request(&self.effects, record).await?;
        self.send(&record.connection_id, MediationMessage::MediationGrant(grant))
            .await?;
        Ok(record)
    }

    /// Deny the request recorded as `mediation_id` and send the denial
    pub async fn deny_request(
        &self,
        mediation_id: &MediationId,
        mediator_terms: Option<Vec<String>>,
        recipient_terms: Option<Vec<String>>,
    ) -> AgentResult<MediationRecord> {
        let connection_id = self.connection_of(mediation_id).await?;
        let _turn = self.connection_turn(&connection_id).await;

        let record = self.load_record(mediation_id, MediationRole::Server).await?;
        let (record, deny) = self
            .manager()
            .deny_request(&self.effects, record, mediator_terms, recipient_terms)
            .await?;
        self.send(&record.connection_id, MediationMessage::MediationDeny(deny))
            .await?;
        Ok(record)
    }

    // ========================================================================
    // Recipient operations
    // ========================================================================

    /// Ask the agent on `connection_id` to mediate for us
    pub async fn request_mediation(
        &self,
        connection_id: &ConnectionId,
        mediator_terms: Vec<String>,
        recipient_terms: Vec<String>,
    ) -> AgentResult<MediationRecord> {
        let _turn = self.connection_turn(connection_id).await;

        let (record, request) = self
            .manager()
            .prepare_request(&self.effects, connection_id, mediator_terms, recipient_terms)
            .await?;
        self.send(connection_id, MediationMessage::MediationRequest(request))
            .await?;
        Ok(record)
    }

    /// Send `update` to the mediator of the granted client mediation
    /// `mediation_id`
    pub async fn send_keylist_update(
        &self,
        mediation_id: &MediationId,
        update: KeylistUpdate,
    ) -> AgentResult<()> {
        let record = self.granted_client_record(mediation_id).await?;
        let _turn = self.connection_turn(&record.connection_id).await;

        debug!(
            mediation_id = %mediation_id,
            rules = update.updates.len(),
            "Sending keylist update"
        );
        self.send(&record.connection_id, MediationMessage::KeylistUpdate(update))
            .await
    }

    /// Ask the mediator of the granted client mediation `mediation_id` for
    /// the keys it holds for us
    pub async fn send_keylist_query(
        &self,
        mediation_id: &MediationId,
        limit: Option<i64>,
        offset: Option<u64>,
    ) -> AgentResult<()> {
        let record = self.granted_client_record(mediation_id).await?;
        let _turn = self.connection_turn(&record.connection_id).await;

        let query = self.manager().prepare_keylist_query(None, limit, offset);
        self.send(&record.connection_id, MediationMessage::KeylistQuery(query))
            .await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn connection_of(&self, mediation_id: &MediationId) -> AgentResult<ConnectionId> {
        Ok(self.load_any_record(mediation_id).await?.connection_id)
    }

    async fn load_any_record(&self, mediation_id: &MediationId) -> AgentResult<MediationRecord> {
        match MediationRecordStore::retrieve_by_id(&self.effects, mediation_id).await {
            Ok(record) => Ok(record),
            Err(err) if err.is_not_found() => Err(MediationError::NotFound {
                mediation_id: mediation_id.clone(),
            }
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    async fn load_record(
        &self,
        mediation_id: &MediationId,
        role: MediationRole,
    ) -> AgentResult<MediationRecord> {
        let record = self.load_any_record(mediation_id).await?;
        if record.role != role {
            return Err(AgentError::WrongRole {
                mediation_id: mediation_id.clone(),
                expected: role,
            });
        }
        Ok(record)
    }

    async fn granted_client_record(&self, mediation_id: &MediationId) -> AgentResult<MediationRecord> {
        let record = self.load_record(mediation_id, MediationRole::Client).await?;
        record.ensure_granted()?;
        Ok(record)
    }

    async fn send(&self, connection_id: &ConnectionId, message: MediationMessage) -> AgentResult<()> {
        let outbound = OutboundMessage {
            connection_id: connection_id.clone(),
            thread_id: None,
            message,
        };
        self.effects.send_reply(outbound).await?;
        Ok(())
    }
}

impl InMemoryAgent {
    /// Agent over fresh in-memory handlers, with the receiver its outbound
    /// messages arrive on
    pub async fn in_memory(
        config: &AgentConfig,
    ) -> AgentResult<(Self, mpsc::Receiver<OutboundMessage>)> {
        let (transport, outbound) = ChannelTransport::new(OUTBOUND_CHANNEL_CAPACITY);
        let effects = AgentEffects::new(transport, TracingNotifier::new());
        let agent = Self::new(config, effects).await?;
        Ok((agent, outbound))
    }

    /// Load configuration from `path`, apply environment overrides, install
    /// the tracing subscriber and start an in-memory agent
    pub async fn from_config_file(
        path: impl AsRef<Path>,
    ) -> anyhow::Result<(Self, mpsc::Receiver<OutboundMessage>)> {
        let path = path.as_ref();
        let mut config = AgentConfig::load_from_file(path)
            .with_context(|| format!("loading agent configuration from {}", path.display()))?;
        config
            .merge_with_env()
            .context("applying environment overrides")?;
        init_tracing(&config.log_level);

        let started = Self::in_memory(&config)
            .await
            .context("starting mediation agent")?;
        info!(
            endpoint = %config.mediation.default_endpoint,
            open_mediation = config.mediation.open_mediation,
            "Mediation agent started"
        );
        Ok(started)
    }
}

impl<E> fmt::Debug for MediationAgent<E>
where
    E: MediationEffects + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediationAgent")
            .field("protocol", &self.protocol)
            .field("connections", &self.tracked_connections())
            .finish()
    }
}

/// Exclusive use of one connection. Removes the connection's lock entry on
/// drop when no other task holds or awaits it.
struct ConnectionTurn<'a> {
    locks: &'a ConnectionLocks,
    connection_id: ConnectionId,
    guard: Option<MutexGuardArc<()>>,
}

impl Drop for ConnectionTurn<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        drop(self.guard.take());
        if locks
            .get(&self.connection_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.connection_id);
        }
    }
}
