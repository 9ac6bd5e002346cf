//! # Mediation Testkit
//!
//! Recording effect handlers and fixtures shared by the mediation test
//! suites. [`TestEffects`] is the production [`AgentEffects`] bundle with the
//! transport and notifier swapped for recording versions, so tests can
//! assert on what was sent and what was published.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use mediation_core::effects::{
    NotificationEffects, NotificationError, RecordEvent, TransportEffects, TransportError,
};
use mediation_core::{ConnectionId, MediationMessage, OutboundMessage};
use mediation_effects::{AgentEffects, ConnectionState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Effects bundle used throughout the mediation tests
pub type TestEffects = AgentEffects<RecordingTransport, RecordingNotifier>;

/// Fresh in-memory effects with recording transport and notifier
pub fn test_effects() -> TestEffects {
    AgentEffects::new(RecordingTransport::new(), RecordingNotifier::new())
}

/// Register `id` as a ready connection and return it
pub async fn ready_connection(effects: &TestEffects, id: &str) -> ConnectionId {
    effects.connections.activate(id).await;
    ConnectionId::new(id)
}

/// Register `id` as a connection that is still being established
pub async fn pending_connection(effects: &TestEffects, id: &str) -> ConnectionId {
    effects
        .connections
        .set_state(id, ConnectionState::Pending)
        .await;
    ConnectionId::new(id)
}

/// Transport that records every reply instead of delivering it
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies sent so far
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Message bodies sent so far
    pub fn sent_messages(&self) -> Vec<MediationMessage> {
        self.sent.lock().iter().map(|m| m.message.clone()).collect()
    }

    /// Drain the recorded replies
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportEffects for RecordingTransport {
    async fn send_reply(&self, reply: OutboundMessage) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                connection_id: reply.connection_id.to_string(),
                reason: "transport disabled by test".to_string(),
            });
        }
        self.sent.lock().push(reply);
        Ok(())
    }
}

/// Notifier that records every event
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<RecordEvent>>>,
}

impl RecordingNotifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far
    pub fn events(&self) -> Vec<RecordEvent> {
        self.events.lock().clone()
    }

    /// Reasons of the events published so far
    pub fn reasons(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.reason.clone()).collect()
    }
}

#[async_trait]
impl NotificationEffects for RecordingNotifier {
    async fn notify(&self, event: RecordEvent) -> Result<(), NotificationError> {
        self.events.lock().push(event);
        Ok(())
    }
}
