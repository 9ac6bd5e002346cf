//! Per-message request context

use mediation_core::{ConnectionId, InboundMessage, MediationMessage, OutboundMessage};

/// Where an inbound message came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Connection the message arrived on
    pub connection_id: ConnectionId,
    /// Id of the inbound message, used to thread replies
    pub message_id: Option<String>,
}

impl RequestContext {
    /// Context for a message on `connection_id`
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            message_id: None,
        }
    }

    /// Split an inbound message into its context and body
    pub fn from_inbound(inbound: InboundMessage) -> (Self, MediationMessage) {
        let context = Self {
            connection_id: inbound.connection_id,
            message_id: inbound.message_id,
        };
        (context, inbound.message)
    }

    /// Address `message` back to the sender, threaded on the inbound message
    pub fn reply(&self, message: MediationMessage) -> OutboundMessage {
        OutboundMessage {
            connection_id: self.connection_id.clone(),
            thread_id: self.message_id.clone(),
            message,
        }
    }
}
