//! Wire messages for the coordinate-mediation protocol
//!
//! Every message the subsystem consumes or produces is a variant of the
//! closed [`MediationMessage`] union. The union is internally tagged by the
//! `@type` URI, so each variant carries its own typed body and the dispatch
//! layer never inspects runtime types.

mod coordinate;

pub use coordinate::{
    Keylist, KeylistAction, KeylistKey, KeylistQuery, KeylistQueryPaginate,
    KeylistQueryPagination, KeylistUpdate, KeylistUpdateResponse, KeylistUpdateRule,
    KeylistUpdated, MediationDeny, MediationGrant, MediationRequest, UpdateResult,
};

use crate::identifiers::ConnectionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol family prefix for coordinate-mediation messages
pub const COORDINATE_MEDIATION_PREFIX: &str = "https://didcomm.org/coordinate-mediation/1.0";

/// Message type URI constants
pub mod types {
    /// Mediation request
    pub const MEDIATE_REQUEST: &str = "https://didcomm.org/coordinate-mediation/1.0/mediate-request";
    /// Mediation grant
    pub const MEDIATE_GRANT: &str = "https://didcomm.org/coordinate-mediation/1.0/mediate-grant";
    /// Mediation deny
    pub const MEDIATE_DENY: &str = "https://didcomm.org/coordinate-mediation/1.0/mediate-deny";
    /// Keylist update
    pub const KEYLIST_UPDATE: &str = "https://didcomm.org/coordinate-mediation/1.0/keylist-update";
    /// Keylist update response
    pub const KEYLIST_UPDATE_RESPONSE: &str =
        "https://didcomm.org/coordinate-mediation/1.0/keylist-update-response";
    /// Keylist query
    pub const KEYLIST_QUERY: &str = "https://didcomm.org/coordinate-mediation/1.0/keylist-query";
    /// Keylist
    pub const KEYLIST: &str = "https://didcomm.org/coordinate-mediation/1.0/keylist";
    /// Problem report
    pub const PROBLEM_REPORT: &str = "https://didcomm.org/notification/1.0/problem-report";
}

/// Negative acknowledgment carrying a human-readable explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemReport {
    /// Explanation shown to the remote party
    #[serde(rename = "explain-ltxt")]
    pub explain_ltxt: String,
}

impl ProblemReport {
    /// Create a problem report
    pub fn new(explanation: impl Into<String>) -> Self {
        Self {
            explain_ltxt: explanation.into(),
        }
    }
}

/// Discriminant of [`MediationMessage`], used as the dispatch table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    /// `mediate-request`
    MediationRequest,
    /// `mediate-grant`
    MediationGrant,
    /// `mediate-deny`
    MediationDeny,
    /// `keylist-update`
    KeylistUpdate,
    /// `keylist-update-response`
    KeylistUpdateResponse,
    /// `keylist-query`
    KeylistQuery,
    /// `keylist`
    Keylist,
    /// `problem-report`
    ProblemReport,
}

impl MessageType {
    /// Every message type
    pub const ALL: [MessageType; 8] = [
        MessageType::MediationRequest,
        MessageType::MediationGrant,
        MessageType::MediationDeny,
        MessageType::KeylistUpdate,
        MessageType::KeylistUpdateResponse,
        MessageType::KeylistQuery,
        MessageType::Keylist,
        MessageType::ProblemReport,
    ];

    /// The `@type` URI for this message type
    pub const fn uri(self) -> &'static str {
        match self {
            MessageType::MediationRequest => types::MEDIATE_REQUEST,
            MessageType::MediationGrant => types::MEDIATE_GRANT,
            MessageType::MediationDeny => types::MEDIATE_DENY,
            MessageType::KeylistUpdate => types::KEYLIST_UPDATE,
            MessageType::KeylistUpdateResponse => types::KEYLIST_UPDATE_RESPONSE,
            MessageType::KeylistQuery => types::KEYLIST_QUERY,
            MessageType::Keylist => types::KEYLIST,
            MessageType::ProblemReport => types::PROBLEM_REPORT,
        }
    }

    /// Resolve a `@type` URI
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.uri() == uri)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// Closed set of messages handled by the mediation subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum MediationMessage {
    /// Recipient → mediator
    #[serde(rename = "https://didcomm.org/coordinate-mediation/1.0/mediate-request")]
    MediationRequest(MediationRequest),
    /// Mediator → recipient
    #[serde(rename = "https://didcomm.org/coordinate-mediation/1.0/mediate-grant")]
    MediationGrant(MediationGrant),
    /// Mediator → recipient
    #[serde(rename = "https://didcomm.org/coordinate-mediation/1.0/mediate-deny")]
    MediationDeny(MediationDeny),
    /// Recipient → mediator
    #[serde(rename = "https://didcomm.org/coordinate-mediation/1.0/keylist-update")]
    KeylistUpdate(KeylistUpdate),
    /// Mediator → recipient
    #[serde(rename = "https://didcomm.org/coordinate-mediation/1.0/keylist-update-response")]
    KeylistUpdateResponse(KeylistUpdateResponse),
    /// Recipient → mediator
    #[serde(rename = "https://didcomm.org/coordinate-mediation/1.0/keylist-query")]
    KeylistQuery(KeylistQuery),
    /// Mediator → recipient
    #[serde(rename = "https://didcomm.org/coordinate-mediation/1.0/keylist")]
    Keylist(Keylist),
    /// Either direction
    #[serde(rename = "https://didcomm.org/notification/1.0/problem-report")]
    ProblemReport(ProblemReport),
}

impl MediationMessage {
    /// Dispatch key for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            MediationMessage::MediationRequest(_) => MessageType::MediationRequest,
            MediationMessage::MediationGrant(_) => MessageType::MediationGrant,
            MediationMessage::MediationDeny(_) => MessageType::MediationDeny,
            MediationMessage::KeylistUpdate(_) => MessageType::KeylistUpdate,
            MediationMessage::KeylistUpdateResponse(_) => MessageType::KeylistUpdateResponse,
            MediationMessage::KeylistQuery(_) => MessageType::KeylistQuery,
            MediationMessage::Keylist(_) => MessageType::Keylist,
            MediationMessage::ProblemReport(_) => MessageType::ProblemReport,
        }
    }

    /// Shorthand for a problem report message
    pub fn problem_report(explanation: impl Into<String>) -> Self {
        MediationMessage::ProblemReport(ProblemReport::new(explanation))
    }
}

/// A message received on a connection
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Connection the message arrived on
    pub connection_id: ConnectionId,
    /// Sender-assigned message id, used to thread replies
    pub message_id: Option<String>,
    /// Decoded message
    pub message: MediationMessage,
}

impl InboundMessage {
    /// Create an inbound message without a thread id
    pub fn new(connection_id: impl Into<ConnectionId>, message: MediationMessage) -> Self {
        Self {
            connection_id: connection_id.into(),
            message_id: None,
            message,
        }
    }

    /// Attach the sender's message id
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// A message to be sent on a connection
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Destination connection
    pub connection_id: ConnectionId,
    /// Id of the inbound message this replies to, if any
    pub thread_id: Option<String>,
    /// Message body
    pub message: MediationMessage,
}
