//! Dispatch errors
//!
//! A dispatch error is a local fault: it is returned to the caller and no
//! reply is sent. Business-rule rejections never surface here; handlers turn
//! them into problem reports for the remote party.

use mediation_coordinate::MediationError;
use mediation_core::effects::{ConnectionError, KeyIssuerError, StorageError, TransportError};
use mediation_core::MessageType;

/// Errors raised while dispatching an inbound message
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The message must not be processed, e.g. it arrived on a connection
    /// that is not ready or answers a request that was never made
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// No handler is registered for the message type
    #[error("No handler registered for {0}")]
    NoHandler(MessageType),

    /// A handler was given a message of another type
    #[error("Handler for {expected} received {actual}")]
    UnexpectedMessage {
        /// Type the handler accepts
        expected: MessageType,
        /// Type it was given
        actual: MessageType,
    },

    /// Coordinator failure
    #[error(transparent)]
    Mediation(#[from] MediationError),

    /// Record storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Connection lookup failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Key issuance failure
    #[error(transparent)]
    KeyIssuer(#[from] KeyIssuerError),

    /// Reply could not be sent. State changes made before the send stand.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Create a protocol violation
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation(reason.into())
    }

    /// Whether this is a protocol violation
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }
}
