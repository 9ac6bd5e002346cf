//! Coordinator errors

use crate::record::MediationState;
use mediation_core::effects::{KeyIssuerError, StorageError};
use mediation_core::{ConnectionId, MediationId};
use mediation_routing::RoutingError;

/// Errors raised by the mediation coordinator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediationError {
    /// A mediation record already exists for the connection
    #[error("Mediation record already exists for connection {connection_id}")]
    AlreadyExists {
        /// Connection the request arrived on
        connection_id: ConnectionId,
    },

    /// The operation requires a granted mediation
    #[error("Mediation {mediation_id} has not been granted (state: {state})")]
    NotGranted {
        /// Mediation that was used
        mediation_id: MediationId,
        /// Its current state
        state: MediationState,
    },

    /// The requested state change is not a legal transition
    #[error("Mediation {mediation_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Mediation being changed
        mediation_id: MediationId,
        /// Current state
        from: MediationState,
        /// Requested state
        to: MediationState,
    },

    /// No mediation record exists with the given id
    #[error("Mediation record not found: {mediation_id}")]
    NotFound {
        /// Missing id
        mediation_id: MediationId,
    },

    /// Underlying record storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Routing table update failed
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Key issuance failed
    #[error(transparent)]
    KeyIssuer(#[from] KeyIssuerError),
}

impl MediationError {
    /// Whether this error is a business-rule violation that should be
    /// reported to the remote party rather than treated as a local fault
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            MediationError::AlreadyExists { .. } | MediationError::NotGranted { .. }
        )
    }
}

/// Result type for coordinator operations
pub type MediationResult<T> = Result<T, MediationError>;
