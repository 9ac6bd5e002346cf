//! Agent errors

use mediation_coordinate::{MediationError, MediationRole};
use mediation_core::effects::{StorageError, TransportError};
use mediation_core::{ConfigError, MediationId};
use mediation_protocol::DispatchError;

/// Errors raised by agent operations
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Configuration could not be loaded or failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Coordinator rejected the operation
    #[error(transparent)]
    Mediation(#[from] MediationError),

    /// Inbound dispatch failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Record store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Outbound message could not be handed to the transport
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Record exists but belongs to the other role
    #[error("Mediation {mediation_id} is not a {expected} record")]
    WrongRole {
        /// Record that was addressed
        mediation_id: MediationId,
        /// Role the operation requires
        expected: MediationRole,
    },
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
