//! # Mediation Core - Layer 1: Foundation
//!
//! **Purpose**: Shared vocabulary for mediation coordination.
//!
//! This crate defines the identifiers, wire messages, configuration and
//! effect traits that the routing, coordination and protocol crates build on.
//!
//! # Architecture Constraints
//!
//! - YES Identifier and message types
//! - YES Effect trait definitions for every external collaborator
//! - NO effect handler implementations (see `mediation-effects`)
//! - NO coordination logic (see `mediation-coordinate`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Mediation behaviour configuration
pub mod config;

/// Effect traits for storage, connections, keys, transport and notifications
pub mod effects;

/// Identifier newtypes
pub mod identifiers;

/// Coordinate-mediation wire messages
pub mod messages;

pub use config::{ConfigError, MediationConfig};
pub use effects::{
    CoordinatorEffects, MediationEffects, RecordStorageEffects, StorageError, StorageRecord,
    TagFilter,
};
pub use identifiers::{ConnectionId, MediationId, RouteId};
pub use messages::{InboundMessage, MediationMessage, MessageType, OutboundMessage};
