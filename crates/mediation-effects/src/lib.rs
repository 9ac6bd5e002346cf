//! # Mediation Effects - Layer 3: Implementation
//!
//! Stateless-by-interface handlers for the collaborators declared in
//! `mediation-core`:
//!
//! - [`MemoryRecordStore`]: insertion-ordered, tag-indexed record store
//! - [`LocalKeyIssuer`]: ed25519 DID issuance
//! - [`ConnectionRegistry`]: connection readiness oracle
//! - [`ChannelTransport`]: reply delivery into an mpsc channel
//! - [`TracingNotifier`]: change notifications as tracing events
//!
//! [`AgentEffects`] bundles one of each so protocol handlers can take a
//! single effects reference.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Connection readiness registry
pub mod connection;

/// Local key issuance
pub mod keys;

/// Change notification sink
pub mod notification;

/// In-memory record store
pub mod storage;

/// Channel-backed transport
pub mod transport;

mod bundle;

pub use bundle::AgentEffects;
pub use connection::{ConnectionRegistry, ConnectionState};
pub use keys::{LocalKeyIssuer, LOCAL_DID_METHOD};
pub use notification::TracingNotifier;
pub use storage::MemoryRecordStore;
pub use transport::ChannelTransport;
