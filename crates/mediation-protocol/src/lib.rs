//! # Mediation Protocol - Layer 4: Orchestration
//!
//! Dispatch for the coordinate-mediation protocol. Inbound messages form a
//! closed set ([`mediation_core::MediationMessage`]); each variant is routed
//! through a table keyed by [`mediation_core::MessageType`] to its handler.
//!
//! Every handler follows the same contract:
//!
//! 1. The connection must be ready, otherwise dispatch fails with a
//!    protocol violation and nothing is sent.
//! 2. The mediation record for the connection is resolved. A missing record
//!    yields a problem report, except for grant and deny where it is a
//!    protocol violation.
//! 3. Message-specific preconditions are checked; violations yield a problem
//!    report.
//! 4. The coordinator runs, the record is persisted and the reply is sent.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Per-message request context
pub mod context;

/// Dispatch errors
pub mod error;

/// Message handlers
pub mod handlers;

/// Handler registry and dispatch
pub mod protocol;

pub use context::RequestContext;
pub use error::DispatchError;
pub use handlers::{MessageHandler, NOT_GRANTED, NO_MEDIATION_FOR_KEYLIST, REQUEST_EXISTS};
pub use protocol::MediationProtocol;
