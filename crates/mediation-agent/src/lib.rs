//! # Mediation Agent - Layer 6: Runtime
//!
//! Runs the coordinate-mediation protocol for one agent. [`MediationAgent`]
//! owns the effects bundle and the dispatcher, orders work per connection and
//! exposes the operator actions that originate messages: granting or denying
//! pending requests, requesting mediation and updating or querying the
//! keylist.
//!
//! Configuration comes from [`AgentConfig`], a TOML file overridable through
//! `MEDIATION_*` environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Runtime and operator actions
pub mod agent;

/// Agent configuration
pub mod config;

/// Agent errors
pub mod error;

/// Tracing setup
pub mod logging;

pub use agent::{InMemoryAgent, MediationAgent, OUTBOUND_CHANNEL_CAPACITY};
pub use config::{AgentConfig, CONFIG_KEYS, ENV_PREFIX};
pub use error::{AgentError, AgentResult};
pub use logging::init_tracing;
