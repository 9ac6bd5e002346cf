//! Mediation manager
//!
//! `MediationManager` holds configuration only. Effects are passed per call,
//! so one manager serves every connection. Server-side operations live in
//! [`server`], recipient-side operations in [`client`].

mod client;
mod server;

pub use client::{ReconciliationSummary, RoutingInfo};
pub use server::{ROUTING_DID_RECORD_TYPE, ROUTING_DID_TYPE};

use mediation_core::MediationConfig;
use mediation_routing::RoutingManager;

/// Mediation coordinator for both roles
#[derive(Debug, Clone)]
pub struct MediationManager {
    config: MediationConfig,
    routing: RoutingManager,
}

impl MediationManager {
    /// Create a manager with the given behaviour configuration
    pub fn new(config: MediationConfig) -> Self {
        Self {
            config,
            routing: RoutingManager::new(),
        }
    }

    /// Behaviour configuration
    pub fn config(&self) -> &MediationConfig {
        &self.config
    }

    /// Routing manager used for the server-side forwarding table
    pub fn routing(&self) -> &RoutingManager {
        &self.routing
    }
}

impl Default for MediationManager {
    fn default() -> Self {
        Self::new(MediationConfig::default())
    }
}
