//! # Mediation Coordinate - Layer 4: Orchestration
//!
//! The mediation state machine and the keylist coordinator for both sides of
//! a mediation relationship.
//!
//! A mediator records inbound requests, grants or denies them and applies
//! keylist updates to its forwarding table. A recipient records the requests
//! it sends, applies grants and denials, and reconciles its local keylist
//! with the mediator's update responses.
//!
//! All operations take an effects reference per call; no state is held
//! between calls other than configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Keylist and routing action translation
pub mod actions;

/// Coordinator errors
pub mod error;

/// Mediation manager
pub mod manager;

/// Mediation records and persistence
pub mod record;

pub use actions::{keylist_action, route_action};
pub use error::{MediationError, MediationResult};
pub use manager::{MediationManager, ReconciliationSummary, RoutingInfo, ROUTING_DID_RECORD_TYPE};
pub use record::{
    MediationQuery, MediationRecord, MediationRecordStore, MediationRole, MediationState,
    MEDIATION_EVENT_TOPIC, MEDIATION_RECORD_TYPE,
};
