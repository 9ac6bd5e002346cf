//! # Mediation Routing - Layer 2: Domain
//!
//! Route records and the routing manager that maintains a mediator's
//! forwarding table.
//!
//! ## Modules
//!
//! - [`record`]: `RouteRecord`, `RouteQuery` and tag-indexed persistence
//! - [`manager`]: `RoutingManager`, batch route updates and forwarding lookup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Routing manager and route update types
pub mod manager;

/// Route records and persistence
pub mod record;

pub use manager::{RouteAction, RouteUpdate, RouteUpdated, RoutingError, RoutingManager};
pub use record::{RouteQuery, RouteRecord, RouteRole, RouteStore, ROUTE_RECORD_TYPE};
