//! Effect traits for the collaborators the mediation subsystem consumes
//!
//! Domain crates take effects per call (`effects: &E`) rather than storing
//! handlers, so the same coordinator can run against the in-memory handlers
//! in tests and production handlers in an agent.

pub mod connection;
pub mod keys;
pub mod notification;
pub mod storage;
pub mod supertraits;
pub mod transport;

pub use connection::{ConnectionEffects, ConnectionError};
pub use keys::{DidInfo, KeyIssuerEffects, KeyIssuerError};
pub use notification::{NotificationEffects, NotificationError, RecordEvent};
pub use storage::{tag_filter, RecordStorageEffects, StorageError, StorageRecord, TagFilter};
pub use supertraits::{CoordinatorEffects, MediationEffects};
pub use transport::{TransportEffects, TransportError};
