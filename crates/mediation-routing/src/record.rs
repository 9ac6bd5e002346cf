//! Route records and their persistence
//!
//! A route maps a recipient key to the connection messages for that key are
//! forwarded over. Server routes form a mediator's forwarding table; client
//! routes mirror the keys a recipient has registered with its mediators.

use mediation_core::effects::{tag_filter, RecordStorageEffects, StorageError, StorageRecord, TagFilter};
use mediation_core::{ConnectionId, RouteId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage record type for routes
pub const ROUTE_RECORD_TYPE: &str = "forward_route";

const TAG_ROLE: &str = "role";
const TAG_CONNECTION_ID: &str = "connection_id";
const TAG_RECIPIENT_KEY: &str = "recipient_key";

/// Which side of a mediation relationship owns a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteRole {
    /// Route in a mediator's forwarding table
    Server,
    /// Recipient-side mirror of a registered key
    Client,
}

impl RouteRole {
    /// Tag value used for queries
    pub fn as_str(self) -> &'static str {
        match self {
            RouteRole::Server => "server",
            RouteRole::Client => "client",
        }
    }
}

impl fmt::Display for RouteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One forwarding table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Record identifier
    pub route_id: RouteId,
    /// Owning side
    pub role: RouteRole,
    /// Connection messages for `recipient_key` travel over
    pub connection_id: ConnectionId,
    /// Forwarded key
    pub recipient_key: String,
}

impl RouteRecord {
    /// Create a new, unsaved route with a fresh id
    pub fn new(
        role: RouteRole,
        connection_id: ConnectionId,
        recipient_key: impl Into<String>,
    ) -> Self {
        Self {
            route_id: RouteId::new_random(),
            role,
            connection_id,
            recipient_key: recipient_key.into(),
        }
    }

    /// Encode as a storage record
    pub fn to_storage(&self) -> Result<StorageRecord, StorageError> {
        let value = serde_json::to_string(self)?;
        Ok(StorageRecord::new(ROUTE_RECORD_TYPE, self.route_id.as_str(), value)
            .with_tag(TAG_ROLE, self.role.as_str())
            .with_tag(TAG_CONNECTION_ID, self.connection_id.as_str())
            .with_tag(TAG_RECIPIENT_KEY, self.recipient_key.as_str()))
    }

    /// Decode from a storage record
    pub fn from_storage(record: &StorageRecord) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(&record.value)?)
    }
}

/// Tag-based route lookup. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteQuery {
    /// Restrict to one role
    pub role: Option<RouteRole>,
    /// Restrict to one connection
    pub connection_id: Option<ConnectionId>,
    /// Restrict to one key
    pub recipient_key: Option<String>,
}

impl RouteQuery {
    /// Query matching every route
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to `role`
    pub fn role(mut self, role: RouteRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Restrict to `connection_id`
    pub fn connection(mut self, connection_id: &ConnectionId) -> Self {
        self.connection_id = Some(connection_id.clone());
        self
    }

    /// Restrict to `recipient_key`
    pub fn recipient_key(mut self, recipient_key: impl Into<String>) -> Self {
        self.recipient_key = Some(recipient_key.into());
        self
    }

    fn to_filter(&self) -> TagFilter {
        let mut filter = TagFilter::new();
        if let Some(role) = self.role {
            filter.insert(TAG_ROLE.to_string(), role.as_str().to_string());
        }
        if let Some(connection_id) = &self.connection_id {
            filter.insert(TAG_CONNECTION_ID.to_string(), connection_id.to_string());
        }
        if let Some(recipient_key) = &self.recipient_key {
            filter.insert(TAG_RECIPIENT_KEY.to_string(), recipient_key.clone());
        }
        filter
    }
}

/// Route persistence over a [`RecordStorageEffects`] handler
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteStore;

impl RouteStore {
    /// Insert or replace a route
    pub async fn save<E>(effects: &E, route: &RouteRecord) -> Result<(), StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let record = route.to_storage()?;
        match effects.update_record(record.clone()).await {
            Err(err) if err.is_not_found() => effects.add_record(record).await,
            other => other,
        }
    }

    /// Delete a route
    pub async fn delete<E>(effects: &E, route: &RouteRecord) -> Result<(), StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        effects
            .delete_record(ROUTE_RECORD_TYPE, route.route_id.as_str())
            .await
    }

    /// Fetch a route by id
    pub async fn retrieve_by_id<E>(effects: &E, route_id: &RouteId) -> Result<RouteRecord, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let record = effects
            .get_record(ROUTE_RECORD_TYPE, route_id.as_str())
            .await?;
        RouteRecord::from_storage(&record)
    }

    /// Fetch the single route for `recipient_key`, optionally within one role
    pub async fn retrieve_by_recipient_key<E>(
        effects: &E,
        recipient_key: &str,
        role: Option<RouteRole>,
    ) -> Result<RouteRecord, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mut filter = tag_filter([(TAG_RECIPIENT_KEY, recipient_key)]);
        if let Some(role) = role {
            filter.insert(TAG_ROLE.to_string(), role.as_str().to_string());
        }
        let record = effects
            .find_unique_record(ROUTE_RECORD_TYPE, &filter)
            .await?;
        RouteRecord::from_storage(&record)
    }

    /// Every route matching `query`, in storage order
    pub async fn query<E>(effects: &E, query: &RouteQuery) -> Result<Vec<RouteRecord>, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        effects
            .find_records(ROUTE_RECORD_TYPE, &query.to_filter())
            .await?
            .iter()
            .map(RouteRecord::from_storage)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_record_carries_query_tags() {
        let route = RouteRecord::new(RouteRole::Client, ConnectionId::from("c1"), "key-1");
        let record = route.to_storage().unwrap();

        assert_eq!(record.record_type, ROUTE_RECORD_TYPE);
        assert_eq!(record.id, route.route_id.as_str());
        assert!(record.matches(
            &RouteQuery::new()
                .role(RouteRole::Client)
                .connection(&ConnectionId::from("c1"))
                .recipient_key("key-1")
                .to_filter()
        ));
        assert!(!record.matches(&RouteQuery::new().role(RouteRole::Server).to_filter()));
        assert_eq!(RouteRecord::from_storage(&record).unwrap(), route);
    }

    #[test]
    fn empty_query_has_empty_filter() {
        assert!(RouteQuery::new().to_filter().is_empty());
    }
}
