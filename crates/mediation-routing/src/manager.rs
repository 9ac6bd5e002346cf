//! Routing manager
//!
//! Applies route updates to a mediator's forwarding table and answers
//! forwarding lookups. Every update in a batch is applied on its own; a
//! failing update is reported in its result and never aborts the batch.

use crate::record::{RouteQuery, RouteRecord, RouteRole, RouteStore};
use mediation_core::effects::{RecordStorageEffects, StorageError};
use mediation_core::messages::UpdateResult;
use mediation_core::ConnectionId;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Routing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// No route exists for the key
    #[error("No route found for recipient key {recipient_key}")]
    RouteNotFound {
        /// Key that was looked up
        recipient_key: String,
    },

    /// More than one route exists for the key
    #[error("{count} routes found for recipient key {recipient_key}")]
    DuplicateRoute {
        /// Key that was looked up
        recipient_key: String,
        /// Number of routes
        count: usize,
    },

    /// Underlying storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Routing table action.
///
/// Discriminants are stable and index the action translation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    /// Add a route
    Create = 0,
    /// Remove a route
    Delete = 1,
}

impl RouteAction {
    /// Every action, in discriminant order
    pub const ALL: [RouteAction; 2] = [RouteAction::Create, RouteAction::Delete];

    /// Position of this action in translation tables
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A requested change to the routing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUpdate {
    /// Key to route
    pub recipient_key: String,
    /// Requested action
    pub action: RouteAction,
}

/// Outcome of one [`RouteUpdate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUpdated {
    /// Key the update applied to
    pub recipient_key: String,
    /// Requested action
    pub action: RouteAction,
    /// What happened
    pub result: UpdateResult,
}

/// Stateless routing table coordinator.
///
/// Takes effect references per call, following the unified service pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingManager;

impl RoutingManager {
    /// Create a routing manager
    pub fn new() -> Self {
        Self
    }

    /// Resolve the route messages for `recipient_key` should be forwarded over
    pub async fn get_recipient<E>(&self, effects: &E, recipient_key: &str) -> Result<RouteRecord, RoutingError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        RouteStore::retrieve_by_recipient_key(effects, recipient_key, None)
            .await
            .map_err(|err| match err {
                StorageError::NotFound { .. } => RoutingError::RouteNotFound {
                    recipient_key: recipient_key.to_string(),
                },
                StorageError::Duplicate { count, .. } => RoutingError::DuplicateRoute {
                    recipient_key: recipient_key.to_string(),
                    count,
                },
                other => RoutingError::Storage(other),
            })
    }

    /// Server routes for `connection_id`, or every server route when unset
    pub async fn get_routes<E>(
        &self,
        effects: &E,
        connection_id: Option<&ConnectionId>,
    ) -> Result<Vec<RouteRecord>, RoutingError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mut query = RouteQuery::new().role(RouteRole::Server);
        if let Some(connection_id) = connection_id {
            query = query.connection(connection_id);
        }
        Ok(RouteStore::query(effects, &query).await?)
    }

    /// Create and persist a server route
    pub async fn create_route_record<E>(
        &self,
        effects: &E,
        connection_id: &ConnectionId,
        recipient_key: &str,
    ) -> Result<RouteRecord, RoutingError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let route = RouteRecord::new(RouteRole::Server, connection_id.clone(), recipient_key);
        RouteStore::save(effects, &route).await?;
        debug!(
            connection_id = %connection_id,
            recipient_key,
            route_id = %route.route_id,
            "Created route"
        );
        Ok(route)
    }

    /// Delete a route
    pub async fn delete_route_record<E>(&self, effects: &E, route: &RouteRecord) -> Result<(), RoutingError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        RouteStore::delete(effects, route).await?;
        debug!(
            connection_id = %route.connection_id,
            recipient_key = %route.recipient_key,
            "Deleted route"
        );
        Ok(())
    }

    /// Apply `updates` for the client on `connection_id`.
    ///
    /// Returns one result per update, in input order.
    pub async fn update_routes<E>(
        &self,
        effects: &E,
        connection_id: &ConnectionId,
        updates: Vec<RouteUpdate>,
    ) -> Vec<RouteUpdated>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mut updated = Vec::with_capacity(updates.len());
        for update in updates {
            let result = if update.recipient_key.is_empty() {
                UpdateResult::ClientError
            } else {
                match update.action {
                    RouteAction::Create => {
                        self.apply_create(effects, connection_id, &update.recipient_key)
                            .await
                    }
                    RouteAction::Delete => {
                        self.apply_delete(effects, connection_id, &update.recipient_key)
                            .await
                    }
                }
            };
            updated.push(RouteUpdated {
                recipient_key: update.recipient_key,
                action: update.action,
                result,
            });
        }
        updated
    }

    async fn apply_create<E>(&self, effects: &E, connection_id: &ConnectionId, recipient_key: &str) -> UpdateResult
    where
        E: RecordStorageEffects + ?Sized,
    {
        let existing = match RouteStore::query(
            effects,
            &RouteQuery::new()
                .role(RouteRole::Server)
                .recipient_key(recipient_key),
        )
        .await
        {
            Ok(existing) => existing,
            Err(err) => {
                error!(recipient_key, error = %err, "Route lookup failed");
                return UpdateResult::ServerError;
            }
        };

        if existing.iter().any(|r| &r.connection_id == connection_id) {
            return UpdateResult::NoChange;
        }
        if let Some(other) = existing.first() {
            warn!(
                recipient_key,
                connection_id = %connection_id,
                owner = %other.connection_id,
                "Recipient key already routed to another connection"
            );
            return UpdateResult::ClientError;
        }

        match self
            .create_route_record(effects, connection_id, recipient_key)
            .await
        {
            Ok(_) => UpdateResult::Success,
            Err(err) => {
                error!(recipient_key, error = %err, "Route creation failed");
                UpdateResult::ServerError
            }
        }
    }

    async fn apply_delete<E>(&self, effects: &E, connection_id: &ConnectionId, recipient_key: &str) -> UpdateResult
    where
        E: RecordStorageEffects + ?Sized,
    {
        let routes = match RouteStore::query(
            effects,
            &RouteQuery::new()
                .role(RouteRole::Server)
                .connection(connection_id)
                .recipient_key(recipient_key),
        )
        .await
        {
            Ok(routes) => routes,
            Err(err) => {
                error!(recipient_key, error = %err, "Route lookup failed");
                return UpdateResult::ServerError;
            }
        };

        if routes.is_empty() {
            return UpdateResult::NoChange;
        }
        for route in &routes {
            if let Err(err) = self.delete_route_record(effects, route).await {
                error!(recipient_key, error = %err, "Route deletion failed");
                return UpdateResult::ServerError;
            }
        }
        UpdateResult::Success
    }
}
