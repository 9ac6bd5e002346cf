//! Recipient-side operations

use super::MediationManager;
use crate::error::{MediationError, MediationResult};
use crate::record::{MediationRecord, MediationRecordStore, MediationRole, MediationState};
use mediation_core::effects::{CoordinatorEffects, RecordStorageEffects, StorageRecord};
use mediation_core::messages::{
    KeylistAction, KeylistQuery, KeylistQueryPaginate, KeylistUpdate, KeylistUpdateRule,
    KeylistUpdated, MediationDeny, MediationGrant, MediationRequest, UpdateResult,
};
use mediation_core::{ConnectionId, MediationId};
use mediation_routing::{RouteQuery, RouteRecord, RouteRole, RouteStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

const DEFAULT_MEDIATOR_RECORD_TYPE: &str = "default_mediator";
const DEFAULT_MEDIATOR_RECORD_ID: &str = "default_mediator";

/// What a batch of keylist update results changed locally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationSummary {
    /// Client routes created or re-homed
    pub saved: usize,
    /// Client routes deleted
    pub removed: usize,
    /// Results that were not applied
    pub skipped: usize,
}

/// Routing details a recipient advertises to senders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingInfo {
    /// Mediator routing keys, outermost last
    pub routing_keys: Vec<String>,
    /// Mediator endpoint
    pub endpoint: Option<String>,
}

impl MediationManager {
    // ========================================================================
    // Mediation requests
    // ========================================================================

    /// Create and persist a client record for a request to the mediator on
    /// `connection_id`.
    ///
    /// No existence check is made on the client side.
    pub async fn prepare_request<E>(
        &self,
        effects: &E,
        connection_id: &ConnectionId,
        mediator_terms: Vec<String>,
        recipient_terms: Vec<String>,
    ) -> MediationResult<(MediationRecord, MediationRequest)>
    where
        E: CoordinatorEffects + ?Sized,
    {
        let record = MediationRecord::new(
            MediationRole::Client,
            connection_id.clone(),
            mediator_terms,
            recipient_terms,
        );
        MediationRecordStore::save_with_notification(effects, &record, "Mediation request prepared")
            .await?;
        let request = MediationRequest::new(
            record.mediator_terms.clone(),
            record.recipient_terms.clone(),
        );
        debug!(
            mediation_id = %record.mediation_id,
            connection_id = %connection_id,
            "Prepared mediation request"
        );
        Ok((record, request))
    }

    /// Apply a grant received from the mediator
    pub async fn request_granted<E>(
        &self,
        effects: &E,
        mut record: MediationRecord,
        grant: &MediationGrant,
    ) -> MediationResult<MediationRecord>
    where
        E: CoordinatorEffects + ?Sized,
    {
        record.transition_to(MediationState::Granted)?;
        record.endpoint = Some(grant.endpoint.clone());
        record.routing_keys = grant.routing_keys.clone();
        MediationRecordStore::save_with_notification(effects, &record, "Mediation request granted")
            .await?;
        info!(
            mediation_id = %record.mediation_id,
            endpoint = %grant.endpoint,
            "Mediation granted by mediator"
        );
        Ok(record)
    }

    /// Apply a denial received from the mediator, keeping its counter-terms
    pub async fn request_denied<E>(
        &self,
        effects: &E,
        mut record: MediationRecord,
        deny: &MediationDeny,
    ) -> MediationResult<MediationRecord>
    where
        E: CoordinatorEffects + ?Sized,
    {
        record.transition_to(MediationState::Denied)?;
        record.mediator_terms = deny.mediator_terms.clone();
        record.recipient_terms = deny.recipient_terms.clone();
        MediationRecordStore::save_with_notification(effects, &record, "Mediation request denied")
            .await?;
        info!(mediation_id = %record.mediation_id, "Mediation denied by mediator");
        Ok(record)
    }

    // ========================================================================
    // Keylist
    // ========================================================================

    /// Build a keylist query. Pagination is included only when a limit or
    /// offset is given; a missing limit means no limit.
    pub fn prepare_keylist_query(
        &self,
        filter: Option<serde_json::Map<String, serde_json::Value>>,
        limit: Option<i64>,
        offset: Option<u64>,
    ) -> KeylistQuery {
        let paginate = (limit.is_some() || offset.is_some()).then(|| KeylistQueryPaginate {
            limit: limit.unwrap_or(-1),
            offset: offset.unwrap_or(0),
        });
        KeylistQuery { filter, paginate }
    }

    /// Append an add rule for `recipient_key`, starting a new update if none
    /// is given
    pub fn add_key(&self, recipient_key: impl Into<String>, update: Option<KeylistUpdate>) -> KeylistUpdate {
        push_rule(update, KeylistUpdateRule::new(recipient_key, KeylistAction::Add))
    }

    /// Append a remove rule for `recipient_key`, starting a new update if none
    /// is given
    pub fn remove_key(&self, recipient_key: impl Into<String>, update: Option<KeylistUpdate>) -> KeylistUpdate {
        push_rule(update, KeylistUpdateRule::new(recipient_key, KeylistAction::Remove))
    }

    /// Reconcile local client routes with a mediator's keylist update
    /// response for `connection_id`.
    ///
    /// Results are processed in order as if applied one at a time. All
    /// additions are persisted before any removal. Unapplied results and
    /// missing routes are logged and skipped; only storage failures abort.
    pub async fn store_update_results<E>(
        &self,
        effects: &E,
        connection_id: &ConnectionId,
        results: &[KeylistUpdated],
    ) -> MediationResult<ReconciliationSummary>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mut summary = ReconciliationSummary::default();
        let mut to_save: Vec<RouteRecord> = Vec::new();
        let mut to_remove: Vec<RouteRecord> = Vec::new();

        for updated in results {
            let recipient_key = updated.recipient_key.as_str();
            if updated.result != UpdateResult::Success {
                warn!(
                    connection_id = %connection_id,
                    recipient_key,
                    action = ?updated.action,
                    result = ?updated.result,
                    "Mediator did not apply keylist update"
                );
                summary.skipped += 1;
                continue;
            }

            match updated.action {
                KeylistAction::Add => {
                    if let Some(route) = to_save.iter_mut().find(|r| r.recipient_key == recipient_key) {
                        route.connection_id = connection_id.clone();
                        continue;
                    }
                    if let Some(pos) = to_remove.iter().position(|r| r.recipient_key == recipient_key) {
                        let mut route = to_remove.remove(pos);
                        route.connection_id = connection_id.clone();
                        to_save.push(route);
                        continue;
                    }

                    let existing = RouteStore::query(
                        effects,
                        &RouteQuery::new()
                            .role(RouteRole::Client)
                            .recipient_key(recipient_key),
                    )
                    .await?;
                    if existing.len() > 1 {
                        error!(
                            recipient_key,
                            count = existing.len(),
                            "Multiple client routes for recipient key"
                        );
                    }
                    let route = match existing.into_iter().next() {
                        Some(mut route) => {
                            route.connection_id = connection_id.clone();
                            route
                        }
                        None => RouteRecord::new(RouteRole::Client, connection_id.clone(), recipient_key),
                    };
                    to_save.push(route);
                }
                KeylistAction::Remove => {
                    if let Some(pos) = to_save
                        .iter()
                        .position(|r| r.recipient_key == recipient_key && &r.connection_id == connection_id)
                    {
                        to_remove.push(to_save.remove(pos));
                        continue;
                    }

                    let routes = RouteStore::query(
                        effects,
                        &RouteQuery::new()
                            .role(RouteRole::Client)
                            .connection(connection_id)
                            .recipient_key(recipient_key),
                    )
                    .await?;
                    match routes.len() {
                        0 => {
                            warn!(
                                connection_id = %connection_id,
                                recipient_key,
                                "No client route to remove"
                            );
                            summary.skipped += 1;
                        }
                        1 => {}
                        count => error!(
                            recipient_key,
                            count,
                            "Multiple client routes for recipient key"
                        ),
                    }
                    if let Some(route) = routes.into_iter().next() {
                        if !to_remove.iter().any(|r| r.route_id == route.route_id) {
                            to_remove.push(route);
                        }
                    }
                }
            }
        }

        for route in &to_save {
            RouteStore::save(effects, route).await?;
            summary.saved += 1;
        }
        for route in &to_remove {
            match RouteStore::delete(effects, route).await {
                Ok(()) => summary.removed += 1,
                Err(err) if err.is_not_found() => {
                    debug!(recipient_key = %route.recipient_key, "Client route already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }

        debug!(
            connection_id = %connection_id,
            saved = summary.saved,
            removed = summary.removed,
            skipped = summary.skipped,
            "Stored keylist update results"
        );
        Ok(summary)
    }

    /// Client routes, optionally limited to one mediator connection
    pub async fn get_my_keylist<E>(
        &self,
        effects: &E,
        connection_id: Option<&ConnectionId>,
    ) -> MediationResult<Vec<RouteRecord>>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mut query = RouteQuery::new().role(RouteRole::Client);
        if let Some(connection_id) = connection_id {
            query = query.connection(connection_id);
        }
        Ok(RouteStore::query(effects, &query).await?)
    }

    // ========================================================================
    // Default mediator
    // ========================================================================

    /// Id of the default mediation, if one is set
    pub async fn get_default_mediator_id<E>(&self, effects: &E) -> MediationResult<Option<MediationId>>
    where
        E: RecordStorageEffects + ?Sized,
    {
        match effects
            .get_record(DEFAULT_MEDIATOR_RECORD_TYPE, DEFAULT_MEDIATOR_RECORD_ID)
            .await
        {
            Ok(record) => Ok(Some(MediationId::new(record.value))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The default mediation record, if one is set and still exists
    pub async fn get_default_mediator<E>(&self, effects: &E) -> MediationResult<Option<MediationRecord>>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let Some(mediation_id) = self.get_default_mediator_id(effects).await? else {
            return Ok(None);
        };
        match MediationRecordStore::retrieve_by_id(effects, &mediation_id).await {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => {
                warn!(mediation_id = %mediation_id, "Default mediator record no longer exists");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Make the mediation with `mediation_id` the default
    pub async fn set_default_mediator_by_id<E>(
        &self,
        effects: &E,
        mediation_id: &MediationId,
    ) -> MediationResult<()>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let record = match MediationRecordStore::retrieve_by_id(effects, mediation_id).await {
            Ok(record) => record,
            Err(err) if err.is_not_found() => {
                return Err(MediationError::NotFound {
                    mediation_id: mediation_id.clone(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        self.set_default_mediator(effects, &record).await
    }

    /// Make `record` the default mediation
    pub async fn set_default_mediator<E>(&self, effects: &E, record: &MediationRecord) -> MediationResult<()>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let stored = StorageRecord::new(
            DEFAULT_MEDIATOR_RECORD_TYPE,
            DEFAULT_MEDIATOR_RECORD_ID,
            record.mediation_id.as_str(),
        );
        match effects.update_record(stored.clone()).await {
            Err(err) if err.is_not_found() => effects.add_record(stored).await?,
            other => other?,
        }
        info!(mediation_id = %record.mediation_id, "Set default mediator");
        Ok(())
    }

    /// Unset the default mediation. Clearing when none is set is a no-op.
    pub async fn clear_default_mediator<E>(&self, effects: &E) -> MediationResult<()>
    where
        E: RecordStorageEffects + ?Sized,
    {
        match effects
            .delete_record(DEFAULT_MEDIATOR_RECORD_TYPE, DEFAULT_MEDIATOR_RECORD_ID)
            .await
        {
            Ok(()) => {
                info!("Cleared default mediator");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    // ========================================================================
    // Routing resolution
    // ========================================================================

    /// The granted mediation to route through: `mediation_id` when given,
    /// otherwise the default mediator. Returns `None` when neither is set.
    pub async fn resolve_granted_mediation<E>(
        &self,
        effects: &E,
        mediation_id: Option<&MediationId>,
    ) -> MediationResult<Option<MediationRecord>>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mediation_id = match mediation_id {
            Some(id) => id.clone(),
            None => match self.get_default_mediator_id(effects).await? {
                Some(id) => id,
                None => return Ok(None),
            },
        };
        let record = match MediationRecordStore::retrieve_by_id(effects, &mediation_id).await {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Err(MediationError::NotFound { mediation_id }),
            Err(err) => return Err(err.into()),
        };
        record.ensure_granted()?;
        Ok(Some(record))
    }

    /// Routing keys and endpoint to advertise for `record`. Ungranted or
    /// absent mediations contribute nothing.
    pub fn routing_info(&self, record: Option<&MediationRecord>) -> RoutingInfo {
        match record {
            Some(record) if record.is_granted() => RoutingInfo {
                routing_keys: record.routing_keys.clone(),
                endpoint: record.endpoint.clone(),
            },
            _ => RoutingInfo::default(),
        }
    }
}

fn push_rule(update: Option<KeylistUpdate>, rule: KeylistUpdateRule) -> KeylistUpdate {
    let mut update = update.unwrap_or_default();
    update.updates.push(rule);
    update
}
