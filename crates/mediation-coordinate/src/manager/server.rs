//! Mediator-side operations

use super::MediationManager;
use crate::actions::{keylist_action, route_action};
use crate::error::{MediationError, MediationResult};
use crate::record::{MediationRecord, MediationRecordStore, MediationRole, MediationState};
use mediation_core::effects::{
    CoordinatorEffects, DidInfo, KeyIssuerEffects, RecordStorageEffects, StorageError,
    StorageRecord,
};
use mediation_core::messages::{
    Keylist, KeylistKey, KeylistQueryPaginate, KeylistQueryPagination, KeylistUpdate,
    KeylistUpdateResponse, KeylistUpdated, MediationDeny, MediationGrant, MediationRequest,
};
use mediation_core::ConnectionId;
use mediation_routing::{RouteRecord, RouteUpdate};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Storage record type for the mediator's routing DID
pub const ROUTING_DID_RECORD_TYPE: &str = "routing_did";

/// Metadata `type` value stamped on the routing DID
pub const ROUTING_DID_TYPE: &str = "routing_did";

const ROUTING_DID_RECORD_ID: &str = "routing_did";
const TAG_DID: &str = "did";

impl MediationManager {
    // ========================================================================
    // Routing DID
    // ========================================================================

    /// The mediator's routing DID, if one has been created
    pub async fn retrieve_routing_did<E>(&self, effects: &E) -> MediationResult<Option<DidInfo>>
    where
        E: RecordStorageEffects + ?Sized,
    {
        match effects
            .get_record(ROUTING_DID_RECORD_TYPE, ROUTING_DID_RECORD_ID)
            .await
        {
            Ok(record) => Ok(Some(decode_routing_did(&record)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The mediator's routing DID, created on first use.
    ///
    /// The record id is fixed, so concurrent first grants race on the store's
    /// id constraint. The loser discards its fresh key and adopts the winner's.
    pub async fn get_or_create_routing_did<E>(&self, effects: &E) -> MediationResult<DidInfo>
    where
        E: RecordStorageEffects + KeyIssuerEffects + ?Sized,
    {
        if let Some(did) = self.retrieve_routing_did(effects).await? {
            return Ok(did);
        }

        let metadata = BTreeMap::from([("type".to_string(), ROUTING_DID_TYPE.to_string())]);
        let did = effects.create_local_did(metadata).await?;
        let value = serde_json::to_string(&did).map_err(StorageError::from)?;
        let record = StorageRecord::new(ROUTING_DID_RECORD_TYPE, ROUTING_DID_RECORD_ID, value)
            .with_tag(TAG_DID, did.did.as_str());

        match effects.add_record(record).await {
            Ok(()) => {
                info!(did = %did.did, "Created routing DID");
                Ok(did)
            }
            Err(StorageError::DuplicateId { .. }) => {
                debug!(discarded = %did.did, "Routing DID created concurrently");
                let record = effects
                    .get_record(ROUTING_DID_RECORD_TYPE, ROUTING_DID_RECORD_ID)
                    .await?;
                Ok(decode_routing_did(&record)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    // ========================================================================
    // Mediation requests
    // ========================================================================

    /// Record an inbound mediation request on `connection_id`.
    ///
    /// Fails with [`MediationError::AlreadyExists`] if any mediation record
    /// already exists for the connection.
    pub async fn receive_request<E>(
        &self,
        effects: &E,
        connection_id: &ConnectionId,
        request: &MediationRequest,
    ) -> MediationResult<MediationRecord>
    where
        E: CoordinatorEffects + ?Sized,
    {
        if MediationRecordStore::exists_for_connection_id(effects, connection_id).await? {
            return Err(MediationError::AlreadyExists {
                connection_id: connection_id.clone(),
            });
        }

        let record = MediationRecord::new(
            MediationRole::Server,
            connection_id.clone(),
            request.mediator_terms.clone(),
            request.recipient_terms.clone(),
        );
        MediationRecordStore::save_with_notification(effects, &record, "Mediation request received")
            .await?;
        info!(
            mediation_id = %record.mediation_id,
            connection_id = %connection_id,
            "Received mediation request"
        );
        Ok(record)
    }

    /// Grant a mediation request.
    ///
    /// Granting an already granted record refreshes its routing details and
    /// returns a fresh grant message.
    pub async fn grant_request<E>(
        &self,
        effects: &E,
        mut record: MediationRecord,
    ) -> MediationResult<(MediationRecord, MediationGrant)>
    where
        E: CoordinatorEffects + ?Sized,
    {
        record.transition_to(MediationState::Granted)?;
        let routing_did = self.get_or_create_routing_did(effects).await?;
        record.routing_keys = vec![routing_did.verkey];
        record.endpoint = Some(self.config.default_endpoint.clone());
        MediationRecordStore::save_with_notification(effects, &record, "Mediation request granted")
            .await?;

        let grant = MediationGrant {
            endpoint: self.config.default_endpoint.clone(),
            routing_keys: record.routing_keys.clone(),
        };
        info!(
            mediation_id = %record.mediation_id,
            connection_id = %record.connection_id,
            "Granted mediation"
        );
        Ok((record, grant))
    }

    /// Deny a mediation request, optionally proposing counter-terms
    pub async fn deny_request<E>(
        &self,
        effects: &E,
        mut record: MediationRecord,
        mediator_terms: Option<Vec<String>>,
        recipient_terms: Option<Vec<String>>,
    ) -> MediationResult<(MediationRecord, MediationDeny)>
    where
        E: CoordinatorEffects + ?Sized,
    {
        record.transition_to(MediationState::Denied)?;
        if let Some(terms) = &mediator_terms {
            record.mediator_terms = terms.clone();
        }
        if let Some(terms) = &recipient_terms {
            record.recipient_terms = terms.clone();
        }
        MediationRecordStore::save_with_notification(effects, &record, "Mediation request denied")
            .await?;

        let deny = MediationDeny {
            mediator_terms: mediator_terms.unwrap_or_default(),
            recipient_terms: recipient_terms.unwrap_or_default(),
        };
        info!(
            mediation_id = %record.mediation_id,
            connection_id = %record.connection_id,
            "Denied mediation"
        );
        Ok((record, deny))
    }

    // ========================================================================
    // Keylist
    // ========================================================================

    /// Apply a recipient's keylist update to the forwarding table.
    ///
    /// Requires a granted mediation; otherwise nothing is touched. Each rule
    /// is applied independently and the response carries one result per rule
    /// in request order. Successful rules are mirrored into the record's
    /// registered key set.
    pub async fn update_keylist<E>(
        &self,
        effects: &E,
        record: &mut MediationRecord,
        update: &KeylistUpdate,
    ) -> MediationResult<KeylistUpdateResponse>
    where
        E: CoordinatorEffects + ?Sized,
    {
        record.ensure_granted()?;

        let route_updates = update
            .updates
            .iter()
            .map(|rule| RouteUpdate {
                recipient_key: rule.recipient_key.clone(),
                action: route_action(rule.action),
            })
            .collect();
        let results = self
            .routing
            .update_routes(effects, &record.connection_id, route_updates)
            .await;

        let updated: Vec<KeylistUpdated> = results
            .into_iter()
            .map(|result| {
                KeylistUpdated::new(result.recipient_key, keylist_action(result.action), result.result)
            })
            .collect();

        if record.apply_keylist_results(&updated) {
            MediationRecordStore::save_with_notification(effects, record, "Keylist updated")
                .await?;
        }
        debug!(
            mediation_id = %record.mediation_id,
            updates = updated.len(),
            "Applied keylist update"
        );
        Ok(KeylistUpdateResponse { updated })
    }

    /// Server routes for the connection behind `record`. Requires a granted
    /// mediation.
    pub async fn get_keylist<E>(
        &self,
        effects: &E,
        record: &MediationRecord,
    ) -> MediationResult<Vec<RouteRecord>>
    where
        E: RecordStorageEffects + ?Sized,
    {
        record.ensure_granted()?;
        Ok(self
            .routing
            .get_routes(effects, Some(&record.connection_id))
            .await?)
    }

    /// Keylist response for `routes`.
    ///
    /// Without `paginate` every key is listed and no pagination metadata is
    /// attached. With it, `offset` keys are skipped and at most `limit` keys
    /// follow; a negative limit means no limit.
    pub fn create_keylist_query_response(
        &self,
        routes: &[RouteRecord],
        paginate: Option<KeylistQueryPaginate>,
    ) -> Keylist {
        let keys = routes.iter().map(|route| KeylistKey {
            recipient_key: route.recipient_key.clone(),
        });
        let Some(paginate) = paginate else {
            return Keylist {
                keys: keys.collect(),
                pagination: None,
            };
        };

        let total = routes.len();
        let offset = usize::try_from(paginate.offset).unwrap_or(usize::MAX).min(total);
        let limit = usize::try_from(paginate.limit).unwrap_or(usize::MAX);
        let page: Vec<KeylistKey> = keys.skip(offset).take(limit).collect();
        let pagination = KeylistQueryPagination {
            count: page.len() as u64,
            offset: offset as u64,
            remaining: (total - offset - page.len()) as u64,
        };
        Keylist {
            keys: page,
            pagination: Some(pagination),
        }
    }
}

fn decode_routing_did(record: &StorageRecord) -> Result<DidInfo, StorageError> {
    Ok(serde_json::from_str(&record.value)?)
}
