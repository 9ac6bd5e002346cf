//! Handlers for messages a recipient receives

use super::{MessageHandler, NO_MEDIATION_FOR_KEYLIST};
use crate::context::RequestContext;
use crate::error::DispatchError;
use async_trait::async_trait;
use mediation_coordinate::{
    MediationError, MediationManager, MediationRecord, MediationRecordStore, MediationRole,
    MediationState,
};
use mediation_core::effects::{MediationEffects, RecordStorageEffects};
use mediation_core::{ConnectionId, MediationMessage, MessageType};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Metadata stamped on keys issued in response to a grant
const GRANT_KEY_METADATA: (&str, &str) = ("mediation_invitation", "true");

async fn requested_record<E>(
    effects: &E,
    connection_id: &ConnectionId,
    decision: &str,
) -> Result<MediationRecord, DispatchError>
where
    E: RecordStorageEffects + ?Sized,
{
    MediationRecordStore::latest_for_connection_id(
        effects,
        connection_id,
        MediationRole::Client,
        MediationState::Requested,
    )
    .await?
    .ok_or_else(|| {
        DispatchError::protocol_violation(format!(
            "Invalid mediation {decision}: no mediation requested on {connection_id}"
        ))
    })
}

fn decision_error(err: MediationError, decision: &str) -> DispatchError {
    match err {
        MediationError::InvalidTransition { from, .. } => DispatchError::protocol_violation(format!(
            "Invalid mediation {decision}: mediation already {from}"
        )),
        other => other.into(),
    }
}

/// Handles `mediate-grant`: records the grant and, depending on
/// configuration, makes it the default mediator and registers a fresh key
#[derive(Debug, Clone)]
pub struct MediationGrantHandler {
    manager: Arc<MediationManager>,
}

impl MediationGrantHandler {
    /// Create the handler
    pub fn new(manager: Arc<MediationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<E> MessageHandler<E> for MediationGrantHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::MediationGrant
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let grant = expect_message!(message, MediationGrant);
        debug!(connection_id = %context.connection_id, "Handling mediation grant");

        let record = requested_record(effects, &context.connection_id, "grant").await?;
        let record = self
            .manager
            .request_granted(effects, record, &grant)
            .await
            .map_err(|err| decision_error(err, "grant"))?;

        let config = self.manager.config();
        if config.set_to_default_on_granted {
            self.manager.set_default_mediator(effects, &record).await?;
        }
        if !config.auto_respond_mediation_grant {
            return Ok(None);
        }

        let metadata = BTreeMap::from([(
            GRANT_KEY_METADATA.0.to_string(),
            GRANT_KEY_METADATA.1.to_string(),
        )]);
        let did = effects.create_local_did(metadata).await?;
        info!(
            mediation_id = %record.mediation_id,
            recipient_key = %did.verkey,
            "Registering new key with mediator"
        );
        let update = self.manager.add_key(did.verkey, None);
        Ok(Some(MediationMessage::KeylistUpdate(update)))
    }
}

/// Handles `mediate-deny`: records the denial and the mediator's counter-terms
#[derive(Debug, Clone)]
pub struct MediationDenyHandler {
    manager: Arc<MediationManager>,
}

impl MediationDenyHandler {
    /// Create the handler
    pub fn new(manager: Arc<MediationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<E> MessageHandler<E> for MediationDenyHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::MediationDeny
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let deny = expect_message!(message, MediationDeny);
        debug!(connection_id = %context.connection_id, "Handling mediation deny");

        let record = requested_record(effects, &context.connection_id, "deny").await?;
        self.manager
            .request_denied(effects, record, &deny)
            .await
            .map_err(|err| decision_error(err, "deny"))?;
        Ok(None)
    }
}

/// Handles `keylist-update-response`: reconciles local routes and mirrors the
/// applied keys into the mediation record
#[derive(Debug, Clone)]
pub struct KeylistUpdateResponseHandler {
    manager: Arc<MediationManager>,
}

impl KeylistUpdateResponseHandler {
    /// Create the handler
    pub fn new(manager: Arc<MediationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<E> MessageHandler<E> for KeylistUpdateResponseHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::KeylistUpdateResponse
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let response = expect_message!(message, KeylistUpdateResponse);
        debug!(
            connection_id = %context.connection_id,
            updated = response.updated.len(),
            "Handling keylist update response"
        );

        let Some(mut record) = MediationRecordStore::latest_for_connection_id(
            effects,
            &context.connection_id,
            MediationRole::Client,
            MediationState::Granted,
        )
        .await?
        else {
            warn!(connection_id = %context.connection_id, "Keylist update response without mediation");
            return Ok(Some(MediationMessage::problem_report(NO_MEDIATION_FOR_KEYLIST)));
        };

        self.manager
            .store_update_results(effects, &context.connection_id, &response.updated)
            .await?;
        if record.apply_keylist_results(&response.updated) {
            MediationRecordStore::save_with_notification(
                effects,
                &record,
                "Keylist update response stored",
            )
            .await?;
        }
        Ok(None)
    }
}

/// Handles `keylist`: logs the keys the mediator reports
#[derive(Debug, Clone, Default)]
pub struct KeylistHandler;

impl KeylistHandler {
    /// Create the handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<E> MessageHandler<E> for KeylistHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::Keylist
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let keylist = expect_message!(message, Keylist);

        let record = MediationRecordStore::latest_for_connection_id(
            effects,
            &context.connection_id,
            MediationRole::Client,
            MediationState::Granted,
        )
        .await?;
        let Some(record) = record else {
            warn!(connection_id = %context.connection_id, "Keylist without mediation");
            return Ok(Some(MediationMessage::problem_report(NO_MEDIATION_FOR_KEYLIST)));
        };

        info!(
            mediation_id = %record.mediation_id,
            keys = ?keylist.recipient_keys().collect::<Vec<_>>(),
            pagination = ?keylist.pagination,
            "Received keylist"
        );
        Ok(None)
    }
}
