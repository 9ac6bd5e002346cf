//! Handlers for messages a mediator receives

use super::{MessageHandler, NOT_GRANTED, REQUEST_EXISTS};
use crate::context::RequestContext;
use crate::error::DispatchError;
use async_trait::async_trait;
use mediation_coordinate::{MediationError, MediationManager, MediationRecordStore, MediationRole};
use mediation_core::effects::MediationEffects;
use mediation_core::{MediationMessage, MessageType};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles `mediate-request`: records the request and grants it when
/// mediation is open
#[derive(Debug, Clone)]
pub struct MediationRequestHandler {
    manager: Arc<MediationManager>,
}

impl MediationRequestHandler {
    /// Create the handler
    pub fn new(manager: Arc<MediationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<E> MessageHandler<E> for MediationRequestHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::MediationRequest
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let request = expect_message!(message, MediationRequest);
        debug!(connection_id = %context.connection_id, "Handling mediation request");

        let record = match self
            .manager
            .receive_request(effects, &context.connection_id, &request)
            .await
        {
            Ok(record) => record,
            Err(MediationError::AlreadyExists { .. }) => {
                warn!(
                    connection_id = %context.connection_id,
                    "Rejecting duplicate mediation request"
                );
                return Ok(Some(MediationMessage::problem_report(REQUEST_EXISTS)));
            }
            Err(err) => return Err(err.into()),
        };

        if !self.manager.config().open_mediation {
            info!(
                mediation_id = %record.mediation_id,
                "Mediation request awaiting operator decision"
            );
            return Ok(None);
        }

        let (_, grant) = self.manager.grant_request(effects, record).await?;
        Ok(Some(MediationMessage::MediationGrant(grant)))
    }
}

/// Handles `keylist-update`: applies the updates to the forwarding table
#[derive(Debug, Clone)]
pub struct KeylistUpdateHandler {
    manager: Arc<MediationManager>,
}

impl KeylistUpdateHandler {
    /// Create the handler
    pub fn new(manager: Arc<MediationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<E> MessageHandler<E> for KeylistUpdateHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::KeylistUpdate
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let update = expect_message!(message, KeylistUpdate);
        debug!(
            connection_id = %context.connection_id,
            updates = update.updates.len(),
            "Handling keylist update"
        );

        let Some(mut record) = MediationRecordStore::retrieve_by_connection_id(
            effects,
            &context.connection_id,
            Some(MediationRole::Server),
        )
        .await?
        else {
            warn!(connection_id = %context.connection_id, "Keylist update without mediation");
            return Ok(Some(MediationMessage::problem_report(NOT_GRANTED)));
        };

        match self.manager.update_keylist(effects, &mut record, &update).await {
            Ok(response) => Ok(Some(MediationMessage::KeylistUpdateResponse(response))),
            Err(MediationError::NotGranted { state, .. }) => {
                warn!(
                    mediation_id = %record.mediation_id,
                    %state,
                    "Keylist update before grant"
                );
                Ok(Some(MediationMessage::problem_report(NOT_GRANTED)))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Handles `keylist-query`: lists the keys routed for the sender
#[derive(Debug, Clone)]
pub struct KeylistQueryHandler {
    manager: Arc<MediationManager>,
}

impl KeylistQueryHandler {
    /// Create the handler
    pub fn new(manager: Arc<MediationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<E> MessageHandler<E> for KeylistQueryHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::KeylistQuery
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let query = expect_message!(message, KeylistQuery);
        debug!(connection_id = %context.connection_id, "Handling keylist query");

        let record = MediationRecordStore::retrieve_by_connection_id(
            effects,
            &context.connection_id,
            Some(MediationRole::Server),
        )
        .await?;
        let Some(record) = record.filter(|r| r.is_granted()) else {
            warn!(connection_id = %context.connection_id, "Keylist query without granted mediation");
            return Ok(Some(MediationMessage::problem_report(NOT_GRANTED)));
        };

        let routes = self.manager.get_keylist(effects, &record).await?;
        let keylist = self
            .manager
            .create_keylist_query_response(&routes, query.paginate);
        Ok(Some(MediationMessage::Keylist(keylist)))
    }
}
