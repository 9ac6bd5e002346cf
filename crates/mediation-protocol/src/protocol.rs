//! Type-keyed message dispatch

use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::handlers::{
    KeylistHandler, KeylistQueryHandler, KeylistUpdateHandler, KeylistUpdateResponseHandler,
    MediationDenyHandler, MediationGrantHandler, MediationRequestHandler, MessageHandler,
    ProblemReportHandler,
};
use mediation_coordinate::MediationManager;
use mediation_core::effects::{ConnectionEffects, ConnectionError, MediationEffects};
use mediation_core::{InboundMessage, MediationConfig, MessageType, OutboundMessage};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Dispatcher for the coordinate-mediation protocol.
///
/// Holds one handler per [`MessageType`]. Dispatch checks that the
/// connection is ready, runs the handler for the message type and sends the
/// handler's reply, threaded on the inbound message.
pub struct MediationProtocol<E>
where
    E: MediationEffects + ?Sized + 'static,
{
    manager: Arc<MediationManager>,
    handlers: HashMap<MessageType, Arc<dyn MessageHandler<E>>>,
}

impl<E> MediationProtocol<E>
where
    E: MediationEffects + ?Sized + 'static,
{
    /// Create a dispatcher with a handler registered for every message type
    pub fn new(config: MediationConfig) -> Self {
        let manager = Arc::new(MediationManager::new(config));
        let mut protocol = Self {
            manager: manager.clone(),
            handlers: HashMap::new(),
        };
        protocol.register(Arc::new(MediationRequestHandler::new(manager.clone())));
        protocol.register(Arc::new(MediationGrantHandler::new(manager.clone())));
        protocol.register(Arc::new(MediationDenyHandler::new(manager.clone())));
        protocol.register(Arc::new(KeylistUpdateHandler::new(manager.clone())));
        protocol.register(Arc::new(KeylistUpdateResponseHandler::new(manager.clone())));
        protocol.register(Arc::new(KeylistQueryHandler::new(manager)));
        protocol.register(Arc::new(KeylistHandler::new()));
        protocol.register(Arc::new(ProblemReportHandler::new()));
        protocol
    }

    /// Register `handler` for its message type, returning the handler it
    /// replaces
    pub fn register(
        &mut self,
        handler: Arc<dyn MessageHandler<E>>,
    ) -> Option<Arc<dyn MessageHandler<E>>> {
        self.handlers.insert(handler.message_type(), handler)
    }

    /// Whether a handler is registered for `message_type`
    pub fn is_registered(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Registered message types, in declaration order
    pub fn registered_types(&self) -> Vec<MessageType> {
        let mut types: Vec<MessageType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    /// Coordinator shared by the handlers
    pub fn manager(&self) -> &Arc<MediationManager> {
        &self.manager
    }

    /// Handle one inbound message and send its reply.
    ///
    /// Returns the reply that was sent, if any. A failed send is returned as
    /// an error; record changes made by the handler are kept.
    pub async fn dispatch(
        &self,
        inbound: InboundMessage,
        effects: &E,
    ) -> Result<Option<OutboundMessage>, DispatchError> {
        let (context, message) = RequestContext::from_inbound(inbound);
        let message_type = message.message_type();
        ensure_connection_ready(effects, &context, message_type).await?;

        let handler = self
            .handlers
            .get(&message_type)
            .ok_or(DispatchError::NoHandler(message_type))?;
        debug!(
            connection_id = %context.connection_id,
            %message_type,
            "Dispatching message"
        );

        let Some(reply) = handler.handle(&context, message, effects).await? else {
            return Ok(None);
        };
        let outbound = context.reply(reply);
        effects.send_reply(outbound.clone()).await?;
        Ok(Some(outbound))
    }
}

async fn ensure_connection_ready<E>(
    effects: &E,
    context: &RequestContext,
    message_type: MessageType,
) -> Result<(), DispatchError>
where
    E: ConnectionEffects + ?Sized,
{
    match effects.is_connection_ready(&context.connection_id).await {
        Ok(true) => Ok(()),
        Ok(false) | Err(ConnectionError::UnknownConnection(_)) => {
            Err(DispatchError::protocol_violation(format!(
                "Cannot handle {message_type}: connection {} is not ready",
                context.connection_id
            )))
        }
        Err(err) => Err(err.into()),
    }
}

impl<E> fmt::Debug for MediationProtocol<E>
where
    E: MediationEffects + ?Sized + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediationProtocol")
            .field("manager", &self.manager)
            .field("handlers", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediation_testkit::TestEffects;

    #[test]
    fn every_message_type_has_a_handler() {
        let protocol = MediationProtocol::<TestEffects>::new(MediationConfig::default());
        assert_eq!(protocol.registered_types(), MessageType::ALL.to_vec());
    }

    #[test]
    fn registering_replaces_existing_handler() {
        let mut protocol = MediationProtocol::<TestEffects>::new(MediationConfig::default());
        let replaced = protocol.register(Arc::new(ProblemReportHandler::new()));
        assert!(replaced.is_some());
        assert_eq!(protocol.registered_types().len(), MessageType::ALL.len());
    }
}
