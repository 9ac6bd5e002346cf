//! Message handlers
//!
//! One handler per message type. Every handler runs after the dispatcher has
//! confirmed the connection is ready, resolves the mediation record for the
//! connection, checks its own preconditions and returns the reply to send,
//! if any. Records are persisted before the reply is returned.

/// Unwrap the payload of the expected message variant
macro_rules! expect_message {
    ($message:expr, $variant:ident) => {
        match $message {
            mediation_core::MediationMessage::$variant(body) => body,
            other => {
                return Err($crate::error::DispatchError::UnexpectedMessage {
                    expected: mediation_core::MessageType::$variant,
                    actual: other.message_type(),
                })
            }
        }
    };
}

mod client;
mod report;
mod server;

pub use client::{
    KeylistHandler, KeylistUpdateResponseHandler, MediationDenyHandler, MediationGrantHandler,
};
pub use report::ProblemReportHandler;
pub use server::{KeylistQueryHandler, KeylistUpdateHandler, MediationRequestHandler};

use crate::context::RequestContext;
use crate::error::DispatchError;
use async_trait::async_trait;
use mediation_core::effects::MediationEffects;
use mediation_core::{MediationMessage, MessageType};

/// Problem report sent when a second request arrives on a connection
pub const REQUEST_EXISTS: &str = "Mediation request already exists from this connection.";

/// Problem report sent for keylist operations without a granted mediation
pub const NOT_GRANTED: &str = "Mediation has not been granted for this connection.";

/// Problem report sent when a keylist message has no mediation to apply to
pub const NO_MEDIATION_FOR_KEYLIST: &str = "No mediation found for keylist.";

/// Handler for one message type
#[async_trait]
pub trait MessageHandler<E>: Send + Sync
where
    E: MediationEffects + ?Sized,
{
    /// The message type this handler accepts
    fn message_type(&self) -> MessageType;

    /// Handle `message`, returning the reply to send, if any
    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError>;
}
