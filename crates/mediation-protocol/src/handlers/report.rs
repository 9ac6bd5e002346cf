//! Problem report receipt

use super::MessageHandler;
use crate::context::RequestContext;
use crate::error::DispatchError;
use async_trait::async_trait;
use mediation_core::effects::MediationEffects;
use mediation_core::{MediationMessage, MessageType};
use tracing::warn;

/// Handles `problem-report` in either role. Logs the explanation and never
/// replies.
#[derive(Debug, Clone, Default)]
pub struct ProblemReportHandler;

impl ProblemReportHandler {
    /// Create the handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<E> MessageHandler<E> for ProblemReportHandler
where
    E: MediationEffects + ?Sized,
{
    fn message_type(&self) -> MessageType {
        MessageType::ProblemReport
    }

    async fn handle(
        &self,
        context: &RequestContext,
        message: MediationMessage,
        _effects: &E,
    ) -> Result<Option<MediationMessage>, DispatchError> {
        let report = expect_message!(message, ProblemReport);
        warn!(
            connection_id = %context.connection_id,
            thread_id = ?context.message_id,
            explanation = %report.explain_ltxt,
            "Received problem report"
        );
        Ok(None)
    }
}
