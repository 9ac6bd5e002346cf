//! Channel-backed reply transport
//!
//! Hands outbound messages to an mpsc channel drained by the delivery layer.

use async_trait::async_trait;
use mediation_core::effects::{TransportEffects, TransportError};
use mediation_core::OutboundMessage;
use tokio::sync::mpsc;

/// Reply transport writing into an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<OutboundMessage>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its replies arrive on
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TransportEffects for ChannelTransport {
    async fn send_reply(&self, reply: OutboundMessage) -> Result<(), TransportError> {
        self.sender.send(reply).await.map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediation_core::MediationMessage;

    #[tokio::test]
    async fn replies_arrive_on_receiver_until_closed() {
        let (transport, mut receiver) = ChannelTransport::new(4);
        let reply = OutboundMessage {
            connection_id: "c1".into(),
            thread_id: Some("m1".into()),
            message: MediationMessage::problem_report("nope"),
        };

        transport.send_reply(reply.clone()).await.unwrap();
        assert_eq!(receiver.recv().await, Some(reply.clone()));

        drop(receiver);
        assert_eq!(transport.send_reply(reply).await, Err(TransportError::Closed));
    }
}
