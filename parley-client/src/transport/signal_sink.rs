use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Outgoing half of the signaling transport.
///
/// The websocket client, the in-memory test relay and anything else that can
/// carry text frames implement this.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send(&self, text: String) -> Result<(), TransportError>;
}

/// Sink backed by a channel drained by a writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl SignalSink for ChannelSink {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }
}
