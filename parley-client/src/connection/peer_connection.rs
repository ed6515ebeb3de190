use crate::connection::ConnectionEvent;
use anyhow::Result;
use async_trait::async_trait;
use parley_core::{CandidateDescriptor, PeerId};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Capabilities the negotiation core needs from an underlying peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds one connection object per session.
///
/// `events` is the session's private channel; the connection must report
/// everything listed in [`ConnectionEvent`] through it.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: &PeerId,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Box<dyn PeerConnection>>;
}
