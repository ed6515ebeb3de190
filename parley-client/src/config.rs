use parley_core::{PeerId, RoomId, SdpEncoding};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether local media must be acquired before the room reacts to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaPolicy {
    #[default]
    NotRequired,
    Required,
}

/// What to do when a remote offer arrives for a peer we are already calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlarePolicy {
    /// Log the role conflict and drop the offer.
    #[default]
    Report,
    /// The lexicographically smaller peer id keeps the caller role.
    PeerIdTieBreak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiatorConfig {
    pub room_id: RoomId,
    /// Requested local id; the server may confirm or replace it in `join-success`.
    pub peer_id: Option<PeerId>,
    pub sdp_encoding: SdpEncoding,
    pub media_policy: MediaPolicy,
    pub glare_policy: GlarePolicy,
    /// `None` lets a session sit in `connecting` until the connection reports otherwise.
    pub negotiation_timeout_ms: Option<u64>,
    pub failed_session_grace_ms: u64,
    pub data_channel_label: String,
}

impl NegotiatorConfig {
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Default::default()
        }
    }

    pub fn with_peer_id(mut self, peer_id: impl Into<PeerId>) -> Self {
        self.peer_id = Some(peer_id.into());
        self
    }

    pub fn negotiation_timeout(&self) -> Option<Duration> {
        self.negotiation_timeout_ms.map(Duration::from_millis)
    }

    pub fn failed_session_grace(&self) -> Duration {
        Duration::from_millis(self.failed_session_grace_ms)
    }
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            room_id: RoomId::from("DEFAULT"),
            peer_id: None,
            sdp_encoding: SdpEncoding::default(),
            media_policy: MediaPolicy::default(),
            glare_policy: GlarePolicy::default(),
            negotiation_timeout_ms: Some(30_000),
            failed_session_grace_ms: 5_000,
            data_channel_label: "channel".to_owned(),
        }
    }
}
