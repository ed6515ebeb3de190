use crate::model::candidate::CandidateDescriptor;
use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// One message on the signaling channel.
///
/// Room-scoped kinds carry no `to`; peer-addressed kinds (`offer`, `answer`,
/// `ice-candidate`) are only actionable by the peer named in `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SignalMessage {
    Join {
        room_id: RoomId,
        peer_id: PeerId,
    },
    JoinSuccess {
        peer_id: PeerId,
    },
    PeerJoined {
        peer_id: PeerId,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    Offer {
        room_id: RoomId,
        from: PeerId,
        to: PeerId,
        sdp: String,
    },
    Answer {
        room_id: RoomId,
        from: PeerId,
        to: PeerId,
        sdp: String,
    },
    IceCandidate {
        room_id: RoomId,
        from: PeerId,
        to: PeerId,
        candidate: CandidateDescriptor,
    },
}

/// Message discriminant, as it appears in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Join,
    JoinSuccess,
    PeerJoined,
    PeerLeft,
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub const ALL: [SignalKind; 7] = [
        SignalKind::Join,
        SignalKind::JoinSuccess,
        SignalKind::PeerJoined,
        SignalKind::PeerLeft,
        SignalKind::Offer,
        SignalKind::Answer,
        SignalKind::IceCandidate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Join => "join",
            SignalKind::JoinSuccess => "join-success",
            SignalKind::PeerJoined => "peer-joined",
            SignalKind::PeerLeft => "peer-left",
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalMessage {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalMessage::Join { .. } => SignalKind::Join,
            SignalMessage::JoinSuccess { .. } => SignalKind::JoinSuccess,
            SignalMessage::PeerJoined { .. } => SignalKind::PeerJoined,
            SignalMessage::PeerLeft { .. } => SignalKind::PeerLeft,
            SignalMessage::Offer { .. } => SignalKind::Offer,
            SignalMessage::Answer { .. } => SignalKind::Answer,
            SignalMessage::IceCandidate { .. } => SignalKind::IceCandidate,
        }
    }

    /// Addressee of a peer-to-peer message; `None` for room-scoped kinds.
    pub fn target(&self) -> Option<&PeerId> {
        match self {
            SignalMessage::Offer { to, .. }
            | SignalMessage::Answer { to, .. }
            | SignalMessage::IceCandidate { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            SignalMessage::Offer { from, .. }
            | SignalMessage::Answer { from, .. }
            | SignalMessage::IceCandidate { from, .. } => Some(from),
            _ => None,
        }
    }

    pub fn sdp(&self) -> Option<&str> {
        match self {
            SignalMessage::Offer { sdp, .. } | SignalMessage::Answer { sdp, .. } => Some(sdp),
            _ => None,
        }
    }

    pub(crate) fn sdp_mut(&mut self) -> Option<&mut String> {
        match self {
            SignalMessage::Offer { sdp, .. } | SignalMessage::Answer { sdp, .. } => Some(sdp),
            _ => None,
        }
    }
}
