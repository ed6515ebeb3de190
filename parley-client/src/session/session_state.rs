use crate::connection::IceGatheringState;
use parley_core::{CandidateDescriptor, PeerId};
use std::fmt;

/// Fixed when a session is created. Only callers ever produce offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Caller,
    Callee,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Caller => f.write_str("caller"),
            Role::Callee => f.write_str("callee"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalDescriptionState {
    #[default]
    None,
    OfferSent,
    AnswerSent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteDescriptionState {
    #[default]
    None,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Point-in-time copy of everything observable about one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub peer_id: PeerId,
    pub role: Role,
    pub generation: u64,
    pub local_description: LocalDescriptionState,
    pub remote_description: RemoteDescriptionState,
    pub connection: ConnectionState,
    pub pending_local_candidates: Vec<CandidateDescriptor>,
    pub pending_remote_candidates: Vec<CandidateDescriptor>,
    pub ice_gathering: IceGatheringState,
    pub data_channel_open: bool,
}

impl SessionSnapshot {
    /// State of a session whose connection object does not exist yet.
    pub fn initial(peer_id: PeerId, role: Role, generation: u64) -> Self {
        Self {
            peer_id,
            role,
            generation,
            local_description: LocalDescriptionState::None,
            remote_description: RemoteDescriptionState::None,
            connection: ConnectionState::New,
            pending_local_candidates: Vec::new(),
            pending_remote_candidates: Vec::new(),
            ice_gathering: IceGatheringState::New,
            data_channel_open: false,
        }
    }
}
