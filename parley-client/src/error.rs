use crate::session::{ConnectionState, LocalDescriptionState, RemoteDescriptionState, Role};
use parley_core::{CodecError, PeerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("signaling transport is closed")]
    Closed,

    #[error("websocket failure: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("cannot {op} for {peer_id}: session is {role}, connection {state:?}, local {local:?}, remote {remote:?}")]
    InvalidState {
        peer_id: PeerId,
        op: &'static str,
        role: Role,
        state: ConnectionState,
        local: LocalDescriptionState,
        remote: RemoteDescriptionState,
    },

    #[error("unexpected answer from {peer_id} (local {local:?}, remote {remote:?})")]
    UnexpectedAnswer {
        peer_id: PeerId,
        local: LocalDescriptionState,
        remote: RemoteDescriptionState,
    },

    #[error("session for {peer_id} is {existing}, {requested} was requested")]
    RoleConflict {
        peer_id: PeerId,
        existing: Role,
        requested: Role,
    },

    #[error("room has not been joined yet")]
    NotJoined,

    #[error("local media is unavailable; outgoing calls are disabled")]
    MediaUnavailable,

    #[error("connection failure for {peer_id} during {op}: {cause:#}")]
    Connection {
        peer_id: PeerId,
        op: &'static str,
        cause: anyhow::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("signaling router has stopped")]
    RouterClosed,
}

impl NegotiationError {
    /// Late, duplicated or reordered signaling. Logged and dropped, never fatal.
    pub fn is_protocol_desync(&self) -> bool {
        matches!(
            self,
            NegotiationError::InvalidState { .. }
                | NegotiationError::UnexpectedAnswer { .. }
                | NegotiationError::RoleConflict { .. }
        )
    }
}
