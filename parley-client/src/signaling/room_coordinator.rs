use crate::config::MediaPolicy;
use anyhow::Result;
use async_trait::async_trait;
use parley_core::{PeerId, RoomId, SignalMessage};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomState {
    /// Transport not open yet.
    #[default]
    Idle,
    /// `join` sent, waiting for `join-success`.
    Joining,
    Ready,
    /// Joined, but local media could not be acquired.
    MediaUnavailable,
    /// Transport closed after having been open.
    Closed,
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomState::Idle => "idle",
            RoomState::Joining => "joining",
            RoomState::Ready => "ready",
            RoomState::MediaUnavailable => "media-unavailable",
            RoomState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Acquires whatever local capture the application needs before it calls.
#[async_trait]
pub trait LocalMedia: Send + Sync {
    async fn acquire(&self) -> Result<()>;
}

/// Data-only clients have nothing to acquire.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocalMedia;

#[async_trait]
impl LocalMedia for NoLocalMedia {
    async fn acquire(&self) -> Result<()> {
        Ok(())
    }
}

/// Something that wants to start a negotiation once the room is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomIntent {
    PeerJoined(PeerId),
    Call(PeerId),
}

impl RoomIntent {
    pub fn peer_id(&self) -> &PeerId {
        match self {
            RoomIntent::PeerJoined(peer_id) | RoomIntent::Call(peer_id) => peer_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Proceed(RoomIntent),
    Deferred,
    Dropped,
}

/// Join handshake and local-media gate in front of the session registry.
pub struct RoomCoordinator {
    room_id: RoomId,
    requested_peer_id: PeerId,
    local_peer_id: Option<PeerId>,
    state: RoomState,
    media_policy: MediaPolicy,
    media: Arc<dyn LocalMedia>,
    deferred: VecDeque<RoomIntent>,
}

impl RoomCoordinator {
    pub fn new(room_id: RoomId, requested_peer_id: PeerId, media_policy: MediaPolicy) -> Self {
        Self {
            room_id,
            requested_peer_id,
            local_peer_id: None,
            state: RoomState::Idle,
            media_policy,
            media: Arc::new(NoLocalMedia),
            deferred: VecDeque::new(),
        }
    }

    pub fn with_local_media(mut self, media: Arc<dyn LocalMedia>) -> Self {
        self.media = media;
        self
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    /// Confirmed by the server; `None` until `join-success`.
    pub fn local_peer_id(&self) -> Option<&PeerId> {
        self.local_peer_id.as_ref()
    }

    pub fn deferred(&self) -> impl Iterator<Item = &RoomIntent> {
        self.deferred.iter()
    }

    /// Returns the `join` to send.
    pub fn on_transport_open(&mut self) -> SignalMessage {
        info!(
            "Joining room {} as {}",
            self.room_id, self.requested_peer_id
        );
        self.state = RoomState::Joining;
        SignalMessage::Join {
            room_id: self.room_id.clone(),
            peer_id: self.requested_peer_id.clone(),
        }
    }

    /// Adopts the confirmed id, passes the media gate and returns the
    /// deferred intents that may now run, in arrival order.
    pub async fn on_join_success(&mut self, peer_id: PeerId) -> Vec<RoomIntent> {
        if peer_id != self.requested_peer_id {
            info!(
                "Server assigned peer id {} (requested {})",
                peer_id, self.requested_peer_id
            );
        }
        info!("Joined room {} as {}", self.room_id, peer_id);
        self.local_peer_id = Some(peer_id);

        if matches!(self.state, RoomState::Ready | RoomState::MediaUnavailable) {
            return Vec::new();
        }
        self.state = match self.media_policy {
            MediaPolicy::NotRequired => RoomState::Ready,
            MediaPolicy::Required => match self.media.acquire().await {
                Ok(()) => {
                    info!("Local media acquired");
                    RoomState::Ready
                }
                Err(e) => {
                    warn!("Local media unavailable: {:#}", e);
                    RoomState::MediaUnavailable
                }
            },
        };

        let deferred: Vec<_> = self.deferred.drain(..).collect();
        if self.state == RoomState::Ready {
            return deferred;
        }
        for intent in deferred {
            warn!(
                "Dropping deferred {:?}: local media unavailable",
                intent
            );
        }
        Vec::new()
    }

    /// Decides whether an intent runs now, waits for readiness, or is dropped.
    pub fn admit(&mut self, intent: RoomIntent) -> Admission {
        match self.state {
            RoomState::Ready => Admission::Proceed(intent),
            RoomState::Idle | RoomState::Joining => {
                info!(
                    "Room not ready ({}); deferring {:?}",
                    self.state, intent
                );
                self.deferred.push_back(intent);
                Admission::Deferred
            }
            RoomState::MediaUnavailable => {
                warn!("Dropping {:?}: local media unavailable", intent);
                Admission::Dropped
            }
            RoomState::Closed => {
                warn!("Dropping {:?}: signaling is closed", intent);
                Admission::Dropped
            }
        }
    }

    pub fn on_transport_closed(&mut self) {
        info!("Left room {}", self.room_id);
        self.state = RoomState::Closed;
        self.deferred.clear();
    }
}
