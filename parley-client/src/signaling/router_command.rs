use crate::error::NegotiationError;
use crate::session::SessionView;
use crate::signaling::RoomState;
use parley_core::PeerId;
use tokio::sync::{mpsc, oneshot, watch};

/// Local intents, processed by the router task in order with inbound traffic.
#[derive(Debug)]
pub enum RouterCommand {
    /// Start negotiating with a peer as caller.
    Call {
        peer_id: PeerId,
        reply: oneshot::Sender<Result<(), NegotiationError>>,
    },

    /// Close one session. Replies whether it existed.
    EndCall {
        peer_id: PeerId,
        reply: oneshot::Sender<bool>,
    },

    /// Close every session. Replies with how many were closed.
    EndAll { reply: oneshot::Sender<usize> },

    /// Close every session and stop the router.
    Shutdown,
}

/// Room-level state published by the router after every step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomStatus {
    pub state: RoomState,
    pub local_peer_id: Option<PeerId>,
}

/// Cloneable handle the UI uses to drive and observe a router.
#[derive(Clone)]
pub struct RouterHandle {
    commands: mpsc::Sender<RouterCommand>,
    view: SessionView,
    room: watch::Receiver<RoomStatus>,
}

impl RouterHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<RouterCommand>,
        view: SessionView,
        room: watch::Receiver<RoomStatus>,
    ) -> Self {
        Self {
            commands,
            view,
            room,
        }
    }

    /// Calls `peer_id`. Before the room is ready the call is deferred and
    /// this returns `Ok` right away.
    pub async fn call(&self, peer_id: impl Into<PeerId>) -> Result<(), NegotiationError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterCommand::Call {
            peer_id: peer_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NegotiationError::RouterClosed)?
    }

    pub async fn end_call(&self, peer_id: impl Into<PeerId>) -> Result<bool, NegotiationError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterCommand::EndCall {
            peer_id: peer_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NegotiationError::RouterClosed)
    }

    pub async fn end_all(&self) -> Result<usize, NegotiationError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterCommand::EndAll { reply }).await?;
        rx.await.map_err(|_| NegotiationError::RouterClosed)
    }

    pub async fn shutdown(&self) -> Result<(), NegotiationError> {
        self.send(RouterCommand::Shutdown).await
    }

    pub fn sessions(&self) -> &SessionView {
        &self.view
    }

    pub fn room_status(&self) -> RoomStatus {
        self.room.borrow().clone()
    }

    /// Resolves once the room status satisfies `f`.
    pub async fn wait_for_room(
        &self,
        f: impl FnMut(&RoomStatus) -> bool,
    ) -> Result<RoomStatus, NegotiationError> {
        let mut rx = self.room.clone();
        let status = rx
            .wait_for(f)
            .await
            .map_err(|_| NegotiationError::RouterClosed)?;
        Ok(status.clone())
    }

    async fn send(&self, cmd: RouterCommand) -> Result<(), NegotiationError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| NegotiationError::RouterClosed)
    }
}
