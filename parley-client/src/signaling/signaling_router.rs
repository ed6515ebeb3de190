use crate::config::{GlarePolicy, NegotiatorConfig};
use crate::connection::ConnectionFactory;
use crate::error::NegotiationError;
use crate::session::{
    Addressing, Role, SessionCommand, SessionContext, SessionExit, SessionHandle,
    SessionRegistry, SessionView,
};
use crate::signaling::{
    Admission, LocalMedia, RoomCoordinator, RoomIntent, RoomState, RoomStatus, RouterCommand,
    RouterHandle,
};
use crate::transport::{Outbound, SignalSink, TransportEvent};
use parley_core::{PeerId, SignalMessage, WireCodec};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const COMMAND_CAPACITY: usize = 64;

/// Single task that owns the registry and feeds it, in arrival order, with
/// inbound signaling, local commands and session lifecycle reports.
pub struct SignalingRouter {
    config: NegotiatorConfig,
    codec: WireCodec,
    outbound: Outbound,
    factory: Arc<dyn ConnectionFactory>,
    coordinator: RoomCoordinator,
    registry: Option<SessionRegistry>,
    joined_as: Option<PeerId>,
    view: SessionView,
    room_tx: watch::Sender<RoomStatus>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    command_rx: mpsc::Receiver<RouterCommand>,
    exit_tx: mpsc::UnboundedSender<SessionExit>,
    exit_rx: mpsc::UnboundedReceiver<SessionExit>,
}

impl SignalingRouter {
    pub fn new(
        config: NegotiatorConfig,
        sink: Arc<dyn SignalSink>,
        transport_rx: mpsc::Receiver<TransportEvent>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> (Self, RouterHandle) {
        let codec = WireCodec::new(config.sdp_encoding);
        let requested = config.peer_id.clone().unwrap_or_else(PeerId::generate);
        let coordinator =
            RoomCoordinator::new(config.room_id.clone(), requested, config.media_policy);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (room_tx, room_rx) = watch::channel(RoomStatus::default());
        let view = SessionView::new();

        let router = Self {
            config,
            codec,
            outbound: Outbound::new(codec, sink),
            factory,
            coordinator,
            registry: None,
            joined_as: None,
            view: view.clone(),
            room_tx,
            transport_rx,
            command_rx,
            exit_tx,
            exit_rx,
        };
        let handle = RouterHandle::new(command_tx, view, room_rx);
        (router, handle)
    }

    pub fn with_local_media(mut self, media: Arc<dyn LocalMedia>) -> Self {
        self.coordinator = self.coordinator.with_local_media(media);
        self
    }

    pub async fn run(mut self) {
        info!("Signaling router started for room {}", self.config.room_id);
        let mut transport_open = true;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(RouterCommand::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Some(c) => self.handle_command(c),
                        None => {
                            info!("Command channel closed. Shutting down router.");
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv(), if transport_open => {
                    match evt {
                        Some(e) => self.handle_transport_event(e).await,
                        None => {
                            transport_open = false;
                            if self.coordinator.state() != RoomState::Closed {
                                self.on_transport_closed();
                            }
                        }
                    }
                }

                Some(exit) = self.exit_rx.recv() => {
                    if let Some(registry) = self.registry.as_mut() {
                        registry.remove_if_generation(&exit.peer_id, exit.generation);
                    }
                }
            }

            self.publish_room_status();
        }

        if let Some(registry) = self.registry.as_mut() {
            registry.clear();
        }
        info!("Signaling router finished");
    }

    fn handle_command(&mut self, cmd: RouterCommand) {
        match cmd {
            RouterCommand::Call { peer_id, reply } => {
                let result = self.request_call(peer_id);
                let _ = reply.send(result);
            }
            RouterCommand::EndCall { peer_id, reply } => {
                let existed = self
                    .registry
                    .as_mut()
                    .is_some_and(|registry| registry.remove(&peer_id));
                if existed {
                    info!("Call with {} ended", peer_id);
                }
                let _ = reply.send(existed);
            }
            RouterCommand::EndAll { reply } => {
                let count = match self.registry.as_mut() {
                    Some(registry) => {
                        let count = registry.len();
                        registry.clear();
                        count
                    }
                    None => 0,
                };
                info!("Ended {} call(s)", count);
                let _ = reply.send(count);
            }
            RouterCommand::Shutdown => {}
        }
    }

    fn request_call(&mut self, peer_id: PeerId) -> Result<(), NegotiationError> {
        if self.coordinator.local_peer_id() == Some(&peer_id) {
            warn!("Refusing to call ourselves ({})", peer_id);
            return Ok(());
        }
        match self.coordinator.admit(RoomIntent::Call(peer_id)) {
            Admission::Proceed(intent) => self.run_intent(intent),
            Admission::Deferred => Ok(()),
            Admission::Dropped => match self.coordinator.state() {
                RoomState::MediaUnavailable => {
                    Err(NegotiationError::MediaUnavailable)
                }
                _ => Err(NegotiationError::NotJoined),
            },
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                let join = self.coordinator.on_transport_open();
                if let Err(e) = self.outbound.send(&join).await {
                    error!("Failed to send join: {}", e);
                }
            }
            TransportEvent::Message(text) => self.handle_message(&text).await,
            TransportEvent::Error(e) => warn!("Signaling transport error: {}", e),
            TransportEvent::Closed => self.on_transport_closed(),
        }
    }

    async fn handle_message(&mut self, text: &str) {
        let msg = match self.codec.decode(text) {
            Ok(msg) => msg,
            Err(e) if e.is_unknown_kind() => {
                info!("Ignoring signaling message: {}", e);
                return;
            }
            Err(e) => {
                warn!("Dropping malformed signaling message: {}", e);
                return;
            }
        };

        if let Some(to) = msg.target() {
            if self.coordinator.local_peer_id() != Some(to) {
                debug!("Ignoring {} addressed to {}", msg.kind(), to);
                return;
            }
        }
        debug!("<- {}", msg.kind());

        match msg {
            SignalMessage::Join { .. } => {
                debug!("Ignoring server-bound join");
            }
            SignalMessage::JoinSuccess { peer_id } => self.on_join_success(peer_id).await,
            SignalMessage::PeerJoined { peer_id } => {
                if self.coordinator.local_peer_id() == Some(&peer_id) {
                    debug!("Ignoring our own peer-joined");
                    return;
                }
                info!("Peer {} joined", peer_id);
                if let Admission::Proceed(intent) =
                    self.coordinator.admit(RoomIntent::PeerJoined(peer_id))
                {
                    let result = self.run_intent(intent);
                    Self::log_outcome(result);
                }
            }
            SignalMessage::PeerLeft { peer_id } => {
                info!("Peer {} left", peer_id);
                if let Some(registry) = self.registry.as_mut() {
                    registry.remove(&peer_id);
                }
            }
            SignalMessage::Offer { from, sdp, .. } => {
                let result = self.on_offer(from, sdp);
                Self::log_outcome(result);
            }
            SignalMessage::Answer { from, sdp, .. } => {
                self.forward_to_existing(&from, SessionCommand::AcceptAnswer(sdp), "answer");
            }
            SignalMessage::IceCandidate {
                from, candidate, ..
            } => {
                let cmd = SessionCommand::RemoteCandidate(candidate);
                self.forward_to_existing(&from, cmd, "ice-candidate");
            }
        }
    }

    async fn on_join_success(&mut self, peer_id: PeerId) {
        if self.joined_as.as_ref().is_some_and(|joined| *joined != peer_id) {
            info!("Local peer id changed to {}; dropping previous sessions", peer_id);
            if let Some(mut old) = self.registry.take() {
                old.clear();
            }
        }
        self.joined_as = Some(peer_id.clone());

        let replay = self.coordinator.on_join_success(peer_id.clone()).await;

        if self.registry.is_none() {
            let ctx = SessionContext {
                addressing: Addressing {
                    room_id: self.config.room_id.clone(),
                    local_peer_id: peer_id,
                },
                factory: self.factory.clone(),
                outbound: self.outbound.clone(),
                view: self.view.clone(),
                exits: self.exit_tx.clone(),
                data_channel_label: self.config.data_channel_label.clone(),
                negotiation_timeout: self.config.negotiation_timeout(),
                failed_session_grace: self.config.failed_session_grace(),
            };
            self.registry = Some(SessionRegistry::new(Box::new(ctx), self.view.clone()));
        }

        for intent in replay {
            let result = self.run_intent(intent);
            Self::log_outcome(result);
        }
    }

    /// Starts a caller session and its offer, unless one already exists.
    fn run_intent(&mut self, intent: RoomIntent) -> Result<(), NegotiationError> {
        let peer_id = intent.peer_id().clone();
        if self.coordinator.local_peer_id() == Some(&peer_id) {
            return Ok(());
        }
        let registry = self.registry.as_mut().ok_or(NegotiationError::NotJoined)?;

        if let Some(existing) = registry.get(&peer_id) {
            if existing.role() != Role::Caller {
                return Err(NegotiationError::RoleConflict {
                    peer_id,
                    existing: existing.role(),
                    requested: Role::Caller,
                });
            }
            debug!("Already negotiating with {}", peer_id);
            return Ok(());
        }

        let handle = registry.get_or_create(&peer_id, Role::Caller)?.clone();
        Self::dispatch(&handle, SessionCommand::CreateOffer);
        Ok(())
    }

    fn on_offer(&mut self, from: PeerId, sdp: String) -> Result<(), NegotiationError> {
        let glare_policy = self.config.glare_policy;
        let local = self.coordinator.local_peer_id().cloned();
        let registry = self.registry.as_mut().ok_or(NegotiationError::NotJoined)?;

        let handle = match registry.get_or_create(&from, Role::Callee).cloned() {
            Ok(handle) => handle,
            Err(NegotiationError::RoleConflict { .. })
                if glare_policy == GlarePolicy::PeerIdTieBreak =>
            {
                match local {
                    Some(local) if local < from => {
                        info!(
                            "Glare with {}: {} < {}, keeping caller role",
                            from, local, from
                        );
                        return Ok(());
                    }
                    _ => {
                        info!("Glare with {}: yielding caller role and answering", from);
                        registry.remove(&from);
                        registry.get_or_create(&from, Role::Callee)?.clone()
                    }
                }
            }
            Err(e) => return Err(e),
        };

        Self::dispatch(&handle, SessionCommand::AcceptOffer(sdp));
        Ok(())
    }

    fn forward_to_existing(&self, from: &PeerId, cmd: SessionCommand, kind: &str) {
        let handle = self
            .registry
            .as_ref()
            .and_then(|registry| registry.get(from))
            .cloned();
        match handle {
            Some(handle) => Self::dispatch(&handle, cmd),
            None => warn!("Dropping {} from {}: no session", kind, from),
        }
    }

    fn on_transport_closed(&mut self) {
        self.coordinator.on_transport_closed();
        let handles: Vec<SessionHandle> = self
            .registry
            .as_ref()
            .map(|registry| registry.all().cloned().collect())
            .unwrap_or_default();

        if !handles.is_empty() {
            warn!(
                "Signaling transport closed with {} active session(s)",
                handles.len()
            );
        }
        for handle in handles {
            Self::dispatch(&handle, SessionCommand::TransportLost);
        }
    }

    fn dispatch(handle: &SessionHandle, cmd: SessionCommand) {
        if !handle.send(cmd) {
            debug!("Session for {} is gone", handle.peer_id());
        }
    }

    fn log_outcome(result: Result<(), NegotiationError>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_protocol_desync() => warn!("Ignoring out-of-order signaling: {}", e),
            Err(e) => error!("{}", e),
        }
    }

    fn publish_room_status(&self) {
        let status = RoomStatus {
            state: self.coordinator.state(),
            local_peer_id: self.coordinator.local_peer_id().cloned(),
        };
        self.room_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}
