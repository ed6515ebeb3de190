use crate::connection::{ConnectionEvent, ConnectionFactory};
use crate::error::NegotiationError;
use crate::session::{
    Addressing, CloseSignal, ConnectionState, NegotiationSession, Role, SessionSnapshot,
    SessionView,
};
use crate::transport::Outbound;
use parley_core::{CandidateDescriptor, PeerId, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

const CONNECTION_EVENT_CAPACITY: usize = 64;

/// Work queued for a session, processed strictly in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    CreateOffer,
    AcceptOffer(String),
    AcceptAnswer(String),
    RemoteCandidate(CandidateDescriptor),
    TransportLost,
}

/// Reported to the router once a failed or closed session has outlived its
/// grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExit {
    pub peer_id: PeerId,
    pub generation: u64,
}

/// The registry's reference to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    peer_id: PeerId,
    role: Role,
    generation: u64,
    commands: mpsc::UnboundedSender<SessionCommand>,
    close: CloseSignal,
}

impl SessionHandle {
    /// A handle plus the receiving end of its command queue.
    ///
    /// The queue is unbounded: the router must never wait on one peer.
    pub fn channel(
        peer_id: PeerId,
        role: Role,
        generation: u64,
    ) -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let handle = Self {
            peer_id,
            role,
            generation,
            commands,
            close: CloseSignal::new(),
        };
        (handle, rx)
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn close_signal(&self) -> CloseSignal {
        self.close.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    /// Queues a command without waiting. Returns `false` if the session is gone.
    pub fn send(&self, command: SessionCommand) -> bool {
        if self.is_closed() {
            return false;
        }
        self.commands.send(command).is_ok()
    }

    /// Marks the session closed. Anything still in flight is discarded.
    pub fn close(&self) {
        self.close.trigger();
    }
}

/// Everything a session task needs besides its own queue.
#[derive(Clone)]
pub struct SessionContext {
    pub addressing: Addressing,
    pub factory: Arc<dyn ConnectionFactory>,
    pub outbound: Outbound,
    pub view: SessionView,
    pub exits: mpsc::UnboundedSender<SessionExit>,
    pub data_channel_label: String,
    pub negotiation_timeout: Option<Duration>,
    pub failed_session_grace: Duration,
}

/// Drives one [`NegotiationSession`] from its queue and its connection's events.
pub struct SessionTask {
    peer_id: PeerId,
    role: Role,
    generation: u64,
    ctx: SessionContext,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    close: CloseSignal,
}

impl SessionTask {
    pub fn new(
        handle: &SessionHandle,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        ctx: SessionContext,
    ) -> Self {
        Self {
            peer_id: handle.peer_id.clone(),
            role: handle.role,
            generation: handle.generation,
            ctx,
            commands,
            close: handle.close_signal(),
        }
    }

    pub async fn run(mut self) {
        info!(
            "Session {} started as {} (generation {})",
            self.peer_id, self.role, self.generation
        );

        let (event_tx, mut event_rx) = mpsc::channel(CONNECTION_EVENT_CAPACITY);
        let created = tokio::select! {
            _ = self.close.closed() => return,
            created = self.ctx.factory.create(&self.peer_id, event_tx) => created,
        };
        let connection = match created {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to create connection for {}: {:#}", self.peer_id, e);
                self.linger_failed().await;
                return;
            }
        };

        let mut session = NegotiationSession::new(
            self.peer_id.clone(),
            self.role,
            self.ctx.addressing.clone(),
            connection,
        )
        .with_data_channel_label(self.ctx.data_channel_label.clone())
        .with_close_signal(self.close.clone());

        if self.close.is_closed() {
            session.close().await;
            return;
        }

        let mut deadline: Option<Instant> = None;
        let mut deadline_armed = false;
        let mut grace_deadline: Option<Instant> = None;
        let mut exit_reported = false;

        loop {
            tokio::select! {
                biased;

                _ = self.close.closed() => break,

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        tokio::select! {
                            _ = self.close.closed() => break,
                            _ = self.handle_command(&mut session, cmd) => {}
                        }
                    }
                    None => break,
                },

                Some(event) = event_rx.recv() => {
                    self.handle_event(&mut session, event).await;
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    warn!("Negotiation with {} timed out", self.peer_id);
                    session.fail();
                }

                _ = sleep_until(grace_deadline.unwrap_or_else(Instant::now)), if grace_deadline.is_some() && !exit_reported => {
                    exit_reported = true;
                    self.report_exit();
                }
            }

            if !deadline_armed && session.connection_state() == ConnectionState::Connecting {
                deadline_armed = true;
                deadline = self.ctx.negotiation_timeout.map(|d| Instant::now() + d);
            }
            if session.connection_state() == ConnectionState::Connected {
                deadline_armed = true;
                deadline = None;
            }
            if session.connection_state().is_terminal() && grace_deadline.is_none() {
                deadline = None;
                grace_deadline = Some(Instant::now() + self.ctx.failed_session_grace);
            }

            self.ctx.view.update(session.snapshot(self.generation));
        }

        session.close().await;
        debug!("Session task for {} finished", self.peer_id);
    }

    async fn handle_command(&self, session: &mut NegotiationSession, cmd: SessionCommand) {
        match cmd {
            SessionCommand::CreateOffer => {
                let result = session.create_offer().await;
                self.forward(session, result).await;
            }
            SessionCommand::AcceptOffer(sdp) => {
                let result = session.accept_offer(sdp).await;
                self.forward(session, result).await;
            }
            SessionCommand::AcceptAnswer(sdp) => {
                if let Err(e) = session.accept_answer(sdp).await {
                    self.report(e);
                }
            }
            SessionCommand::RemoteCandidate(candidate) => {
                session.enqueue_remote_candidate(candidate).await;
            }
            SessionCommand::TransportLost => {
                session.on_transport_lost();
            }
        }
    }

    async fn handle_event(&self, session: &mut NegotiationSession, event: ConnectionEvent) {
        match event {
            ConnectionEvent::LocalCandidate(candidate) => {
                if let Some(msg) = session.on_local_candidate_discovered(candidate) {
                    self.send(session, &msg).await;
                }
            }
            ConnectionEvent::StateChanged(state) => {
                session.on_connection_state_changed(state);
            }
            ConnectionEvent::IceGatheringStateChanged(state) => {
                session.on_ice_gathering_state_changed(state);
            }
            ConnectionEvent::IceConnectionStateChanged(state) => {
                debug!("ICE connection for {} is {:?}", self.peer_id, state);
            }
            ConnectionEvent::DataChannelOpen(label) => {
                session.on_data_channel_open(&label);
            }
        }
    }

    async fn forward(
        &self,
        session: &mut NegotiationSession,
        result: Result<Option<SignalMessage>, NegotiationError>,
    ) {
        match result {
            Ok(Some(msg)) => self.send(session, &msg).await,
            Ok(None) => debug!("Result for closed session {} discarded", self.peer_id),
            Err(e) => self.report(e),
        }
    }

    async fn send(&self, session: &mut NegotiationSession, msg: &SignalMessage) {
        if session.is_closed() {
            return;
        }
        if let Err(e) = self.ctx.outbound.send(msg).await {
            warn!("Failed to send {} to {}: {}", msg.kind(), self.peer_id, e);
            session.on_transport_lost();
        }
    }

    fn report(&self, e: NegotiationError) {
        if e.is_protocol_desync() {
            warn!("Ignoring out-of-order signaling: {}", e);
        } else {
            error!("{}", e);
        }
    }

    fn report_exit(&self) {
        info!(
            "Failed session {} expired after {:?}",
            self.peer_id, self.ctx.failed_session_grace
        );
        let _ = self.ctx.exits.send(SessionExit {
            peer_id: self.peer_id.clone(),
            generation: self.generation,
        });
    }

    /// Connection creation failed: stay visible as `failed` for the grace
    /// period, then ask to be removed.
    async fn linger_failed(&self) {
        let mut snapshot = SessionSnapshot::initial(self.peer_id.clone(), self.role, self.generation);
        snapshot.connection = ConnectionState::Failed;
        self.ctx.view.update(snapshot);

        tokio::select! {
            _ = self.close.closed() => {}
            _ = tokio::time::sleep(self.ctx.failed_session_grace) => self.report_exit(),
        }
    }
}

/// Starts a session task and hands back its handle.
pub fn spawn_session(
    ctx: &SessionContext,
    peer_id: PeerId,
    role: Role,
    generation: u64,
) -> SessionHandle {
    let (handle, commands) = SessionHandle::channel(peer_id, role, generation);
    let task = SessionTask::new(&handle, commands, ctx.clone());
    tokio::spawn(task.run());
    handle
}
