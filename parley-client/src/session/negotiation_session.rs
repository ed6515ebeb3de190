use crate::connection::{IceGatheringState, PeerConnection, SdpKind};
use crate::error::NegotiationError;
use crate::session::{
    CandidateBuffer, CloseSignal, ConnectionState, LocalDescriptionState, RemoteDescriptionState,
    Role, SessionSnapshot,
};
use parley_core::{CandidateDescriptor, PeerId, RoomId, SignalMessage};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where outbound messages of a session come from and go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressing {
    pub room_id: RoomId,
    pub local_peer_id: PeerId,
}

/// Offer/answer state machine for exactly one remote peer.
///
/// Owns the connection object. Every method that awaits the connection
/// re-checks the close signal afterwards; a result that completes after
/// [`close`](Self::close) is dropped instead of being applied or returned.
pub struct NegotiationSession {
    peer_id: PeerId,
    role: Role,
    addressing: Addressing,
    local_description: LocalDescriptionState,
    remote_description: RemoteDescriptionState,
    connection_state: ConnectionState,
    pending_local: CandidateBuffer,
    pending_remote: CandidateBuffer,
    ice_gathering: IceGatheringState,
    data_channel_open: bool,
    data_channel_label: String,
    last_remote_offer: Option<String>,
    connection: Option<Arc<dyn PeerConnection>>,
    close: CloseSignal,
}

impl NegotiationSession {
    pub fn new(
        peer_id: PeerId,
        role: Role,
        addressing: Addressing,
        connection: Box<dyn PeerConnection>,
    ) -> Self {
        Self {
            peer_id,
            role,
            addressing,
            local_description: LocalDescriptionState::None,
            remote_description: RemoteDescriptionState::None,
            connection_state: ConnectionState::New,
            pending_local: CandidateBuffer::new(),
            pending_remote: CandidateBuffer::new(),
            ice_gathering: IceGatheringState::New,
            data_channel_open: false,
            data_channel_label: "channel".to_owned(),
            last_remote_offer: None,
            connection: Some(Arc::from(connection)),
            close: CloseSignal::new(),
        }
    }

    pub fn with_data_channel_label(mut self, label: impl Into<String>) -> Self {
        self.data_channel_label = label.into();
        self
    }

    /// Shares an externally owned close flag, so the owner can cancel while
    /// an operation is in flight.
    pub fn with_close_signal(mut self, close: CloseSignal) -> Self {
        self.close = close;
        self
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_description_state(&self) -> LocalDescriptionState {
        self.local_description
    }

    pub fn remote_description_state(&self) -> RemoteDescriptionState {
        self.remote_description
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn pending_remote_candidates(&self) -> &CandidateBuffer {
        &self.pending_remote
    }

    pub fn pending_local_candidates(&self) -> &CandidateBuffer {
        &self.pending_local
    }

    pub fn close_signal(&self) -> CloseSignal {
        self.close.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    pub fn snapshot(&self, generation: u64) -> SessionSnapshot {
        SessionSnapshot {
            peer_id: self.peer_id.clone(),
            role: self.role,
            generation,
            local_description: self.local_description,
            remote_description: self.remote_description,
            connection: self.connection_state,
            pending_local_candidates: self.pending_local.to_vec(),
            pending_remote_candidates: self.pending_remote.to_vec(),
            ice_gathering: self.ice_gathering,
            data_channel_open: self.data_channel_open,
        }
    }

    /// Caller side: opens the data channel, creates and applies the local offer.
    ///
    /// Returns `Ok(None)` when the session was closed while the offer was
    /// being produced.
    pub async fn create_offer(&mut self) -> Result<Option<SignalMessage>, NegotiationError> {
        if self.role != Role::Caller
            || self.connection_state != ConnectionState::New
            || self.local_description != LocalDescriptionState::None
            || self.remote_description != RemoteDescriptionState::None
        {
            return Err(self.invalid_state("create offer"));
        }
        let conn = self.connection("create offer")?;

        if let Err(e) = conn.create_data_channel(&self.data_channel_label).await {
            return Err(self.api_failure("create data channel", e));
        }
        let sdp = match conn.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => return Err(self.api_failure("create offer", e)),
        };
        if self.is_closed() {
            debug!("Session {} closed while creating offer; discarding", self.peer_id);
            return Ok(None);
        }

        if let Err(e) = conn.set_local_description(SdpKind::Offer, sdp.clone()).await {
            return Err(self.api_failure("set local offer", e));
        }
        if self.is_closed() {
            debug!("Session {} closed while applying offer; discarding", self.peer_id);
            return Ok(None);
        }

        self.local_description = LocalDescriptionState::OfferSent;
        self.connection_state = ConnectionState::Connecting;
        info!("Offer ready for {}", self.peer_id);

        Ok(Some(SignalMessage::Offer {
            room_id: self.addressing.room_id.clone(),
            from: self.addressing.local_peer_id.clone(),
            to: self.peer_id.clone(),
            sdp,
        }))
    }

    /// Callee side: applies the remote offer, flushes held candidates and
    /// answers.
    ///
    /// A different offer on a session that already negotiated restarts the
    /// negotiation; the same offer delivered twice is rejected.
    pub async fn accept_offer(
        &mut self,
        sdp: String,
    ) -> Result<Option<SignalMessage>, NegotiationError> {
        if self.role != Role::Callee || self.connection_state.is_terminal() {
            return Err(self.invalid_state("accept offer"));
        }
        if self.last_remote_offer.as_deref() == Some(sdp.as_str()) {
            return Err(self.invalid_state("accept duplicate offer"));
        }
        if self.remote_description == RemoteDescriptionState::Set
            || self.local_description != LocalDescriptionState::None
        {
            info!("Renegotiation requested by {}; restarting", self.peer_id);
            self.local_description = LocalDescriptionState::None;
            self.remote_description = RemoteDescriptionState::None;
            self.connection_state = ConnectionState::New;
        }
        let conn = self.connection("accept offer")?;

        if let Err(e) = conn.set_remote_description(SdpKind::Offer, sdp.clone()).await {
            return Err(self.api_failure("set remote offer", e));
        }
        if self.is_closed() {
            return Ok(None);
        }
        self.remote_description = RemoteDescriptionState::Set;
        self.last_remote_offer = Some(sdp);
        self.flush_pending_remote_candidates().await;

        let answer = match conn.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return Err(self.api_failure("create answer", e)),
        };
        if self.is_closed() {
            return Ok(None);
        }

        if let Err(e) = conn
            .set_local_description(SdpKind::Answer, answer.clone())
            .await
        {
            return Err(self.api_failure("set local answer", e));
        }
        if self.is_closed() {
            return Ok(None);
        }

        self.local_description = LocalDescriptionState::AnswerSent;
        self.connection_state = ConnectionState::Connecting;
        info!("Answer ready for {}", self.peer_id);

        Ok(Some(SignalMessage::Answer {
            room_id: self.addressing.room_id.clone(),
            from: self.addressing.local_peer_id.clone(),
            to: self.peer_id.clone(),
            sdp: answer,
        }))
    }

    /// Caller side: completes the exchange with the remote answer.
    ///
    /// Duplicate or out-of-order answers are rejected without touching state.
    pub async fn accept_answer(&mut self, sdp: String) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(self.invalid_state("accept answer"));
        }
        if self.local_description != LocalDescriptionState::OfferSent
            || self.remote_description != RemoteDescriptionState::None
        {
            return Err(NegotiationError::UnexpectedAnswer {
                peer_id: self.peer_id.clone(),
                local: self.local_description,
                remote: self.remote_description,
            });
        }
        let conn = self.connection("accept answer")?;

        if let Err(e) = conn.set_remote_description(SdpKind::Answer, sdp).await {
            return Err(self.api_failure("set remote answer", e));
        }
        if self.is_closed() {
            return Ok(());
        }

        self.remote_description = RemoteDescriptionState::Set;
        info!("Remote answer applied for {}", self.peer_id);
        self.flush_pending_remote_candidates().await;
        Ok(())
    }

    /// Holds the candidate until the remote description exists, or applies it
    /// right away when it does.
    pub async fn enqueue_remote_candidate(&mut self, candidate: CandidateDescriptor) {
        if self.is_closed() {
            debug!("Dropping candidate for closed session {}", self.peer_id);
            return;
        }
        if self.remote_description != RemoteDescriptionState::Set {
            debug!(
                "Buffering remote candidate for {} ({} held)",
                self.peer_id,
                self.pending_remote.len() + 1
            );
            self.pending_remote.push(candidate);
            return;
        }
        self.apply_remote_candidate(candidate).await;
    }

    /// Applies held remote candidates in receipt order and empties the buffer.
    /// Returns how many were handed to the connection.
    pub async fn flush_pending_remote_candidates(&mut self) -> usize {
        let pending: Vec<_> = self.pending_remote.drain().collect();
        if !pending.is_empty() {
            debug!(
                "Flushing {} buffered candidates for {}",
                pending.len(),
                self.peer_id
            );
        }

        let mut applied = 0;
        for candidate in pending {
            if self.is_closed() {
                break;
            }
            self.apply_remote_candidate(candidate).await;
            applied += 1;
        }
        applied
    }

    async fn apply_remote_candidate(&mut self, candidate: CandidateDescriptor) {
        let Some(conn) = self.connection.clone() else {
            return;
        };
        if let Err(e) = conn.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate for {}: {:#}", self.peer_id, e);
        }
    }

    /// Local candidates are never held back: each one is recorded and turned
    /// into an outbound `ice-candidate` immediately.
    pub fn on_local_candidate_discovered(
        &mut self,
        candidate: Option<CandidateDescriptor>,
    ) -> Option<SignalMessage> {
        if self.is_closed() {
            return None;
        }
        let Some(candidate) = candidate else {
            info!("ICE candidate gathering complete for {}", self.peer_id);
            return None;
        };

        self.pending_local.push(candidate.clone());
        Some(SignalMessage::IceCandidate {
            room_id: self.addressing.room_id.clone(),
            from: self.addressing.local_peer_id.clone(),
            to: self.peer_id.clone(),
            candidate,
        })
    }

    /// Mirrors the connection's own state. Returns whether anything changed.
    pub fn on_connection_state_changed(&mut self, state: ConnectionState) -> bool {
        if self.is_closed() || self.connection_state == ConnectionState::Closed {
            return false;
        }
        if self.connection_state == state {
            return false;
        }
        info!(
            "Session {} connection {} -> {}",
            self.peer_id, self.connection_state, state
        );
        self.connection_state = state;
        true
    }

    pub fn on_ice_gathering_state_changed(&mut self, state: IceGatheringState) {
        debug!("ICE gathering state for {}: {:?}", self.peer_id, state);
        self.ice_gathering = state;
    }

    pub fn on_data_channel_open(&mut self, label: &str) {
        info!("DataChannel '{}' open with {}", label, self.peer_id);
        self.data_channel_open = true;
    }

    /// The signaling transport went away. A negotiation that has not reached
    /// `connected` can no longer complete.
    pub fn on_transport_lost(&mut self) -> bool {
        match self.connection_state {
            ConnectionState::New | ConnectionState::Connecting => {
                warn!(
                    "Signaling lost while negotiating with {}; marking failed",
                    self.peer_id
                );
                self.fail();
                true
            }
            _ => false,
        }
    }

    pub fn fail(&mut self) {
        if self.connection_state != ConnectionState::Closed {
            self.connection_state = ConnectionState::Failed;
        }
    }

    /// Idempotent. Drops held candidates and closes the connection object.
    pub async fn close(&mut self) {
        self.close.trigger();
        self.pending_local.clear();
        self.pending_remote.clear();

        if let Some(conn) = self.connection.take() {
            if let Err(e) = conn.close().await {
                warn!("Error closing connection for {}: {:#}", self.peer_id, e);
            }
            info!("Session {} closed", self.peer_id);
        }
        self.connection_state = ConnectionState::Closed;
    }

    fn connection(&self, op: &'static str) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        match &self.connection {
            Some(conn) if !self.is_closed() => Ok(conn.clone()),
            _ => Err(self.invalid_state(op)),
        }
    }

    fn invalid_state(&self, op: &'static str) -> NegotiationError {
        NegotiationError::InvalidState {
            peer_id: self.peer_id.clone(),
            op,
            role: self.role,
            state: self.connection_state,
            local: self.local_description,
            remote: self.remote_description,
        }
    }

    fn api_failure(&mut self, op: &'static str, cause: anyhow::Error) -> NegotiationError {
        if !self.is_closed() {
            self.fail();
        }
        NegotiationError::Connection {
            peer_id: self.peer_id.clone(),
            op,
            cause,
        }
    }
}
