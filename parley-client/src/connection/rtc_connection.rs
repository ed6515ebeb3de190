use crate::connection::{
    ConnectionConfig, ConnectionEvent, ConnectionFactory, IceConnectionState, IceGatheringState,
    PeerConnection,
    SdpKind,
};
use crate::session::ConnectionState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_core::{CandidateDescriptor, PeerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// [`ConnectionFactory`] backed by webrtc-rs.
#[derive(Clone, Default)]
pub struct RtcConnectionFactory {
    config: ConnectionConfig,
}

impl RtcConnectionFactory {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionFactory for RtcConnectionFactory {
    async fn create(
        &self,
        peer_id: &PeerId,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Box<dyn PeerConnection>> {
        let connection = RtcConnection::new(peer_id.clone(), &self.config, events).await?;
        Ok(Box::new(connection))
    }
}

pub struct RtcConnection {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    events: mpsc::Sender<ConnectionEvent>,
}

impl RtcConnection {
    /// Builds the peer connection and wires every webrtc callback into `events`.
    pub async fn new(
        peer_id: PeerId,
        config: &ConnectionConfig,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Self> {
        // Codecs are registered even for data-only sessions so remote offers with media parse.
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = events.clone();
        let pid_state = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let pid = pid_state.clone();

                Box::pin(async move {
                    info!("Peer connection state changed for {}: {:?}", pid, s);
                    let state = match s {
                        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
                            ConnectionState::New
                        }
                        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
                        RTCPeerConnectionState::Connected => ConnectionState::Connected,
                        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
                        RTCPeerConnectionState::Failed => ConnectionState::Failed,
                        RTCPeerConnectionState::Closed => ConnectionState::Closed,
                    };
                    let _ = tx.send(ConnectionEvent::StateChanged(state)).await;
                })
            },
        ));

        let ice_tx = events.clone();
        let pid_ice_state = peer_id.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let tx = ice_tx.clone();
                let pid = pid_ice_state.clone();
                Box::pin(async move {
                    debug!("ICE connection state for {}: {:?}", pid, s);
                    let state = match s {
                        RTCIceConnectionState::Checking => IceConnectionState::Checking,
                        RTCIceConnectionState::Connected => IceConnectionState::Connected,
                        RTCIceConnectionState::Completed => IceConnectionState::Completed,
                        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
                        RTCIceConnectionState::Failed => IceConnectionState::Failed,
                        RTCIceConnectionState::Closed => IceConnectionState::Closed,
                        _ => IceConnectionState::New,
                    };
                    let _ = tx
                        .send(ConnectionEvent::IceConnectionStateChanged(state))
                        .await;
                })
            },
        ));

        let gathering_tx = events.clone();
        peer_connection.on_ice_gathering_state_change(Box::new(move |s: RTCIceGathererState| {
            let tx = gathering_tx.clone();
            Box::pin(async move {
                let state = match s {
                    RTCIceGathererState::Gathering => IceGatheringState::Gathering,
                    RTCIceGathererState::Complete => IceGatheringState::Complete,
                    _ => IceGatheringState::New,
                };
                let _ = tx
                    .send(ConnectionEvent::IceGatheringStateChanged(state))
                    .await;
            })
        }));

        // Trickle ICE: every local candidate goes out as soon as it is found.
        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let descriptor = match c {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => Some(CandidateDescriptor::from(init)),
                        Err(_) => return,
                    },
                    None => None,
                };
                let _ = tx.send(ConnectionEvent::LocalCandidate(descriptor)).await;
            })
        }));

        // Callee side: the caller opens the channel.
        let dc_tx = events.clone();
        let pid_dc = peer_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let pid = pid_dc.clone();

            Box::pin(async move {
                debug!("Remote DataChannel '{}' announced by {}", dc.label(), pid);
                watch_data_channel(&dc, tx);
            })
        }));

        Ok(Self {
            peer_id,
            peer_connection,
            events,
        })
    }
}

fn watch_data_channel(dc: &Arc<RTCDataChannel>, tx: mpsc::Sender<ConnectionEvent>) {
    let label = dc.label().to_owned();
    dc.on_open(Box::new(move || {
        let tx = tx.clone();
        let label = label.clone();
        Box::pin(async move {
            let _ = tx.send(ConnectionEvent::DataChannelOpen(label)).await;
        })
    }));
}

fn description(kind: SdpKind, sdp: String) -> Result<RTCSessionDescription> {
    let desc = match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
    };
    Ok(desc)
}

#[async_trait]
impl PeerConnection for RtcConnection {
    async fn create_offer(&self) -> Result<String> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.peer_connection
            .set_local_description(description(kind, sdp)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.peer_connection
            .set_remote_description(description(kind, sdp)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit::from(candidate))
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;
        debug!("DataChannel '{}' created for {}", label, self.peer_id);
        watch_data_channel(&dc, self.events.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        info!("Closing peer connection for {}", self.peer_id);
        self.peer_connection.close().await?;
        Ok(())
    }
}
