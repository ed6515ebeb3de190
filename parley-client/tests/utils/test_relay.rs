use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parley_client::{SignalSink, TransportError, TransportEvent};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

struct HubInner {
    connections: DashMap<u64, mpsc::UnboundedSender<String>>,
    peers: DashMap<String, u64>,
    next_id: AtomicU64,
}

/// Minimal signaling server: answers `join`, announces peers and forwards
/// anything addressed with `to`. Payloads are relayed untouched.
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<HubInner>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: DashMap::new(),
                peers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn register(&self, tx: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.connections.insert(id, tx);
        id
    }

    fn send_to_conn(&self, conn: u64, text: String) {
        if let Some(tx) = self.inner.connections.get(&conn) {
            let _ = tx.send(text);
        }
    }

    fn handle(&self, conn: u64, text: &str) {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return;
        };
        match value["type"].as_str() {
            Some("join") => {
                let Some(peer_id) = value["peerId"].as_str().map(str::to_owned) else {
                    return;
                };
                info!("[Relay] {} joined on connection {}", peer_id, conn);
                let existing: Vec<u64> = self.inner.peers.iter().map(|e| *e.value()).collect();
                self.inner.peers.insert(peer_id.clone(), conn);
                self.send_to_conn(
                    conn,
                    json!({"type": "join-success", "peerId": peer_id}).to_string(),
                );
                let announce = json!({"type": "peer-joined", "peerId": peer_id}).to_string();
                for other in existing {
                    self.send_to_conn(other, announce.clone());
                }
            }
            _ => {
                let Some(to) = value["to"].as_str() else {
                    return;
                };
                let target = self.inner.peers.get(to).map(|e| *e.value());
                match target {
                    Some(target) => self.send_to_conn(target, text.to_owned()),
                    None => debug!("[Relay] no peer {} for {}", to, value["type"]),
                }
            }
        }
    }

    /// Drops the peer's connection and tells everyone else it left.
    pub fn disconnect(&self, peer_id: &str) {
        if let Some((_, conn)) = self.inner.peers.remove(peer_id) {
            self.inner.connections.remove(&conn);
            let left = json!({"type": "peer-left", "peerId": peer_id}).to_string();
            for entry in self.inner.peers.iter() {
                self.send_to_conn(*entry.value(), left.clone());
            }
        }
    }

    /// In-process client connection: a sink plus the event stream a router reads.
    pub fn connect(&self) -> (HubSink, mpsc::Receiver<TransportEvent>) {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::channel(256);
        let conn = self.register(out_tx);

        tokio::spawn(async move {
            let _ = event_tx.send(TransportEvent::Open).await;
            while let Some(text) = out_rx.recv().await {
                if event_tx.send(TransportEvent::Message(text)).await.is_err() {
                    return;
                }
            }
            let _ = event_tx.send(TransportEvent::Closed).await;
        });

        let sink = HubSink {
            hub: self.clone(),
            conn,
        };
        (sink, event_rx)
    }

    /// Serves the hub over WebSocket on an ephemeral local port.
    pub async fn serve_ws(&self) -> Result<SocketAddr> {
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(addr)
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct HubSink {
    hub: RelayHub,
    conn: u64,
}

#[async_trait]
impl SignalSink for HubSink {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.hub.inner.connections.contains_key(&self.conn) {
            return Err(TransportError::Closed);
        }
        self.hub.handle(self.conn, &text);
        Ok(())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<RelayHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: RelayHub) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn = hub.register(tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut recv_task = tokio::spawn({
        let hub = hub.clone();
        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => hub.handle(conn, text.as_str()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    hub.inner.connections.remove(&conn);
    debug!("[Relay] websocket connection {} closed", conn);
}
