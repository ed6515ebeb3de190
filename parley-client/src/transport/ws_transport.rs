use crate::error::TransportError;
use crate::transport::{ChannelSink, TransportEvent};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message, error::ProtocolError};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// WebSocket client for the signaling relay.
pub struct WsTransport;

impl WsTransport {
    /// Connects and starts the reader and writer tasks.
    ///
    /// The returned receiver yields `Open` first and `Closed` last; dropping
    /// every clone of the sink closes the socket.
    pub async fn connect(
        url: &str,
    ) -> Result<(ChannelSink, mpsc::Receiver<TransportEvent>), TransportError> {
        let (ws_stream, _) = connect_async(url).await?;
        info!("Signaling websocket connected to {}", url);

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

        let _ = event_tx.send(TransportEvent::Open).await;

        let mut send_task = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_write.send(Message::Text(text)).await {
                    warn!("Signaling websocket write failed: {}", e);
                    break;
                }
            }
            let _ = ws_write.close().await;
        });

        let mut recv_task = tokio::spawn({
            let event_tx = event_tx.clone();

            async move {
                while let Some(msg) = ws_read.next().await {
                    let text = match msg {
                        Ok(Message::Text(text)) => text,
                        Ok(Message::Binary(data)) => match String::from_utf8(data) {
                            Ok(text) => text,
                            Err(_) => {
                                warn!("Dropping non-UTF-8 binary frame");
                                continue;
                            }
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(err) => {
                            match &err {
                                WsError::ConnectionClosed
                                | WsError::AlreadyClosed
                                | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                                    debug!("Signaling websocket closed: {}", err);
                                }
                                _ => {
                                    warn!("Signaling websocket error: {}", err);
                                    let _ = event_tx.send(TransportEvent::Error(err.to_string())).await;
                                }
                            }
                            break;
                        }
                    };

                    if event_tx.send(TransportEvent::Message(text)).await.is_err() {
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            tokio::select! {
                _ = (&mut send_task) => recv_task.abort(),
                _ = (&mut recv_task) => send_task.abort(),
            };
            info!("Signaling websocket disconnected");
            let _ = event_tx.send(TransportEvent::Closed).await;
        });

        Ok((ChannelSink::new(out_tx), event_rx))
    }
}
