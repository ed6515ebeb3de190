use crate::error::TransportError;
use crate::transport::SignalSink;
use parley_core::{SignalMessage, WireCodec};
use std::sync::Arc;
use tracing::debug;

/// Encodes messages and hands them to the transport.
#[derive(Clone)]
pub struct Outbound {
    codec: WireCodec,
    sink: Arc<dyn SignalSink>,
}

impl Outbound {
    pub fn new(codec: WireCodec, sink: Arc<dyn SignalSink>) -> Self {
        Self { codec, sink }
    }

    pub fn codec(&self) -> &WireCodec {
        &self.codec
    }

    pub async fn send(&self, msg: &SignalMessage) -> Result<(), TransportError> {
        let text = self.codec.encode(msg)?;
        debug!("-> {} ({} bytes)", msg.kind(), text.len());
        self.sink.send(text).await
    }
}
