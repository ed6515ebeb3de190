use std::sync::Arc;
use tokio::sync::watch;

/// Shared "this session is closed" flag.
///
/// Set by the registry the moment a session is closed, while an operation of
/// that session may still be awaiting the connection object; the operation
/// checks it before applying or emitting its result.
#[derive(Clone, Debug)]
pub struct CloseSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}
