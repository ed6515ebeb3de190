use crate::session::SessionSnapshot;
use dashmap::DashMap;
use parley_core::PeerId;
use std::sync::Arc;
use tokio::sync::broadcast;

const UPDATE_CAPACITY: usize = 256;

/// Read-only window onto the live sessions.
///
/// Written by session tasks and the registry, read from anywhere. Updates
/// from a superseded session (older generation) are ignored.
#[derive(Clone)]
pub struct SessionView {
    sessions: Arc<DashMap<PeerId, SessionSnapshot>>,
    updates: broadcast::Sender<SessionSnapshot>,
}

impl SessionView {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            sessions: Arc::new(DashMap::new()),
            updates,
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<SessionSnapshot> {
        self.sessions.get(peer_id).map(|s| s.value().clone())
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn list_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.sessions.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        let mut all: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        all
    }

    /// Every accepted update, in the order it was published.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub(crate) fn insert(&self, snapshot: SessionSnapshot) {
        self.sessions
            .insert(snapshot.peer_id.clone(), snapshot.clone());
        let _ = self.updates.send(snapshot);
    }

    /// Applies the snapshot only if its generation is still the registered one.
    pub(crate) fn update(&self, snapshot: SessionSnapshot) -> bool {
        let accepted = match self.sessions.get_mut(&snapshot.peer_id) {
            Some(mut entry) if entry.generation == snapshot.generation => {
                *entry = snapshot.clone();
                true
            }
            _ => false,
        };
        if accepted {
            let _ = self.updates.send(snapshot);
        }
        accepted
    }

    pub(crate) fn remove(&self, peer_id: &PeerId, generation: u64) -> Option<SessionSnapshot> {
        self.sessions
            .remove_if(peer_id, |_, s| s.generation == generation)
            .map(|(_, s)| s)
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self::new()
    }
}
