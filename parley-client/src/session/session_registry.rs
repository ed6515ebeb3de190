use crate::error::NegotiationError;
use crate::session::{Role, SessionContext, SessionHandle, SessionSnapshot, SessionView, spawn_session};
use parley_core::PeerId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info};

/// Starts the task behind a new session.
pub trait SessionSpawner: Send + Sync {
    fn spawn(&self, peer_id: PeerId, role: Role, generation: u64) -> SessionHandle;
}

impl SessionSpawner for SessionContext {
    fn spawn(&self, peer_id: PeerId, role: Role, generation: u64) -> SessionHandle {
        spawn_session(self, peer_id, role, generation)
    }
}

/// At most one live session per remote peer.
///
/// Only the signaling router touches the registry, so lookups and inserts
/// never race. Each created entry gets a fresh generation number; late
/// reports from a removed session carry the old number and are ignored.
pub struct SessionRegistry {
    sessions: HashMap<PeerId, SessionHandle>,
    spawner: Box<dyn SessionSpawner>,
    view: SessionView,
    next_generation: u64,
}

impl SessionRegistry {
    pub fn new(spawner: Box<dyn SessionSpawner>, view: SessionView) -> Self {
        Self {
            sessions: HashMap::new(),
            spawner,
            view,
            next_generation: 1,
        }
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// Returns the existing session for `peer_id`, or creates one with `role`.
    ///
    /// An existing session with a different role is a conflict; the caller
    /// decides what to do about it.
    pub fn get_or_create(
        &mut self,
        peer_id: &PeerId,
        role: Role,
    ) -> Result<&SessionHandle, NegotiationError> {
        match self.sessions.entry(peer_id.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.get().role();
                if existing != role {
                    return Err(NegotiationError::RoleConflict {
                        peer_id: peer_id.clone(),
                        existing,
                        requested: role,
                    });
                }
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let generation = self.next_generation;
                self.next_generation += 1;

                self.view
                    .insert(SessionSnapshot::initial(peer_id.clone(), role, generation));
                let handle = self.spawner.spawn(peer_id.clone(), role, generation);
                info!("Created {} session for {} (generation {})", role, peer_id, generation);
                Ok(entry.insert(handle))
            }
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&SessionHandle> {
        self.sessions.get(peer_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    /// Closes and forgets the session. No-op for unknown peers.
    pub fn remove(&mut self, peer_id: &PeerId) -> bool {
        match self.sessions.remove(peer_id) {
            Some(handle) => {
                handle.close();
                self.view.remove(peer_id, handle.generation());
                info!("Removed session for {}", peer_id);
                true
            }
            None => false,
        }
    }

    /// Like [`remove`](Self::remove), but only if the entry is still the one
    /// created with `generation`.
    pub fn remove_if_generation(&mut self, peer_id: &PeerId, generation: u64) -> bool {
        match self.sessions.get(peer_id).map(SessionHandle::generation) {
            Some(current) if current == generation => self.remove(peer_id),
            Some(_) => {
                debug!(
                    "Ignoring stale removal for {} (generation {})",
                    peer_id, generation
                );
                false
            }
            None => false,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &SessionHandle> {
        self.sessions.values()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.sessions.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes every session.
    pub fn clear(&mut self) {
        for (peer_id, handle) in self.sessions.drain() {
            handle.close();
            self.view.remove(&peer_id, handle.generation());
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
