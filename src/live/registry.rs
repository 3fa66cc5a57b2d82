//! Authoritative in-memory store of running sessions.
//!
//! Session state lives here while the session runs; the database only holds
//! snapshots written asynchronously. Mutations happen through closures under
//! the shard guard, which must never be held across an await point.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::live::session::LiveSession;

/// Concurrent map of session id to live session state.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, LiveSession>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(&self, session: LiveSession) {
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&self, session_id: Uuid) -> Option<LiveSession> {
        self.sessions.remove(&session_id).map(|(_, s)| s)
    }

    /// Read a session under the shard guard. Returns `None` when the session
    /// does not exist.
    pub fn with<R>(&self, session_id: Uuid, f: impl FnOnce(&LiveSession) -> R) -> Option<R> {
        self.sessions.get(&session_id).map(|s| f(&s))
    }

    /// Mutate a session under the shard guard. Returns `None` when the
    /// session does not exist.
    pub fn with_mut<R>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut LiveSession) -> R,
    ) -> Option<R> {
        self.sessions.get_mut(&session_id).map(|mut s| f(&mut s))
    }
}
