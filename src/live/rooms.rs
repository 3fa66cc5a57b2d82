//! Connection fan-out for live sessions.
//!
//! Each running session has one room: at most one host socket and any number
//! of participant sockets. The service layer builds differently shaped
//! payloads per audience (the host may see correctness data participants must
//! not), so delivery here is audience-aware rather than a flat relay.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A message destined for a specific `WebSocket` client.
pub type WsTx = mpsc::UnboundedSender<String>;

/// Identifies a connected client within a session room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientRole {
    Host,
    Participant(Uuid),
}

/// The sockets of one running session.
#[derive(Debug, Default)]
struct Room {
    host: Option<WsTx>,
    participants: HashMap<Uuid, WsTx>,
}

impl Room {
    fn is_empty(&self) -> bool {
        self.host.is_none() && self.participants.is_empty()
    }
}

/// Tracks all active `WebSocket` connections across all sessions.
#[derive(Debug, Clone, Default)]
pub struct RoomManager {
    rooms: Arc<DashMap<Uuid, Room>>,
}

impl RoomManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
        }
    }

    /// Attach a client socket to a session room. A second host registration
    /// replaces the first (host reconnect).
    pub fn register(&self, session_id: Uuid, role: ClientRole, tx: WsTx) {
        let mut room = self.rooms.entry(session_id).or_default();
        match role {
            ClientRole::Host => room.host = Some(tx),
            ClientRole::Participant(socket_id) => {
                room.participants.insert(socket_id, tx);
            }
        }
    }

    /// Detach a client socket; the room is dropped once empty.
    pub fn unregister(&self, session_id: Uuid, role: &ClientRole) {
        let Some(mut room) = self.rooms.get_mut(&session_id) else {
            return;
        };
        match role {
            ClientRole::Host => room.host = None,
            ClientRole::Participant(socket_id) => {
                room.participants.remove(socket_id);
            }
        }
        let empty = room.is_empty();
        drop(room);
        if empty {
            self.rooms.remove(&session_id);
        }
    }

    /// Send a message to the host of a session.
    pub fn send_to_host(&self, session_id: Uuid, message: &str) {
        if let Some(room) = self.rooms.get(&session_id)
            && let Some(tx) = &room.host
        {
            let _ = tx.send(message.to_string());
        }
    }

    /// Send a message to a specific participant's socket.
    pub fn send_to_participant(&self, session_id: Uuid, socket_id: Uuid, message: &str) {
        if let Some(room) = self.rooms.get(&session_id)
            && let Some(tx) = room.participants.get(&socket_id)
        {
            let _ = tx.send(message.to_string());
        }
    }

    /// Broadcast one message to every connected client in a session.
    pub fn broadcast(&self, session_id: Uuid, message: &str) {
        self.broadcast_shaped(session_id, message, message);
    }

    /// Broadcast a message to all participants, skipping the host.
    pub fn broadcast_to_participants(&self, session_id: Uuid, message: &str) {
        if let Some(room) = self.rooms.get(&session_id) {
            for tx in room.participants.values() {
                let _ = tx.send(message.to_string());
            }
        }
    }

    /// Deliver one payload to the host and a differently shaped payload to
    /// every participant in a single room lookup.
    pub fn broadcast_shaped(&self, session_id: Uuid, host_message: &str, participant_message: &str) {
        if let Some(room) = self.rooms.get(&session_id) {
            if let Some(tx) = &room.host {
                let _ = tx.send(host_message.to_string());
            }
            for tx in room.participants.values() {
                let _ = tx.send(participant_message.to_string());
            }
        }
    }

    /// Drop every connection of a session (used when ending a session).
    pub fn remove_session(&self, session_id: Uuid) {
        self.rooms.remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (WsTx, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn broadcast_reaches_host_and_participants() {
        let rooms = RoomManager::new();
        let session_id = Uuid::new_v4();
        let socket_id = Uuid::new_v4();
        let (host_tx, mut host_rx) = channel();
        let (player_tx, mut player_rx) = channel();

        rooms.register(session_id, ClientRole::Host, host_tx);
        rooms.register(session_id, ClientRole::Participant(socket_id), player_tx);
        rooms.broadcast(session_id, "hello");

        assert_eq!(host_rx.try_recv().ok().as_deref(), Some("hello"));
        assert_eq!(player_rx.try_recv().ok().as_deref(), Some("hello"));
    }

    #[test]
    fn shaped_broadcast_splits_by_audience() {
        let rooms = RoomManager::new();
        let session_id = Uuid::new_v4();
        let socket_id = Uuid::new_v4();
        let (host_tx, mut host_rx) = channel();
        let (player_tx, mut player_rx) = channel();

        rooms.register(session_id, ClientRole::Host, host_tx);
        rooms.register(session_id, ClientRole::Participant(socket_id), player_tx);
        rooms.broadcast_shaped(session_id, "with answers", "without answers");

        assert_eq!(host_rx.try_recv().ok().as_deref(), Some("with answers"));
        assert_eq!(player_rx.try_recv().ok().as_deref(), Some("without answers"));
    }

    #[test]
    fn participant_broadcast_skips_host() {
        let rooms = RoomManager::new();
        let session_id = Uuid::new_v4();
        let socket_id = Uuid::new_v4();
        let (host_tx, mut host_rx) = channel();
        let (player_tx, mut player_rx) = channel();

        rooms.register(session_id, ClientRole::Host, host_tx);
        rooms.register(session_id, ClientRole::Participant(socket_id), player_tx);
        rooms.broadcast_to_participants(session_id, "players only");

        assert!(host_rx.try_recv().is_err());
        assert_eq!(player_rx.try_recv().ok().as_deref(), Some("players only"));
    }

    #[test]
    fn targeted_send_reaches_only_one_socket() {
        let rooms = RoomManager::new();
        let session_id = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let (first_tx, mut first_rx) = channel();
        let (second_tx, mut second_rx) = channel();

        rooms.register(session_id, ClientRole::Participant(first), first_tx);
        rooms.register(session_id, ClientRole::Participant(second), second_tx);
        rooms.send_to_participant(session_id, first, "just you");

        assert_eq!(first_rx.try_recv().ok().as_deref(), Some("just you"));
        assert!(second_rx.try_recv().is_err());
    }

    #[test]
    fn unregistered_socket_no_longer_receives() {
        let rooms = RoomManager::new();
        let session_id = Uuid::new_v4();
        let socket_id = Uuid::new_v4();
        let (host_tx, mut host_rx) = channel();
        let (player_tx, mut player_rx) = channel();

        rooms.register(session_id, ClientRole::Host, host_tx);
        rooms.register(session_id, ClientRole::Participant(socket_id), player_tx);
        rooms.unregister(session_id, &ClientRole::Participant(socket_id));
        rooms.broadcast(session_id, "hello");

        assert_eq!(host_rx.try_recv().ok().as_deref(), Some("hello"));
        assert!(player_rx.try_recv().is_err());
    }

    #[test]
    fn send_to_missing_session_is_a_no_op() {
        let rooms = RoomManager::new();
        rooms.broadcast(Uuid::new_v4(), "nobody home");
        rooms.send_to_host(Uuid::new_v4(), "nobody home");
    }
}
