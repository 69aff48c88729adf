//! Session registry: live rooms, their participants, and their stores.
//!
//! DESIGN
//! ======
//! The room table sits behind one `RwLock` held only for lookup, insert and
//! remove. Each room sits behind its own `Mutex`, which is the serialization
//! point for everything that touches it: registration, store mutations, and
//! fan-out. Rooms never contend with each other.
//!
//! Rooms are created on first join and destroyed on last leave. A leave that
//! empties a room marks it `closed` under the room lock before dropping the
//! table entry, so a join that raced with the destruction sees the flag and
//! retries against a fresh room instead of registering into a dead one.
//!
//! REJOIN
//! ======
//! Each registration gets a [`ConnectionToken`]. A join with a participant id
//! already in the room takes that registration over: the previous queue is
//! dropped (ending the previous connection loop) and the token changes, so
//! the previous connection's late `leave` is a no-op.
//!
//! FAN-OUT
//! =======
//! Every connection owns a bounded `mpsc` receiver. Broadcasts use
//! `try_send` under the room lock, so each sender's events reach each peer in
//! order. A peer whose queue is full has its sender dropped, which ends its
//! connection loop; it resynchronizes by rejoining.
//!
//! Room stores keep no undo history: the relay never undoes, clients send the
//! resulting sequence instead.

use std::collections::HashMap;
use std::sync::Arc;

use canvas::doc::DocStore;
use frames::{Element, Participant, ServerEvent};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{info, warn};

pub type RoomHandle = Arc<Mutex<Room>>;

/// Identifies one registration of a participant within a room.
pub type ConnectionToken = u64;

// =============================================================================
// ROOM
// =============================================================================

#[derive(Debug)]
struct Connection {
    token: ConnectionToken,
    /// `None` once evicted from fan-out.
    tx: Option<mpsc::Sender<ServerEvent>>,
}

/// Per-room live state.
#[derive(Debug)]
pub struct Room {
    id: String,
    store: DocStore,
    /// Registered participants in join order.
    participants: Vec<Participant>,
    /// Current registration per participant id.
    connections: HashMap<String, Connection>,
    next_token: ConnectionToken,
    closed: bool,
}

impl Room {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            store: DocStore::with_history_limit(0),
            participants: Vec::new(),
            connections: HashMap::new(),
            next_token: 0,
            closed: false,
        }
    }

    #[must_use]
    pub fn store(&self) -> &DocStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DocStore {
        &mut self.store
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant_mut(&mut self, participant_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == participant_id)
    }

    #[must_use]
    pub fn has_participant(&self, participant_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == participant_id)
    }

    /// Live queues of every participant except `exclude`, with their ids.
    #[must_use]
    pub fn broadcast_targets(&self, exclude: Option<&str>) -> Vec<(&str, &mpsc::Sender<ServerEvent>)> {
        self.connections
            .iter()
            .filter(|(pid, _)| exclude != Some(pid.as_str()))
            .filter_map(|(pid, conn)| conn.tx.as_ref().map(|tx| (pid.as_str(), tx)))
            .collect()
    }

    /// Queue `event` for every participant except `exclude`. Returns the
    /// number of queues it reached.
    ///
    /// Peers whose queue is full or closed lose their sender here.
    pub fn broadcast(&mut self, event: &ServerEvent, exclude: Option<&str>) -> usize {
        let mut delivered = 0;
        let mut evicted = Vec::new();
        for (pid, tx) in self.broadcast_targets(exclude) {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(room_id = %self.id, participant_id = %pid, event = event.name(), "registry: peer queue full; evicting");
                    evicted.push(pid.to_owned());
                }
                Err(TrySendError::Closed(_)) => evicted.push(pid.to_owned()),
            }
        }
        for pid in evicted {
            if let Some(conn) = self.connections.get_mut(&pid) {
                conn.tx = None;
            }
        }
        delivered
    }

    /// Register a participant and its outbound queue. An id already present is
    /// taken over in place and its previous queue dropped.
    pub(crate) fn register(&mut self, participant: Participant, tx: mpsc::Sender<ServerEvent>) -> ConnectionToken {
        self.next_token += 1;
        let token = self.next_token;
        self.connections.insert(participant.id.clone(), Connection { token, tx: Some(tx) });
        match self.participant_mut(&participant.id) {
            Some(existing) => *existing = participant,
            None => self.participants.push(participant),
        }
        token
    }

    /// Remove `participant_id` if `token` is its current registration.
    fn unregister(&mut self, participant_id: &str, token: ConnectionToken) -> bool {
        if !self.connections.get(participant_id).is_some_and(|conn| conn.token == token) {
            return false;
        }
        self.connections.remove(participant_id);
        self.participants.retain(|p| p.id != participant_id);
        true
    }

    fn users_event(&self) -> ServerEvent {
        ServerEvent::Users { users: self.participants.clone() }
    }
}

/// What a joiner needs to hydrate: taken atomically with registration.
#[derive(Debug, Clone)]
pub struct JoinSnapshot {
    pub token: ConnectionToken,
    pub users: Vec<Participant>,
    pub elements: Vec<Element>,
}

// =============================================================================
// STORAGE
// =============================================================================

/// Backing table for live rooms. Called only under the registry's table lock.
pub trait RoomStorage: Send + Sync {
    fn get(&self, room_id: &str) -> Option<RoomHandle>;

    /// Existing handle for `room_id`, or the result of `create` after storing it.
    fn get_or_insert_with(&mut self, room_id: &str, create: impl FnOnce() -> RoomHandle) -> RoomHandle;

    /// Remove `room_id` only if it still maps to `handle`. Returns whether it did.
    fn remove_if_same(&mut self, room_id: &str, handle: &RoomHandle) -> bool;

    fn room_count(&self) -> usize;
}

/// In-process room table.
#[derive(Debug, Default)]
pub struct MemoryRooms {
    rooms: HashMap<String, RoomHandle>,
}

impl RoomStorage for MemoryRooms {
    fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).cloned()
    }

    fn get_or_insert_with(&mut self, room_id: &str, create: impl FnOnce() -> RoomHandle) -> RoomHandle {
        self.rooms.entry(room_id.to_owned()).or_insert_with(create).clone()
    }

    fn remove_if_same(&mut self, room_id: &str, handle: &RoomHandle) -> bool {
        let same = self.rooms.get(room_id).is_some_and(|current| Arc::ptr_eq(current, handle));
        if same {
            self.rooms.remove(room_id);
        }
        same
    }

    fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// All live rooms of one relay process.
pub struct SessionRegistry<S: RoomStorage = MemoryRooms> {
    rooms: RwLock<S>,
}

impl SessionRegistry<MemoryRooms> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_storage(MemoryRooms::default())
    }
}

impl Default for SessionRegistry<MemoryRooms> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RoomStorage> SessionRegistry<S> {
    #[must_use]
    pub fn with_storage(storage: S) -> Self {
        Self { rooms: RwLock::new(storage) }
    }

    /// Register `participant` in `room_id`, creating the room if absent. A
    /// participant id already in the room is taken over by this connection.
    ///
    /// Remaining members receive the updated `users` list; the joiner gets
    /// the snapshot instead.
    pub async fn join(&self, room_id: &str, participant: Participant, tx: mpsc::Sender<ServerEvent>) -> JoinSnapshot {
        loop {
            let handle = {
                let mut rooms = self.rooms.write().await;
                rooms.get_or_insert_with(room_id, || {
                    info!(%room_id, "registry: room created");
                    Arc::new(Mutex::new(Room::new(room_id)))
                })
            };

            let mut room = handle.lock().await;
            if room.closed {
                // Lost a race with the last leave; drop the dead entry and retry.
                drop(room);
                self.rooms.write().await.remove_if_same(room_id, &handle);
                continue;
            }

            let participant_id = participant.id.clone();
            let rejoined = room.has_participant(&participant_id);
            let token = room.register(participant, tx);
            let users = room.users_event();
            room.broadcast(&users, Some(&participant_id));

            let participants = room.participants().len();
            if rejoined {
                info!(%room_id, %participant_id, participants, "registry: participant rejoined; previous connection replaced");
            } else {
                info!(%room_id, %participant_id, participants, "registry: participant joined");
            }
            return JoinSnapshot { token, users: room.participants().to_vec(), elements: room.store.snapshot() };
        }
    }

    /// Remove the registration `token` of a participant. The last leave
    /// destroys the room.
    ///
    /// Returns the remaining participants, or `None` when the room, the
    /// participant, or this registration was already gone.
    pub async fn leave(&self, room_id: &str, participant_id: &str, token: ConnectionToken) -> Option<Vec<Participant>> {
        let handle = self.handle(room_id).await?;

        let mut room = handle.lock().await;
        if !room.unregister(participant_id, token) {
            return None;
        }
        let remaining = room.participants().to_vec();
        info!(%room_id, %participant_id, remaining = remaining.len(), "registry: participant left");

        if remaining.is_empty() {
            room.closed = true;
            drop(room);
            if self.rooms.write().await.remove_if_same(room_id, &handle) {
                info!(%room_id, "registry: room destroyed");
            }
        } else {
            let users = room.users_event();
            room.broadcast(&users, None);
        }
        Some(remaining)
    }

    /// Queues of everyone in `room_id` except `exclude`.
    pub async fn broadcast_targets(&self, room_id: &str, exclude: Option<&str>) -> Vec<mpsc::Sender<ServerEvent>> {
        self.with_room(room_id, |room| {
            room.broadcast_targets(exclude).into_iter().map(|(_, tx)| tx.clone()).collect::<Vec<_>>()
        })
        .await
        .unwrap_or_default()
    }

    /// Run `f` with exclusive access to one room. `None` if the room does not exist.
    pub async fn with_room<R>(&self, room_id: &str, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        let handle = self.handle(room_id).await?;
        let mut room = handle.lock().await;
        if room.closed {
            return None;
        }
        Some(f(&mut room))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.room_count()
    }

    #[cfg(test)]
    pub async fn participants(&self, room_id: &str) -> Vec<Participant> {
        self.with_room(room_id, |room| room.participants.clone()).await.unwrap_or_default()
    }

    #[cfg(test)]
    pub async fn elements(&self, room_id: &str) -> Vec<Element> {
        self.with_room(room_id, |room| room.store.snapshot()).await.unwrap_or_default()
    }

    async fn handle(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id)
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
