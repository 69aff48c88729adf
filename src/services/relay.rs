//! Sync relay: admission, the per-connection state machine, and event
//! application.
//!
//! DESIGN
//! ======
//! The relay is authoritative. Each inbound [`ClientEvent`] is applied to the
//! room's store under the room lock and, if it changed anything, rebroadcast
//! to every other participant under that same lock. An event whose store
//! operation is a no-op (duplicate add, update or delete of an unknown id) is
//! dropped, so every peer's event log equals the relay's effective log.
//!
//! Functions here return an [`Outcome`] and never touch sockets; the
//! websocket layer owns transport.

use frames::{ClientEvent, ErrorCode, Identity, Participant, ServerEvent};
use rand::Rng;
use serde::Deserialize;

use crate::services::cursor;
use crate::services::registry::{ConnectionToken, Room, RoomStorage, SessionRegistry};

/// Colors handed to participants that do not bring their own.
pub const PALETTE: [&str; 15] = [
    "#f44336", "#e91e63", "#9c27b0", "#673ab7", "#3f51b5", "#2196f3", "#03a9f4", "#00bcd4", "#009688", "#4caf50",
    "#8bc34a", "#cddc39", "#ffc107", "#ff9800", "#ff5722",
];

// =============================================================================
// ADMISSION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("participant id required")]
    MissingId,
    #[error("participant name required")]
    MissingName,
}

impl ErrorCode for AdmissionError {
    fn error_code(&self) -> &'static str {
        "E_ADMISSION"
    }
}

/// Query parameters of `GET /ws`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    pub room: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
}

/// A connection that passed admission: where it goes and who it is.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub room_id: String,
    pub participant: Participant,
}

/// Admit a connection from its query parameters.
///
/// A missing `room` gets a freshly generated token; a missing `color` gets
/// a palette entry.
///
/// # Errors
///
/// Returns [`AdmissionError`] when `id` or `name` is missing or blank.
pub fn admit(params: ConnectParams) -> Result<Admission, AdmissionError> {
    let identity = Identity {
        id: params.id.unwrap_or_default(),
        name: params.name.unwrap_or_default(),
        color: params.color,
    };
    let room_id = match params.room.as_deref().map(str::trim) {
        Some(room) if !room.is_empty() => room.to_owned(),
        _ => generate_room_token(),
    };
    Ok(Admission { room_id, participant: participant_from(identity)? })
}

/// Validate an identity and build the participant the registry will hold.
///
/// # Errors
///
/// Returns [`AdmissionError`] when `id` or `name` is blank.
pub fn participant_from(identity: Identity) -> Result<Participant, AdmissionError> {
    if identity.id.trim().is_empty() {
        return Err(AdmissionError::MissingId);
    }
    if identity.name.trim().is_empty() {
        return Err(AdmissionError::MissingName);
    }
    let color = match identity.color {
        Some(c) if !c.trim().is_empty() => c,
        _ => assign_color().to_owned(),
    };
    Ok(Participant { id: identity.id, name: identity.name, color, cursor: None })
}

/// A random palette color.
#[must_use]
pub fn assign_color() -> &'static str {
    PALETTE[rand::rng().random_range(0..PALETTE.len())]
}

/// Shareable room token: 16 random bytes, lowercase hex.
#[must_use]
pub fn generate_room_token() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =============================================================================
// CONNECTION STATE
// =============================================================================

/// Lifecycle of one connection. `Disconnected` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Joined {
        room_id: String,
        participant_id: String,
        token: ConnectionToken,
    },
    Disconnected,
}

/// What a joined connection releases on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: String,
    pub participant_id: String,
    pub token: ConnectionToken,
}

impl ConnectionState {
    /// `Connecting -> Joined`. Returns `false` from any other state.
    pub fn join(&mut self, room_id: impl Into<String>, participant_id: impl Into<String>, token: ConnectionToken) -> bool {
        if *self != Self::Connecting {
            return false;
        }
        *self = Self::Joined { room_id: room_id.into(), participant_id: participant_id.into(), token };
        true
    }

    /// Move to `Disconnected`. Returns the membership to release when the
    /// connection was joined.
    pub fn disconnect(&mut self) -> Option<Membership> {
        match std::mem::replace(self, Self::Disconnected) {
            Self::Joined { room_id, participant_id, token } => Some(Membership { room_id, participant_id, token }),
            Self::Connecting | Self::Disconnected => None,
        }
    }

    #[must_use]
    pub fn membership(&self) -> Option<(&str, &str)> {
        match self {
            Self::Joined { room_id, participant_id, .. } => Some((room_id, participant_id)),
            Self::Connecting | Self::Disconnected => None,
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Applied and queued for `delivered` peers.
    Broadcast { event: ServerEvent, delivered: usize },
    /// The store operation was a no-op; nothing was sent.
    Ignored,
    /// The room is gone (the sender was evicted or raced a teardown).
    RoomGone,
}

/// Apply one client event to a room's store. Returns the event peers should
/// receive, or `None` when nothing changed.
pub fn apply_client_event(room: &mut Room, sender_id: &str, event: ClientEvent) -> Option<ServerEvent> {
    match event {
        ClientEvent::ElementAdd { element } => {
            let store = room.store_mut();
            store.add(element.clone()).then_some(ServerEvent::ElementAdd { element })
        }
        ClientEvent::ElementUpdate { element } => {
            let store = room.store_mut();
            store.update(element.clone()).then_some(ServerEvent::ElementUpdate { element })
        }
        ClientEvent::ElementDelete { id } => {
            let removed = room.store_mut().delete(&id);
            removed.map(|_| ServerEvent::ElementDelete { id })
        }
        ClientEvent::ElementsReplace { elements } => {
            room.store_mut().replace_all(elements);
            Some(ServerEvent::ElementsReplace { elements: room.store().snapshot() })
        }
        ClientEvent::CursorMove { position } => cursor::move_cursor(room, sender_id, position),
    }
}

/// Apply `event` from `sender_id` to `room_id` and fan it out to the other
/// participants, all under the room lock.
pub async fn handle_client_event<S: RoomStorage>(
    registry: &SessionRegistry<S>,
    room_id: &str,
    sender_id: &str,
    event: ClientEvent,
) -> Outcome {
    let applied = registry
        .with_room(room_id, |room| {
            if !room.has_participant(sender_id) {
                return None;
            }
            Some(apply_client_event(room, sender_id, event).map(|out| {
                let delivered = room.broadcast(&out, Some(sender_id));
                (out, delivered)
            }))
        })
        .await
        .flatten();

    match applied {
        None => Outcome::RoomGone,
        Some(None) => Outcome::Ignored,
        Some(Some((event, delivered))) => Outcome::Broadcast { event, delivered },
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
