//! Cursor presence: pointer positions of room participants.
//!
//! DESIGN
//! ======
//! Cursor moves never touch the document store and are never logged per
//! event. The latest position is kept on the participant so `users` lists
//! carry it, and the move is relayed to peers as-is.

use frames::{Point, ServerEvent};

use crate::services::registry::Room;

/// Record `position` as `participant_id`'s cursor and build the event peers
/// should receive. `None` for a non-finite position or an unknown participant.
pub fn move_cursor(room: &mut Room, participant_id: &str, position: Point) -> Option<ServerEvent> {
    if !position.is_finite() {
        return None;
    }
    let participant = room.participant_mut(participant_id)?;
    participant.cursor = Some(position);
    Some(ServerEvent::CursorMove { participant_id: participant_id.to_owned(), position })
}
