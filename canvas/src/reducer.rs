//! Client reducer: the participant-side mirror of a room.
//!
//! DESIGN
//! ======
//! The reducer owns a local [`DocStore`] and applies the same store
//! operations the relay applies, so a client that has seen the relay's event
//! log holds the relay's sequence. Local actions mutate the store immediately
//! (optimistic) and return the [`ClientEvent`]s the host must send; remote
//! [`ServerEvent`]s arrive through [`ClientReducer::apply_server_event`].
//!
//! Undo and redo walk the local history only. When they change the sequence
//! they return one `elements-replace` carrying the result, which converges
//! every peer on the undoing participant's view.
//!
//! Viewport state (`view`) and the selection are participant-local and never
//! produce events.

#[cfg(test)]
#[path = "reducer_test.rs"]
mod reducer_test;

use std::collections::HashMap;

use frames::{ClientEvent, DEFAULT_COLOR, DEFAULT_STROKE_SIZE, Element, Participant, ServerEvent};

use crate::camera::{Point, ViewTransform};
use crate::consts::ZOOM_STEP;
use crate::doc::{DocStore, ElementId};
use crate::hit::hit_test;
use crate::input::{Gesture, Tool};

/// Transport state as seen by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

/// Last `error` event received from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayError {
    pub code: String,
    pub message: String,
}

/// Participant-side state machine for one room.
#[derive(Debug, Clone)]
pub struct ClientReducer {
    doc: DocStore,
    selected: Option<ElementId>,
    tool: Tool,
    color: String,
    stroke_size: f64,
    filled: bool,
    view: ViewTransform,
    cursors: HashMap<String, Point>,
    users: Vec<Participant>,
    gesture: Gesture,
    status: ConnectionStatus,
    room_id: Option<String>,
    participant_id: Option<String>,
    last_error: Option<RelayError>,
}

impl Default for ClientReducer {
    fn default() -> Self {
        Self {
            doc: DocStore::new(),
            selected: None,
            tool: Tool::default(),
            color: DEFAULT_COLOR.to_owned(),
            stroke_size: DEFAULT_STROKE_SIZE,
            filled: false,
            view: ViewTransform::default(),
            cursors: HashMap::new(),
            users: Vec::new(),
            gesture: Gesture::Idle,
            status: ConnectionStatus::Connecting,
            room_id: None,
            participant_id: None,
            last_error: None,
        }
    }
}

impl ClientReducer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =============================================================
    // Queries
    // =============================================================

    /// Elements in draw order (back to front).
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        self.doc.elements()
    }

    #[must_use]
    pub fn doc(&self) -> &DocStore {
        &self.doc
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[must_use]
    pub fn color(&self) -> &str {
        &self.color
    }

    #[must_use]
    pub fn stroke_size(&self) -> f64 {
        self.stroke_size
    }

    #[must_use]
    pub fn filled(&self) -> bool {
        self.filled
    }

    #[must_use]
    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Last known world position of each remote participant's pointer.
    #[must_use]
    pub fn cursors(&self) -> &HashMap<String, Point> {
        &self.cursors
    }

    #[must_use]
    pub fn users(&self) -> &[Participant] {
        &self.users
    }

    #[must_use]
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    #[must_use]
    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&RelayError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.doc.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.doc.can_redo()
    }

    // =============================================================
    // Settings
    // =============================================================

    /// Switch tools. Any tool other than select drops the selection.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        if !tool.keeps_selection() {
            self.selected = None;
        }
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    /// Ignored unless `size` is finite and non-negative.
    pub fn set_stroke_size(&mut self, size: f64) {
        if size.is_finite() && size >= 0.0 {
            self.stroke_size = size;
        }
    }

    pub fn set_filled(&mut self, filled: bool) {
        self.filled = filled;
    }

    // =============================================================
    // Viewport
    // =============================================================

    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        self.view.screen_to_world(screen)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.view.pan_by(dx, dy);
    }

    /// Zoom in one step, keeping the world point under `anchor` fixed.
    pub fn zoom_in(&mut self, anchor: Point) {
        self.view.zoom_at(anchor, ZOOM_STEP);
    }

    /// Zoom out one step, keeping the world point under `anchor` fixed.
    pub fn zoom_out(&mut self, anchor: Point) {
        self.view.zoom_at(anchor, 1.0 / ZOOM_STEP);
    }

    pub fn reset_view(&mut self) {
        self.view = ViewTransform::default();
    }

    // =============================================================
    // Local edits
    // =============================================================

    /// Add a fully formed element (text or image placed by the host).
    pub fn add_element(&mut self, element: Element) -> Vec<ClientEvent> {
        if element.validate().is_err() || !self.doc.add(element.clone()) {
            return Vec::new();
        }
        vec![ClientEvent::ElementAdd { element }]
    }

    /// Replace an existing element wholesale.
    pub fn update_element(&mut self, element: Element) -> Vec<ClientEvent> {
        if element.validate().is_err() || !self.doc.update(element.clone()) {
            return Vec::new();
        }
        vec![ClientEvent::ElementUpdate { element }]
    }

    pub fn delete_element(&mut self, id: &str) -> Vec<ClientEvent> {
        if self.doc.delete(id).is_none() {
            return Vec::new();
        }
        self.forget(id);
        vec![ClientEvent::ElementDelete { id: id.to_owned() }]
    }

    pub fn delete_selected(&mut self) -> Vec<ClientEvent> {
        match self.selected.clone() {
            Some(id) => self.delete_element(&id),
            None => Vec::new(),
        }
    }

    /// Remove every element as one undoable step.
    pub fn clear_board(&mut self) -> Vec<ClientEvent> {
        self.finish_gesture();
        self.doc.replace_all(Vec::new());
        self.selected = None;
        vec![ClientEvent::ElementsReplace { elements: Vec::new() }]
    }

    pub fn undo(&mut self) -> Vec<ClientEvent> {
        self.gesture = Gesture::Idle;
        if !self.doc.undo() {
            return Vec::new();
        }
        self.after_history_step()
    }

    pub fn redo(&mut self) -> Vec<ClientEvent> {
        self.gesture = Gesture::Idle;
        if !self.doc.redo() {
            return Vec::new();
        }
        self.after_history_step()
    }

    fn after_history_step(&mut self) -> Vec<ClientEvent> {
        self.drop_stale_selection();
        vec![ClientEvent::ElementsReplace { elements: self.doc.snapshot() }]
    }

    // =============================================================
    // Pointer gestures
    // =============================================================

    /// Select the front-most element under `screen`, or clear the selection.
    pub fn select_at(&mut self, screen: Point) -> Option<ElementId> {
        let world = self.view.screen_to_world(screen);
        self.selected = hit_test(world, &self.doc, &self.view).map(|e| e.id.clone());
        self.selected.clone()
    }

    /// Start drawing a new element with the active tool at `screen`.
    ///
    /// Emits the initial `element-add`. Does nothing for the select and pan
    /// tools.
    pub fn begin_element(&mut self, screen: Point) -> Vec<ClientEvent> {
        let Some(kind) = self.tool.element_kind() else {
            return Vec::new();
        };
        let world = self.view.screen_to_world(screen);
        let mut element = Element::new(uuid::Uuid::new_v4().to_string(), kind, world.x, world.y, world.x, world.y)
            .with_color(self.color.clone())
            .with_stroke_size(self.stroke_size)
            .with_filled(self.filled);
        if kind.uses_points() {
            element = element.with_points(vec![world]);
        }
        if let Some(pid) = &self.participant_id {
            element = element.with_created_by(pid.clone());
        }

        self.doc.begin_gesture();
        self.doc.add(element.clone());
        self.gesture = Gesture::Drawing { id: element.id.clone() };
        vec![ClientEvent::ElementAdd { element }]
    }

    /// Pick up the element under `screen` for moving. Returns its id, or
    /// `None` when nothing is hit.
    pub fn begin_move(&mut self, screen: Point) -> Option<ElementId> {
        let id = self.select_at(screen)?;
        self.gesture = Gesture::Moving { id: id.clone(), last_world: self.view.screen_to_world(screen) };
        Some(id)
    }

    /// Continue the current gesture to `screen`, emitting the intermediate
    /// `element-update`.
    pub fn drag_element(&mut self, screen: Point) -> Vec<ClientEvent> {
        let world = self.view.screen_to_world(screen);
        let next = match &mut self.gesture {
            Gesture::Idle => return Vec::new(),
            Gesture::Drawing { id } => self.doc.get(id).map(|e| e.extended_to(world)),
            Gesture::Moving { id, last_world } => {
                let (dx, dy) = (world.x - last_world.x, world.y - last_world.y);
                *last_world = world;
                if !self.doc.in_gesture() {
                    // First frame of a move; a click without a drag leaves no history.
                    self.doc.begin_gesture();
                }
                self.doc.get(id).map(|e| e.translated(dx, dy))
            }
        };
        let Some(element) = next else {
            // Target removed remotely mid-gesture.
            self.finish_gesture();
            return Vec::new();
        };
        self.doc.update(element.clone());
        vec![ClientEvent::ElementUpdate { element }]
    }

    /// End the current gesture. Everything it changed undoes as one step.
    pub fn finish_gesture(&mut self) {
        self.doc.end_gesture();
        self.gesture = Gesture::Idle;
    }

    /// Report the local pointer to peers in world coordinates.
    pub fn move_pointer(&self, screen: Point) -> Vec<ClientEvent> {
        vec![ClientEvent::CursorMove { position: self.view.screen_to_world(screen) }]
    }

    // =============================================================
    // Remote events
    // =============================================================

    /// Apply one event from the relay.
    pub fn apply_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Joined { room_id, participant_id } => {
                self.room_id = Some(room_id);
                self.participant_id = Some(participant_id);
                self.status = ConnectionStatus::Connected;
            }
            ServerEvent::Users { users } => {
                self.cursors.retain(|pid, _| users.iter().any(|u| &u.id == pid));
                self.users = users;
            }
            ServerEvent::Elements { elements } => {
                self.gesture = Gesture::Idle;
                self.doc.load_snapshot(elements);
                self.drop_stale_selection();
            }
            ServerEvent::ElementAdd { element } => {
                self.doc.add(element);
            }
            ServerEvent::ElementUpdate { element } => {
                self.doc.update(element);
            }
            ServerEvent::ElementDelete { id } => {
                if self.doc.delete(&id).is_some() {
                    self.forget(&id);
                }
            }
            ServerEvent::ElementsReplace { elements } => {
                self.doc.replace_all(elements);
                self.drop_stale_selection();
                if let Some(target) = self.gesture_target() {
                    if !self.doc.contains(target) {
                        self.finish_gesture();
                    }
                }
            }
            ServerEvent::CursorMove { participant_id, position } => {
                if self.participant_id.as_deref() != Some(participant_id.as_str()) {
                    self.cursors.insert(participant_id, position);
                }
            }
            ServerEvent::Error { code, message } => {
                self.last_error = Some(RelayError { code, message });
            }
        }
    }

    /// The transport closed. Remote cursors are stale from here on.
    pub fn mark_disconnected(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.cursors.clear();
    }

    // =============================================================
    // Internal
    // =============================================================

    fn gesture_target(&self) -> Option<&str> {
        match &self.gesture {
            Gesture::Idle => None,
            Gesture::Drawing { id } | Gesture::Moving { id, .. } => Some(id),
        }
    }

    /// Drop references to an element that no longer exists.
    fn forget(&mut self, id: &str) {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        if self.gesture_target() == Some(id) {
            self.finish_gesture();
        }
    }

    fn drop_stale_selection(&mut self) {
        if let Some(id) = &self.selected {
            if !self.doc.contains(id) {
                self.selected = None;
            }
        }
    }
}
