//! Shared event model and JSON codec for the realtime WS transport.
//!
//! This crate owns the wire representation used by both the relay and the
//! client reducer: drawable [`Element`]s, room [`Participant`]s, and the two
//! closed event enums ([`ClientEvent`] upstream, [`ServerEvent`] downstream).
//! Every payload is a tagged variant so handlers match exhaustively instead
//! of probing loose JSON maps.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by the decode/encode helpers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not JSON, or does not match any known event shape.
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),
    /// The event parsed but carries an element that fails validation.
    #[error("invalid element: {0}")]
    InvalidElement(#[from] ElementError),
}

/// Reasons an element is rejected before it reaches a document store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElementError {
    #[error("element id must not be empty")]
    EmptyId,
    #[error("element {id} has non-finite geometry")]
    NonFiniteGeometry { id: String },
    #[error("element {id} has invalid stroke size {value}")]
    InvalidStrokeSize { id: String, value: f64 },
}

/// Grepable error code for structured `error` events.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

impl ErrorCode for CodecError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Json(_) => "E_MALFORMED_EVENT",
            Self::InvalidElement(_) => "E_INVALID_ELEMENT",
        }
    }
}

impl ErrorCode for ElementError {
    fn error_code(&self) -> &'static str {
        "E_INVALID_ELEMENT"
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// A 2D point in world coordinates (stroke points, cursor positions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// =============================================================================
// ELEMENT
// =============================================================================

/// Stroke width used when an element arrives without one.
pub const DEFAULT_STROKE_SIZE: f64 = 3.0;

/// Stroke color used when an element arrives without one.
pub const DEFAULT_COLOR: &str = "#000000";

/// The kind of a drawable element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    /// Straight segment from `(x1, y1)` to `(x2, y2)`.
    Line,
    /// Axis-aligned rectangle spanning both corners.
    Rectangle,
    /// Circle whose diameter is the corner-to-corner distance.
    Circle,
    /// Freehand stroke; geometry lives in `points`.
    #[serde(alias = "pen")]
    PenStroke,
    /// Text anchored at `(x1, y1)`.
    Text,
    /// Embedded raster image spanning both corners.
    Image,
    /// Closed freehand outline; geometry lives in `points`.
    #[serde(alias = "shape")]
    FreeFormShape,
}

impl ElementKind {
    /// Whether this kind stores its geometry as a point sequence.
    #[must_use]
    pub fn uses_points(self) -> bool {
        matches!(self, Self::PenStroke | Self::FreeFormShape)
    }
}

/// One drawable object. Edits always replace the whole value under the same
/// `id`; there are no partial patches on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_stroke_size")]
    pub stroke_size: f64,
    #[serde(default)]
    pub filled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    /// Participant that created the element. Attribution only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_owned()
}

fn default_stroke_size() -> f64 {
    DEFAULT_STROKE_SIZE
}

impl Element {
    /// Create an element with default style spanning the given corners.
    pub fn new(id: impl Into<String>, kind: ElementKind, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            x1,
            y1,
            x2,
            y2,
            points: Vec::new(),
            color: default_color(),
            stroke_size: DEFAULT_STROKE_SIZE,
            filled: false,
            text: None,
            image_data: None,
            created_by: None,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    #[must_use]
    pub fn with_stroke_size(mut self, stroke_size: f64) -> Self {
        self.stroke_size = stroke_size;
        self
    }

    #[must_use]
    pub fn with_filled(mut self, filled: bool) -> Self {
        self.filled = filled;
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    #[must_use]
    pub fn with_created_by(mut self, participant_id: impl Into<String>) -> Self {
        self.created_by = Some(participant_id.into());
        self
    }

    /// Copy of this element with its second corner moved to `to`.
    /// Point-based kinds also append `to` to their stroke.
    #[must_use]
    pub fn extended_to(&self, to: Point) -> Self {
        let mut next = self.clone();
        next.x2 = to.x;
        next.y2 = to.y;
        if next.kind.uses_points() {
            next.points.push(to);
        }
        next
    }

    /// Copy of this element shifted by `(dx, dy)`, points included.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        let mut next = self.clone();
        next.x1 += dx;
        next.y1 += dy;
        next.x2 += dx;
        next.y2 += dy;
        for p in &mut next.points {
            p.x += dx;
            p.y += dy;
        }
        next
    }

    /// Check the invariants a store relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError`] for an empty id, non-finite geometry, or a
    /// negative or non-finite stroke size.
    pub fn validate(&self) -> Result<(), ElementError> {
        if self.id.is_empty() {
            return Err(ElementError::EmptyId);
        }
        let corners = [self.x1, self.y1, self.x2, self.y2];
        if !corners.iter().all(|v| v.is_finite()) || !self.points.iter().all(|p| p.is_finite()) {
            return Err(ElementError::NonFiniteGeometry { id: self.id.clone() });
        }
        if !self.stroke_size.is_finite() || self.stroke_size < 0.0 {
            return Err(ElementError::InvalidStrokeSize { id: self.id.clone(), value: self.stroke_size });
        }
        Ok(())
    }
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// A connected room member as seen by every other member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Last known pointer position. Absent until the first `cursor-move`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
}

/// Identity a client presents when connecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

// =============================================================================
// EVENTS
// =============================================================================

/// Events a participant sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    ElementAdd { element: Element },
    ElementUpdate { element: Element },
    ElementDelete { id: String },
    CursorMove { position: Point },
    /// Whole-sequence replacement: clear board, or the state after an undo/redo.
    ElementsReplace { elements: Vec<Element> },
}

impl ClientEvent {
    /// Wire name of the variant, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ElementAdd { .. } => "element-add",
            Self::ElementUpdate { .. } => "element-update",
            Self::ElementDelete { .. } => "element-delete",
            Self::CursorMove { .. } => "cursor-move",
            Self::ElementsReplace { .. } => "elements-replace",
        }
    }

    /// Validate every element carried by the event.
    ///
    /// # Errors
    ///
    /// Returns the first [`ElementError`] found. A cursor position must be finite.
    pub fn validate(&self) -> Result<(), ElementError> {
        match self {
            Self::ElementAdd { element } | Self::ElementUpdate { element } => element.validate(),
            Self::ElementDelete { id } if id.is_empty() => Err(ElementError::EmptyId),
            Self::ElementDelete { .. } => Ok(()),
            Self::CursorMove { position } if !position.is_finite() => {
                Err(ElementError::NonFiniteGeometry { id: String::from("cursor") })
            }
            Self::CursorMove { .. } => Ok(()),
            Self::ElementsReplace { elements } => elements.iter().try_for_each(Element::validate),
        }
    }
}

/// Events the relay sends to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First event after admission. Carries the resolved room id.
    Joined {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "participantId")]
        participant_id: String,
    },
    /// Full participant list, sent on join and on every membership change.
    Users { users: Vec<Participant> },
    /// Join-time snapshot of the room's element sequence.
    Elements { elements: Vec<Element> },
    ElementAdd { element: Element },
    ElementUpdate { element: Element },
    ElementDelete { id: String },
    ElementsReplace { elements: Vec<Element> },
    CursorMove {
        #[serde(rename = "participantId")]
        participant_id: String,
        position: Point,
    },
    /// Sent to the originator only; never fanned out.
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Build an `error` event from a typed error.
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error { code: err.error_code().to_owned(), message: err.to_string() }
    }

    /// Wire name of the variant, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::Users { .. } => "users",
            Self::Elements { .. } => "elements",
            Self::ElementAdd { .. } => "element-add",
            Self::ElementUpdate { .. } => "element-update",
            Self::ElementDelete { .. } => "element-delete",
            Self::ElementsReplace { .. } => "elements-replace",
            Self::CursorMove { .. } => "cursor-move",
            Self::Error { .. } => "error",
        }
    }

    /// Cursor traffic is high-rate and skipped by per-event logging.
    #[must_use]
    pub fn is_cursor(&self) -> bool {
        matches!(self, Self::CursorMove { .. })
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Decode and validate one inbound client event.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for text that is not a known event and
/// [`CodecError::InvalidElement`] when a carried element fails validation.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, CodecError> {
    let event: ClientEvent = serde_json::from_str(text)?;
    event.validate()?;
    Ok(event)
}

/// Decode one server event.
///
/// # Errors
///
/// Returns [`CodecError::Json`] when the text does not match any variant.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a client event as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_client_event(event: &ClientEvent) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

/// Encode a server event as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
