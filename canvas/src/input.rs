//! Input model: the active tool and the in-flight pointer gesture.
//!
//! `Tool` is the user's intent at pointer-down. `Gesture` is what the reducer
//! tracks between pointer-down and pointer-up so intermediate frames can be
//! emitted as updates while sharing one history checkpoint.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use serde::{Deserialize, Serialize};

use frames::ElementKind;

use crate::camera::Point;
use crate::doc::ElementId;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    /// Pointer / selection tool.
    #[default]
    Select,
    /// Drag the viewport.
    Pan,
    /// Freehand stroke.
    Pen,
    Line,
    Rectangle,
    Circle,
    Text,
    Image,
    /// Freehand closed outline.
    Shape,
}

impl Tool {
    /// The element kind this tool draws, or `None` for the select and pan
    /// tools.
    #[must_use]
    pub fn element_kind(self) -> Option<ElementKind> {
        match self {
            Self::Select | Self::Pan => None,
            Self::Pen => Some(ElementKind::PenStroke),
            Self::Line => Some(ElementKind::Line),
            Self::Rectangle => Some(ElementKind::Rectangle),
            Self::Circle => Some(ElementKind::Circle),
            Self::Text => Some(ElementKind::Text),
            Self::Image => Some(ElementKind::Image),
            Self::Shape => Some(ElementKind::FreeFormShape),
        }
    }

    /// Whether this tool keeps the current selection when activated.
    #[must_use]
    pub fn keeps_selection(self) -> bool {
        self == Self::Select
    }
}

/// Pointer gesture tracked between pointer-down and pointer-up.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A newly created element is being sized or stroked.
    Drawing { id: ElementId },
    /// An existing element is being dragged.
    Moving {
        id: ElementId,
        /// World-space pointer position at the previous frame.
        last_world: Point,
    },
}

impl Gesture {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}
