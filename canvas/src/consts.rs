//! Shared numeric constants for the canvas crate.

// ── Viewport ────────────────────────────────────────────────────

/// Multiplicative step applied by one zoom-in / zoom-out.
pub const ZOOM_STEP: f64 = 1.2;

/// Smallest allowed view scale.
pub const MIN_SCALE: f64 = 0.1;

/// Largest allowed view scale.
pub const MAX_SCALE: f64 = 10.0;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for lines and stroke points.
pub const HIT_TOLERANCE_PX: f64 = 5.0;

/// Text hit box: glyph advance per character, as a multiple of stroke size.
pub const TEXT_ADVANCE_PER_CHAR: f64 = 1.0;

/// Text hit box: line height, as a multiple of stroke size.
pub const TEXT_LINE_HEIGHT: f64 = 2.0;
