//! Client-side document model for sketchroom.
//!
//! The relay and every participant run the same [`doc::DocStore`] rules, so a
//! peer that has applied the relay's event log holds the relay's element
//! sequence. The [`reducer::ClientReducer`] wraps a store with the state a
//! participant needs on top (selection, tool, style, viewport, remote
//! cursors) and turns local actions into wire events. Rendering and DOM
//! wiring live outside this crate.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`doc`] | Element sequence with linear undo/redo history |
//! | [`reducer`] | Participant state machine over a local store |
//! | [`camera`] | Pan/zoom view transform and coordinate conversions |
//! | [`input`] | Tools and the pointer gesture state |
//! | [`hit`] | Front-most-first hit-testing |
//! | [`consts`] | Shared numeric constants (zoom step, scale limits, hit slop) |

pub mod camera;
pub mod consts;
pub mod doc;
pub mod hit;
pub mod input;
pub mod reducer;
