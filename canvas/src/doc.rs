//! Document model: the ordered element sequence and its linear edit history.
//!
//! `DocStore` is the single set of mutation rules shared by the relay (one
//! store per room) and the client reducer (one local mirror). Order is
//! z-order: the last element is drawn front-most. Every mutation other than
//! undo/redo snapshots the whole sequence onto `past` and discards `future`,
//! so an edit made after an undo drops the redo branch.
//!
//! A gesture (a continuous drag or stroke) takes one checkpoint when it
//! begins; mutations inside it do not push history, so a single undo reverts
//! the whole gesture.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{HashSet, VecDeque};

use frames::Element;

/// Identifier of an element within a room.
pub type ElementId = String;

/// Element sequence plus undo/redo stacks.
#[derive(Debug, Clone, Default)]
pub struct DocStore {
    elements: Vec<Element>,
    past: VecDeque<Vec<Element>>,
    future: VecDeque<Vec<Element>>,
    /// Maximum `past` depth. `None` is unbounded; `Some(0)` disables history.
    history_limit: Option<usize>,
    in_gesture: bool,
}

impl DocStore {
    /// Create an empty store with unbounded history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that keeps at most `limit` undo snapshots,
    /// evicting the oldest first.
    #[must_use]
    pub fn with_history_limit(limit: usize) -> Self {
        Self { history_limit: Some(limit), ..Self::default() }
    }

    // --- Mutations ---

    /// Append an element as the front-most. Returns `false` without touching
    /// history when an element with the same id is already present.
    pub fn add(&mut self, element: Element) -> bool {
        if self.contains(&element.id) {
            return false;
        }
        self.checkpoint();
        self.elements.push(element);
        true
    }

    /// Replace the element with the same id, keeping its position.
    /// Returns `false` when no such element exists.
    pub fn update(&mut self, element: Element) -> bool {
        let Some(index) = self.position(&element.id) else {
            return false;
        };
        self.checkpoint();
        self.elements[index] = element;
        true
    }

    /// Remove an element by id, returning it if it was present.
    pub fn delete(&mut self, id: &str) -> Option<Element> {
        let index = self.position(id)?;
        self.checkpoint();
        Some(self.elements.remove(index))
    }

    /// Replace the whole sequence (clear board, undo/redo convergence).
    /// Later duplicates of an id are dropped so ids stay unique.
    pub fn replace_all(&mut self, elements: Vec<Element>) {
        self.checkpoint();
        self.elements = dedup_by_id(elements);
    }

    /// Make the most recent snapshot current. Returns `false` if `past` is empty.
    pub fn undo(&mut self) -> bool {
        self.in_gesture = false;
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.elements, previous);
        self.future.push_front(current);
        true
    }

    /// Make the first `future` snapshot current. Returns `false` if `future` is empty.
    pub fn redo(&mut self) -> bool {
        self.in_gesture = false;
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let current = std::mem::replace(&mut self.elements, next);
        self.push_past(current);
        true
    }

    /// Install a snapshot received from the relay. History is reset: a join
    /// snapshot is a starting point, not an undoable edit.
    pub fn load_snapshot(&mut self, elements: Vec<Element>) {
        self.elements = dedup_by_id(elements);
        self.past.clear();
        self.future.clear();
        self.in_gesture = false;
    }

    // --- Gestures ---

    /// Start a gesture: take one checkpoint now, none for the mutations that follow.
    pub fn begin_gesture(&mut self) {
        self.end_gesture();
        self.checkpoint();
        self.in_gesture = true;
    }

    /// Close the current gesture. Subsequent mutations push history again.
    pub fn end_gesture(&mut self) {
        self.in_gesture = false;
    }

    #[must_use]
    pub fn in_gesture(&self) -> bool {
        self.in_gesture
    }

    // --- Queries ---

    /// Elements in draw order (back to front).
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Owned copy of the current sequence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Element> {
        self.elements.clone()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of snapshots on the undo stack.
    #[must_use]
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    /// Number of snapshots on the redo stack.
    #[must_use]
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    // --- Internals ---

    fn position(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    /// Record the pre-mutation sequence and invalidate the redo branch.
    fn checkpoint(&mut self) {
        if self.in_gesture {
            return;
        }
        self.future.clear();
        if self.keeps_history() {
            self.push_past(self.elements.clone());
        }
    }

    fn keeps_history(&self) -> bool {
        self.history_limit != Some(0)
    }

    fn push_past(&mut self, snapshot: Vec<Element>) {
        if !self.keeps_history() {
            return;
        }
        self.past.push_back(snapshot);
        if let Some(limit) = self.history_limit {
            while self.past.len() > limit {
                self.past.pop_front();
            }
        }
    }
}

fn dedup_by_id(elements: Vec<Element>) -> Vec<Element> {
    let mut seen = HashSet::with_capacity(elements.len());
    elements
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}
