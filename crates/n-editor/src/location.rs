//! Location list — positions supplied from outside (linters, grep, build
//! errors) that the user steps through.
//!
//! The list is taken as given: entries are never validated against the
//! buffers they name and never move when those buffers change.

use serde::{Deserialize, Serialize};

use crate::position::Position;
use crate::session::BufferId;

/// One entry: where, and what was reported there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub buffer: BufferId,
    pub position: Position,
    pub message: String,
}

impl Location {
    #[must_use]
    pub fn new(buffer: BufferId, position: Position, message: impl Into<String>) -> Self {
        Self {
            buffer,
            position,
            message: message.into(),
        }
    }
}

/// An ordered list with a selection pointer. Before the first step nothing
/// is selected, so `next` selects the first entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationList {
    items: Vec<Location>,
    index: Option<usize>,
}

impl LocationList {
    #[must_use]
    pub const fn new(items: Vec<Location>) -> Self {
        Self { items, index: None }
    }

    #[must_use]
    pub fn items(&self) -> &[Location] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the selected entry.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    #[must_use]
    pub fn current(&self) -> Option<&Location> {
        self.index.and_then(|i| self.items.get(i))
    }

    /// Step forward. `None` at the end of the list; the selection stays.
    pub fn next(&mut self) -> Option<&Location> {
        let target = self.index.map_or(0, |i| i + 1);
        self.select(target)
    }

    /// Step back. `None` at the start; the selection stays.
    pub fn prev(&mut self) -> Option<&Location> {
        let target = self.index?.checked_sub(1)?;
        self.select(target)
    }

    /// Select entry `index`.
    pub fn select(&mut self, index: usize) -> Option<&Location> {
        if index >= self.items.len() {
            return None;
        }
        self.index = Some(index);
        self.items.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> LocationList {
        LocationList::new(vec![
            Location::new(BufferId(1), Position::new(0, 0), "first"),
            Location::new(BufferId(2), Position::new(4, 2), "second"),
            Location::new(BufferId(1), Position::new(9, 1), "third"),
        ])
    }

    #[test]
    fn next_starts_at_first_entry() {
        let mut l = list();
        assert_eq!(l.current(), None);
        assert_eq!(l.next().map(|e| e.message.as_str()), Some("first"));
        assert_eq!(l.next().map(|e| e.message.as_str()), Some("second"));
        assert_eq!(l.index(), Some(1));
    }

    #[test]
    fn ends_keep_selection() {
        let mut l = list();
        assert!(l.prev().is_none());
        l.select(2);
        assert!(l.next().is_none());
        assert_eq!(l.index(), Some(2));
        assert_eq!(l.prev().map(|e| e.buffer), Some(BufferId(2)));
        assert!(l.select(7).is_none());
        assert_eq!(l.index(), Some(1));
    }

    #[test]
    fn empty_list() {
        let mut l = LocationList::default();
        assert!(l.is_empty());
        assert!(l.next().is_none());
        assert_eq!(l.len(), 0);
    }
}
