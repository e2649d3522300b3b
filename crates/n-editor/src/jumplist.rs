//! Jump list and change list — per-buffer position history.
//!
//! The **jump list** remembers where the cursor was before each jump motion
//! (`gg`, `G`, `/`, `n`, `%`, `{`, `'x`, ...). `<C-o>` walks back through it
//! and `<Tab>` walks forward again.
//!
//! The **change list** remembers where each change was made; `g;` and `g,`
//! walk it.
//!
//! Both keep their entries attached to the text: an edit that inserts or
//! removes lines shifts the entries below it, and entries on deleted lines
//! are dropped.

use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::history::Edit;
use crate::mark::adjust_position;
use crate::position::Position;

/// Entries kept per list. The oldest falls off first.
pub const HISTORY_MAX: usize = 100;

/// Positions plus a read pointer. `index == entries.len()` means the
/// pointer is past the newest entry, at the live cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Trail {
    entries: Vec<Position>,
    index: usize,
}

impl Trail {
    fn append(&mut self, pos: Position) {
        self.entries.push(pos);
        if self.entries.len() > HISTORY_MAX {
            self.entries.remove(0);
        }
        self.index = self.entries.len();
    }

    fn apply_edit(&mut self, edit: &Edit, after: &Buffer) {
        if !edit.changes_line_count() {
            return;
        }
        let before = self.entries.len();
        let mut kept = Vec::with_capacity(before);
        let mut index = self.index;
        for (i, pos) in self.entries.iter().enumerate() {
            match adjust_position(*pos, edit, after) {
                Some(p) => kept.push(p),
                None if i < self.index => index -= 1,
                None => {}
            }
        }
        self.entries = kept;
        self.index = index.min(self.entries.len());
    }
}

// ---------------------------------------------------------------------------
// JumpList
// ---------------------------------------------------------------------------

/// Positions before jumps.
///
/// A jump made after walking back discards the newer entries. Two entries
/// in a row on the same line collapse into the newer one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpList {
    trail: Trail,
}

impl JumpList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trail: Trail {
                entries: Vec::new(),
                index: 0,
            },
        }
    }

    /// Record the position a jump starts from.
    pub fn push(&mut self, pos: Position) {
        let t = &mut self.trail;
        t.entries.truncate(t.index);
        if t.entries.last().is_some_and(|last| last.line == pos.line) {
            t.entries.pop();
        }
        t.append(pos);
    }

    /// `<C-o>`: `count` entries back. The first step back from the live
    /// cursor saves `current` so that [`forward`](Self::forward) can return
    /// to it.
    pub fn back(&mut self, current: Position, count: usize) -> Option<Position> {
        let t = &mut self.trail;
        if t.entries.is_empty() {
            return None;
        }
        if t.index >= t.entries.len() {
            if t.entries.last().is_none_or(|last| last.line != current.line) {
                t.append(current);
            }
            t.index = t.entries.len() - 1;
        }
        let target = t.index.checked_sub(count.max(1))?;
        t.index = target;
        Some(t.entries[target])
    }

    /// `<Tab>`: `count` entries forward.
    pub fn forward(&mut self, count: usize) -> Option<Position> {
        let t = &mut self.trail;
        let target = t.index + count.max(1);
        if target >= t.entries.len() {
            return None;
        }
        t.index = target;
        Some(t.entries[target])
    }

    /// Shift entries after `edit`.
    pub fn apply_edit(&mut self, edit: &Edit, after: &Buffer) {
        self.trail.apply_edit(edit, after);
    }

    #[must_use]
    pub fn entries(&self) -> &[Position] {
        &self.trail.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trail.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trail.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ChangeList
// ---------------------------------------------------------------------------

/// Positions of changes, oldest first. Walking does not truncate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeList {
    trail: Trail,
}

impl ChangeList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trail: Trail {
                entries: Vec::new(),
                index: 0,
            },
        }
    }

    /// Record a change at `pos` and reset the pointer to the newest entry.
    pub fn push(&mut self, pos: Position) {
        let t = &mut self.trail;
        if t.entries.last() == Some(&pos) {
            t.index = t.entries.len();
            return;
        }
        t.append(pos);
    }

    /// `g;`
    pub fn back(&mut self, count: usize) -> Option<Position> {
        let t = &mut self.trail;
        let target = t.index.checked_sub(count.max(1))?;
        t.index = target;
        t.entries.get(target).copied()
    }

    /// `g,`
    pub fn forward(&mut self, count: usize) -> Option<Position> {
        let t = &mut self.trail;
        let target = t.index + count.max(1);
        if target >= t.entries.len() {
            return None;
        }
        t.index = target;
        Some(t.entries[target])
    }

    pub fn apply_edit(&mut self, edit: &Edit, after: &Buffer) {
        self.trail.apply_edit(edit, after);
    }

    #[must_use]
    pub fn entries(&self) -> &[Position] {
        &self.trail.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trail.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trail.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
