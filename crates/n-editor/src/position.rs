//! Text position and range types.
//!
//! All coordinates are **0-indexed**. Line 0 is the first line, column 0 is the
//! first character. Columns count Unicode scalar values (chars), not bytes,
//! which is how `ropey` indexes text.
//!
//! Marks, undo nodes and persisted session state all store these types, so
//! both derive `serde` traits.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A position in a text buffer: (line, column), both 0-indexed.
///
/// `col` is the char offset from the start of the line. Column `len` (one
/// past the last char) is valid only while inserting.
///
/// Positions order lexicographically: line first, then column.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    /// The origin — line 0, column 0.
    pub const ZERO: Self = Self { line: 0, col: 0 };

    #[inline]
    #[must_use]
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Same line, different column.
    #[inline]
    #[must_use]
    pub const fn with_col(self, col: usize) -> Self {
        Self {
            line: self.line,
            col,
        }
    }
}

impl Ord for Position {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line
            .cmp(&other.line)
            .then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for Position {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({}:{})", self.line, self.col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-indexed for human display, matching Vim's `line:col` status.
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// A half-open range in a text buffer: `[start, end)`.
///
/// Ranges are always normalized so that `start <= end`. Use [`Range::new`]
/// when the order is known, [`Range::ordered`] for anchor/head pairs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Create a range. Panics in debug if `start > end`.
    #[inline]
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        debug_assert!(
            start.line < end.line || (start.line == end.line && start.col <= end.col),
            "Range::new requires start <= end"
        );
        Self { start, end }
    }

    /// Build a range from two arbitrary positions, swapping if needed.
    #[inline]
    #[must_use]
    pub fn ordered(a: Position, b: Position) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// A zero-width range at `pos`.
    #[inline]
    #[must_use]
    pub const fn point(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.line == self.end.line && self.start.col == self.end.col
    }

    /// True when the given position falls within `[start, end)`.
    #[inline]
    #[must_use]
    pub fn contains(self, pos: Position) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Number of lines this range touches. An empty range touches one.
    #[inline]
    #[must_use]
    pub const fn line_span(self) -> usize {
        self.end.line - self.start.line + 1
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range({}:{} .. {}:{})",
            self.start.line, self.start.col, self.end.line, self.end.col
        )
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
