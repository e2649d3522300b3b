//! Cursor — position tracking with movement and selection.
//!
//! The `Cursor` tracks a position in a buffer, a sticky column for vertical
//! movement, and an optional anchor that marks the other end of a visual
//! selection.
//!
//! Movement methods take a `past_end: bool` instead of a mode: normal mode
//! passes `false` (the cursor sits ON a character), insert mode passes
//! `true` (it may sit after the last one).
//!
//! Every motion returns `true` if the cursor moved. A motion that moves part
//! of its count still counts as moved; only a motion that cannot move at
//! all reports `false`, which the editor turns into a boundary error.

use crate::buffer::Buffer;
use crate::position::{Position, Range};
use crate::word::{self, WordKind};

/// Which of `f`, `F`, `t`, `T` a find-char motion is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindKind {
    /// `f`: forward onto the char.
    Forward,
    /// `F`: backward onto the char.
    Backward,
    /// `t`: forward to just before the char.
    TillForward,
    /// `T`: backward to just after the char.
    TillBackward,
}

impl FindKind {
    #[must_use]
    pub const fn from_key(key: char) -> Option<Self> {
        match key {
            'f' => Some(Self::Forward),
            'F' => Some(Self::Backward),
            't' => Some(Self::TillForward),
            'T' => Some(Self::TillBackward),
            _ => None,
        }
    }

    #[must_use]
    pub const fn key(self) -> char {
        match self {
            Self::Forward => 'f',
            Self::Backward => 'F',
            Self::TillForward => 't',
            Self::TillBackward => 'T',
        }
    }

    /// The same search in the other direction, for `,`.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
            Self::TillForward => Self::TillBackward,
            Self::TillBackward => Self::TillForward,
        }
    }

    #[must_use]
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Forward | Self::TillForward)
    }
}

/// A cursor in a text buffer. Does not reference the buffer; movement
/// methods borrow it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cursor {
    pos: Position,
    /// Column that vertical movement tries to return to.
    sticky_col: usize,
    anchor: Option<Position>,
}

impl Cursor {
    #[must_use]
    pub const fn new() -> Self {
        Self::at(Position::ZERO)
    }

    #[must_use]
    pub const fn at(pos: Position) -> Self {
        Self {
            pos,
            sticky_col: pos.col,
            anchor: None,
        }
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    #[must_use]
    pub const fn line(&self) -> usize {
        self.pos.line
    }

    #[inline]
    #[must_use]
    pub const fn col(&self) -> usize {
        self.pos.col
    }

    #[inline]
    #[must_use]
    pub const fn anchor(&self) -> Option<Position> {
        self.anchor
    }

    /// Anchor-to-cursor span, ordered.
    #[must_use]
    pub fn selection(&self) -> Option<Range> {
        self.anchor.map(|a| Range::ordered(a, self.pos))
    }

    // -- Selection control --------------------------------------------------

    pub const fn set_anchor(&mut self) {
        self.anchor = Some(self.pos);
    }

    pub const fn set_anchor_at(&mut self, pos: Position) {
        self.anchor = Some(pos);
    }

    pub const fn clear_anchor(&mut self) {
        self.anchor = None;
    }

    /// Swap cursor and anchor (visual `o`).
    pub const fn swap_anchor(&mut self) {
        if let Some(anchor) = self.anchor {
            self.anchor = Some(self.pos);
            self.pos = anchor;
            self.sticky_col = anchor.col;
        }
    }

    // -- Direct positioning -------------------------------------------------

    /// Move to `pos`, clamped to the buffer. Resets the sticky column.
    pub fn set_position(&mut self, pos: Position, buf: &Buffer, past_end: bool) {
        self.pos = clamp(pos, buf, past_end);
        self.sticky_col = self.pos.col;
    }

    /// Move to `line` (clamped), on its first non-blank char.
    pub fn goto_line(&mut self, line: usize, buf: &Buffer) {
        let line = line.min(buf.last_line());
        self.set_position(Position::new(line, buf.first_non_blank(line)), buf, false);
    }

    // -- Horizontal movement ------------------------------------------------

    /// `h`. Stops at column 0.
    pub fn move_left(&mut self, count: usize, buf: &Buffer, past_end: bool) -> bool {
        let col = self.pos.col.min(max_col_for_line(buf, self.pos.line, past_end));
        self.set_col(col.saturating_sub(count))
    }

    /// `l`. Stops at the last column the mode allows.
    pub fn move_right(&mut self, count: usize, buf: &Buffer, past_end: bool) -> bool {
        let max_col = max_col_for_line(buf, self.pos.line, past_end);
        self.set_col((self.pos.col + count).min(max_col))
    }

    /// `0`.
    pub fn move_to_line_start(&mut self) -> bool {
        self.set_col(0)
    }

    /// `^`.
    pub fn move_to_first_non_blank(&mut self, buf: &Buffer, past_end: bool) -> bool {
        let col = buf.first_non_blank(self.pos.line);
        self.set_col(col.min(max_col_for_line(buf, self.pos.line, past_end)))
    }

    /// `$`. With a count, moves `count - 1` lines down first.
    pub fn move_to_line_end(&mut self, count: usize, buf: &Buffer, past_end: bool) -> bool {
        let before = self.pos;
        self.pos.line = (self.pos.line + count.saturating_sub(1)).min(buf.last_line());
        self.pos.col = max_col_for_line(buf, self.pos.line, past_end);
        self.sticky_col = usize::MAX;
        self.pos != before
    }

    // -- Vertical movement --------------------------------------------------

    /// `k`. Keeps the sticky column.
    pub fn move_up(&mut self, count: usize, buf: &Buffer, past_end: bool) -> bool {
        if self.pos.line == 0 {
            return false;
        }
        let line = self.pos.line.saturating_sub(count);
        self.move_vertical(line, buf, past_end);
        true
    }

    /// `j`. Keeps the sticky column.
    pub fn move_down(&mut self, count: usize, buf: &Buffer, past_end: bool) -> bool {
        if self.pos.line >= buf.last_line() {
            return false;
        }
        let line = (self.pos.line + count).min(buf.last_line());
        self.move_vertical(line, buf, past_end);
        true
    }

    fn move_vertical(&mut self, line: usize, buf: &Buffer, past_end: bool) {
        self.pos.line = line;
        self.pos.col = self.sticky_col.min(max_col_for_line(buf, line, past_end));
    }

    // -- Word motions -------------------------------------------------------

    /// `w` / `W`.
    pub fn word_forward(&mut self, count: usize, buf: &Buffer, kind: WordKind, past_end: bool) -> bool {
        self.repeat_word(count, buf, past_end, |b, p| word::next_start(b, p, kind))
    }

    /// `b` / `B`.
    pub fn word_backward(&mut self, count: usize, buf: &Buffer, kind: WordKind, past_end: bool) -> bool {
        self.repeat_word(count, buf, past_end, |b, p| word::prev_start(b, p, kind))
    }

    /// `e` / `E`.
    pub fn word_end_forward(&mut self, count: usize, buf: &Buffer, kind: WordKind, past_end: bool) -> bool {
        self.repeat_word(count, buf, past_end, |b, p| word::next_end(b, p, kind))
    }

    fn repeat_word(
        &mut self,
        count: usize,
        buf: &Buffer,
        past_end: bool,
        step: impl Fn(&Buffer, Position) -> Position,
    ) -> bool {
        let before = self.pos;
        let mut pos = self.pos;
        for _ in 0..count.max(1) {
            let next = step(buf, pos);
            if next == pos {
                break;
            }
            pos = next;
        }
        self.set_position(pos, buf, past_end);
        self.pos != before
    }

    // -- Character find motions ---------------------------------------------

    /// `f`/`F`/`t`/`T` for the `count`th `ch` on the current line.
    ///
    /// `t` and `T` may skip an adjacent match when repeated with `;`
    /// (`skip_adjacent`), so that `t,;` advances past the comma.
    pub fn find_char(
        &mut self,
        buf: &Buffer,
        kind: FindKind,
        ch: char,
        count: usize,
        skip_adjacent: bool,
    ) -> bool {
        let chars: Vec<char> = buf.line_text(self.pos.line).chars().collect();
        let col = self.pos.col;
        let target = match kind {
            FindKind::Forward => nth_forward(&chars, col, ch, count),
            FindKind::TillForward => {
                let from = if skip_adjacent && chars.get(col + 1) == Some(&ch) {
                    col + 1
                } else {
                    col
                };
                nth_forward(&chars, from, ch, count)
                    .map(|c| c - 1)
                    .filter(|&c| c > col)
            }
            FindKind::Backward => nth_backward(&chars, col, ch, count),
            FindKind::TillBackward => {
                let from = if skip_adjacent && col > 0 && chars.get(col - 1) == Some(&ch) {
                    col - 1
                } else {
                    col
                };
                nth_backward(&chars, from, ch, count)
                    .map(|c| c + 1)
                    .filter(|&c| c < col)
            }
        };
        target.is_some_and(|c| self.set_col(c))
    }

    // -- Paragraph motions --------------------------------------------------

    /// `}`: forward to the next blank line (or the end of the buffer).
    pub fn paragraph_forward(&mut self, count: usize, buf: &Buffer) -> bool {
        let before = self.pos;
        let last = buf.last_line();
        for _ in 0..count.max(1) {
            let mut i = self.pos.line;
            while i <= last && buf.line_len(i) == 0 {
                i += 1;
            }
            while i <= last && buf.line_len(i) != 0 {
                i += 1;
            }
            if i > last {
                self.pos = Position::new(last, buf.line_len(last).saturating_sub(1));
                break;
            }
            self.pos = Position::new(i, 0);
        }
        self.sticky_col = self.pos.col;
        self.pos != before
    }

    /// `{`: backward to the previous blank line (or the start of the buffer).
    pub fn paragraph_backward(&mut self, count: usize, buf: &Buffer) -> bool {
        let before = self.pos;
        for _ in 0..count.max(1) {
            if self.pos.line == 0 {
                self.pos.col = 0;
                break;
            }
            let mut i = self.pos.line;
            while i > 0 && buf.line_len(i) == 0 {
                i -= 1;
            }
            while i > 0 && buf.line_len(i) != 0 {
                i -= 1;
            }
            self.pos = Position::new(i, 0);
        }
        self.sticky_col = 0;
        self.pos != before
    }

    // -- Bracket matching ---------------------------------------------------

    /// `%`: jump to the bracket matching the first bracket at or after the
    /// cursor on its line.
    pub fn match_bracket(&mut self, buf: &Buffer) -> bool {
        match matching_bracket(buf, self.pos) {
            Some(pos) => {
                self.pos = pos;
                self.sticky_col = pos.col;
                true
            }
            None => false,
        }
    }

    // -- Clamping -----------------------------------------------------------

    /// Pull the cursor (and anchor) back inside the buffer after an edit.
    pub fn clamp(&mut self, buf: &Buffer, past_end: bool) {
        self.pos = clamp(self.pos, buf, past_end);
        if let Some(anchor) = &mut self.anchor {
            *anchor = clamp(*anchor, buf, false);
        }
    }

    const fn set_col(&mut self, col: usize) -> bool {
        let moved = self.pos.col != col;
        self.pos.col = col;
        self.sticky_col = col;
        moved
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Highest column the cursor may take on `line`.
pub(crate) fn max_col_for_line(buf: &Buffer, line: usize, past_end: bool) -> usize {
    let len = buf.line_len(line);
    if past_end { len } else { len.saturating_sub(1) }
}

fn clamp(pos: Position, buf: &Buffer, past_end: bool) -> Position {
    if past_end {
        buf.clamp_insert(pos)
    } else {
        buf.clamp_position(pos)
    }
}

fn nth_forward(chars: &[char], col: usize, ch: char, count: usize) -> Option<usize> {
    chars
        .iter()
        .enumerate()
        .skip(col + 1)
        .filter(|&(_, &c)| c == ch)
        .nth(count.max(1) - 1)
        .map(|(i, _)| i)
}

fn nth_backward(chars: &[char], col: usize, ch: char, count: usize) -> Option<usize> {
    chars
        .iter()
        .enumerate()
        .take(col)
        .rev()
        .filter(|&(_, &c)| c == ch)
        .nth(count.max(1) - 1)
        .map(|(i, _)| i)
}

const fn bracket_pair(ch: char) -> Option<(char, char, bool)> {
    match ch {
        '(' => Some(('(', ')', true)),
        '[' => Some(('[', ']', true)),
        '{' => Some(('{', '}', true)),
        ')' => Some(('(', ')', false)),
        ']' => Some(('[', ']', false)),
        '}' => Some(('{', '}', false)),
        _ => None,
    }
}

/// Find the bracket matching the first bracket at or after `pos` on its
/// line, scanning across lines with nesting.
#[must_use]
pub fn matching_bracket(buf: &Buffer, pos: Position) -> Option<Position> {
    let rope = buf.rope();
    let line_start = buf.pos_to_char_idx(pos.with_col(0))?;
    let line_len = buf.line_len(pos.line);
    let (start_idx, (open, close, forward)) = (pos.col..line_len).find_map(|col| {
        bracket_pair(rope.char(line_start + col)).map(|pair| (line_start + col, pair))
    })?;

    let mut depth = 0usize;
    if forward {
        for idx in start_idx..rope.len_chars() {
            let c = rope.char(idx);
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return buf.char_idx_to_pos(idx);
                }
            }
        }
    } else {
        for idx in (0..=start_idx).rev() {
            let c = rope.char(idx);
            if c == close {
                depth += 1;
            } else if c == open {
                depth -= 1;
                if depth == 0 {
                    return buf.char_idx_to_pos(idx);
                }
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn p(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    fn buf(lines: &[&str]) -> Buffer {
        Buffer::from_lines(lines)
    }

    // -- Horizontal movement ------------------------------------------------

    #[test]
    fn left_right_stop_at_line_edges() {
        let b = buf(&["hello"]);
        let mut c = Cursor::new();
        assert!(!c.move_left(1, &b, false));
        assert!(c.move_right(10, &b, false));
        assert_eq!(c.position(), p(0, 4));
        assert!(!c.move_right(1, &b, false));
        assert!(c.move_right(1, &b, true));
        assert_eq!(c.col(), 5);
    }

    #[test]
    fn line_start_end_and_first_non_blank() {
        let b = buf(&["   text", "ab"]);
        let mut c = Cursor::at(p(0, 5));
        assert!(c.move_to_first_non_blank(&b, false));
        assert_eq!(c.col(), 3);
        assert!(c.move_to_line_start());
        assert!(c.move_to_line_end(1, &b, false));
        assert_eq!(c.col(), 6);
        assert!(c.move_to_line_end(2, &b, false));
        assert_eq!(c.position(), p(1, 1));
    }

    // -- Vertical movement --------------------------------------------------

    #[test]
    fn vertical_keeps_sticky_column() {
        let b = buf(&["long line", "ab", "another line"]);
        let mut c = Cursor::at(p(0, 7));
        assert!(c.move_down(1, &b, false));
        assert_eq!(c.position(), p(1, 1));
        assert!(c.move_down(1, &b, false));
        assert_eq!(c.position(), p(2, 7));
    }

    #[test]
    fn vertical_partial_count_moves() {
        let b = buf(&["a", "b", "c"]);
        let mut c = Cursor::new();
        assert!(c.move_down(10, &b, false));
        assert_eq!(c.line(), 2);
        assert!(!c.move_down(1, &b, false));
        assert!(c.move_up(5, &b, false));
        assert_eq!(c.line(), 0);
        assert!(!c.move_up(1, &b, false));
    }

    #[test]
    fn dollar_sticks_to_line_end() {
        let b = buf(&["abc", "abcdef"]);
        let mut c = Cursor::new();
        c.move_to_line_end(1, &b, false);
        c.move_down(1, &b, false);
        assert_eq!(c.position(), p(1, 5));
    }

    // -- Word motions -------------------------------------------------------

    #[test]
    fn word_motions_with_count() {
        let b = buf(&["one two three four"]);
        let mut c = Cursor::new();
        assert!(c.word_forward(2, &b, WordKind::Word, false));
        assert_eq!(c.col(), 8);
        assert!(c.word_backward(1, &b, WordKind::Word, false));
        assert_eq!(c.col(), 4);
        assert!(c.word_end_forward(1, &b, WordKind::Word, false));
        assert_eq!(c.col(), 6);
    }

    #[test]
    fn word_forward_at_last_char_cannot_move() {
        let b = buf(&["one two"]);
        let mut c = Cursor::at(p(0, 6));
        assert!(!c.word_forward(1, &b, WordKind::Word, false));
        let mut c = Cursor::at(p(0, 4));
        assert!(c.word_forward(1, &b, WordKind::Word, false));
        assert_eq!(c.col(), 6);
    }

    // -- Character find -----------------------------------------------------

    #[test]
    fn find_char_variants() {
        let b = buf(&["a,b,c,d"]);
        let mut c = Cursor::new();
        assert!(c.find_char(&b, FindKind::Forward, ',', 2, false));
        assert_eq!(c.col(), 3);
        assert!(c.find_char(&b, FindKind::Backward, 'a', 1, false));
        assert_eq!(c.col(), 0);
        assert!(c.find_char(&b, FindKind::TillForward, 'c', 1, false));
        assert_eq!(c.col(), 3);
        assert!(!c.find_char(&b, FindKind::Forward, 'z', 1, false));
        assert_eq!(c.col(), 3);
    }

    #[test]
    fn till_repeat_skips_adjacent_match() {
        let b = buf(&["a,b,c"]);
        let mut c = Cursor::at(p(0, 0));
        assert!(!c.find_char(&b, FindKind::TillForward, ',', 1, false));
        assert!(c.find_char(&b, FindKind::TillForward, ',', 1, true));
        assert_eq!(c.col(), 2);
    }

    #[test]
    fn find_char_stays_on_line() {
        let b = buf(&["abc", "x"]);
        let mut c = Cursor::new();
        assert!(!c.find_char(&b, FindKind::Forward, 'x', 1, false));
    }

    // -- Paragraphs and brackets --------------------------------------------

    #[test]
    fn paragraph_motions() {
        let b = buf(&["a", "b", "", "c", "", "", "d"]);
        let mut c = Cursor::new();
        assert!(c.paragraph_forward(1, &b));
        assert_eq!(c.line(), 2);
        assert!(c.paragraph_forward(1, &b));
        assert_eq!(c.line(), 4);
        assert!(c.paragraph_forward(1, &b));
        assert_eq!(c.position(), p(6, 0));
        assert!(!c.paragraph_forward(1, &b));
        assert!(c.paragraph_backward(1, &b));
        assert_eq!(c.line(), 5);
        assert!(c.paragraph_backward(1, &b));
        assert_eq!(c.line(), 2);
    }

    #[test]
    fn bracket_matching_nests_across_lines() {
        let b = buf(&["fn f(a: (u8)) {", "  x", "}"]);
        let mut c = Cursor::new();
        assert!(c.match_bracket(&b));
        assert_eq!(c.position(), p(0, 12));
        assert!(c.match_bracket(&b));
        assert_eq!(c.position(), p(0, 4));
        let mut c = Cursor::at(p(0, 13));
        assert!(c.match_bracket(&b));
        assert_eq!(c.position(), p(2, 0));
        let mut c = Cursor::at(p(1, 0));
        assert!(!c.match_bracket(&b));
    }

    // -- Selection ----------------------------------------------------------

    #[test]
    fn selection_is_ordered_and_swappable() {
        let mut c = Cursor::at(p(2, 3));
        c.set_anchor();
        c.set_position(p(0, 1), &buf(&["abc", "abc", "abcd"]), false);
        assert_eq!(c.selection(), Some(Range::new(p(0, 1), p(2, 3))));
        c.swap_anchor();
        assert_eq!(c.position(), p(2, 3));
        assert_eq!(c.anchor(), Some(p(0, 1)));
    }
}
