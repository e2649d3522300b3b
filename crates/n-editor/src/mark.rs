//! Marks — named buffer positions.
//!
//! | Key | Scope | Set by |
//! |-----|-------|--------|
//! | `a`–`z` | the buffer they were set in | `m{a-z}` |
//! | `A`–`Z` | global: buffer + position | `m{A-Z}` |
//! | `'` `` ` `` | buffer | every jump (position before it) |
//! | `.` | buffer | every change |
//! | `^` | buffer | leaving insert mode |
//! | `[` `]` | buffer | every change or yank (span ends) |
//! | `<` `>` | buffer | leaving visual mode |
//! | `"` | buffer | closing the buffer |
//!
//! Marks follow their text: when whole lines are inserted or removed above
//! a mark it moves with its line, and a mark whose line is deleted becomes
//! unset. Global marks into a closed buffer are dangling.

use std::collections::{HashMap, HashSet};

use crate::buffer::{Buffer, end_after_insert};
use crate::error::MarkError;
use crate::history::Edit;
use crate::position::Position;
use crate::session::BufferId;

/// Marks the editor maintains on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoMark {
    /// `'` / `` ` ``
    PreviousJump,
    /// `.`
    LastChange,
    /// `^`
    LastInsert,
    /// `[`
    ChangeStart,
    /// `]`
    ChangeEnd,
    /// `<`
    VisualStart,
    /// `>`
    VisualEnd,
    /// `"`
    LastExit,
}

impl AutoMark {
    const ALL: [Self; 8] = [
        Self::PreviousJump,
        Self::LastChange,
        Self::LastInsert,
        Self::ChangeStart,
        Self::ChangeEnd,
        Self::VisualStart,
        Self::VisualEnd,
        Self::LastExit,
    ];

    #[must_use]
    pub const fn from_key(key: char) -> Option<Self> {
        match key {
            '\'' | '`' => Some(Self::PreviousJump),
            '.' => Some(Self::LastChange),
            '^' => Some(Self::LastInsert),
            '[' => Some(Self::ChangeStart),
            ']' => Some(Self::ChangeEnd),
            '<' => Some(Self::VisualStart),
            '>' => Some(Self::VisualEnd),
            '"' => Some(Self::LastExit),
            _ => None,
        }
    }

    #[must_use]
    pub const fn key(self) -> char {
        match self {
            Self::PreviousJump => '\'',
            Self::LastChange => '.',
            Self::LastInsert => '^',
            Self::ChangeStart => '[',
            Self::ChangeEnd => ']',
            Self::VisualStart => '<',
            Self::VisualEnd => '>',
            Self::LastExit => '"',
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// A global mark: where it points and when it was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GlobalMark {
    buffer: BufferId,
    pos: Position,
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct BufferMarks {
    local: [Option<Position>; 26],
    auto: [Option<Position>; AutoMark::ALL.len()],
}

/// All marks of all buffers.
#[derive(Debug, Clone, Default)]
pub struct MarkStore {
    buffers: HashMap<BufferId, BufferMarks>,
    global: [Option<GlobalMark>; 26],
    closed: HashSet<BufferId>,
    seq: u64,
}

impl MarkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user mark. Lowercase keys are local to `buffer`, uppercase keys
    /// are global.
    ///
    /// # Errors
    ///
    /// `ReadOnly` for automatic mark keys, `Invalid` for anything else that
    /// is not a letter.
    pub fn set_mark(&mut self, key: char, buffer: BufferId, pos: Position) -> Result<(), MarkError> {
        match key {
            'a'..='z' => {
                self.marks_mut(buffer).local[(key as u8 - b'a') as usize] = Some(pos);
            }
            'A'..='Z' => {
                self.seq += 1;
                self.global[(key as u8 - b'A') as usize] = Some(GlobalMark {
                    buffer,
                    pos,
                    seq: self.seq,
                });
            }
            _ if AutoMark::from_key(key).is_some() => return Err(MarkError::ReadOnly),
            _ => return Err(MarkError::Invalid),
        }
        tracing::trace!(target: "editor.mark", mark = %key, buffer = %buffer, %pos, "set");
        Ok(())
    }

    /// Update an automatic mark.
    pub fn set_auto(&mut self, buffer: BufferId, mark: AutoMark, pos: Position) {
        self.marks_mut(buffer).auto[mark.index()] = Some(pos);
    }

    /// Resolve a mark as seen from `current`.
    ///
    /// # Errors
    ///
    /// `Unset` if the mark was never set (or its line was deleted),
    /// `Dangling` for a global mark into a closed buffer, `Invalid` for a
    /// key that names no mark.
    pub fn get_mark(&self, key: char, current: BufferId) -> Result<(BufferId, Position), MarkError> {
        match key {
            'a'..='z' => self
                .buffers
                .get(&current)
                .and_then(|m| m.local[(key as u8 - b'a') as usize])
                .map(|pos| (current, pos))
                .ok_or(MarkError::Unset),
            'A'..='Z' => {
                let mark = self.global[(key as u8 - b'A') as usize].ok_or(MarkError::Unset)?;
                if self.closed.contains(&mark.buffer) {
                    return Err(MarkError::Dangling);
                }
                Ok((mark.buffer, mark.pos))
            }
            _ => {
                let auto = AutoMark::from_key(key).ok_or(MarkError::Invalid)?;
                self.auto(current, auto)
                    .map(|pos| (current, pos))
                    .ok_or(MarkError::Unset)
            }
        }
    }

    /// An automatic mark of `buffer`, if set.
    #[must_use]
    pub fn auto(&self, buffer: BufferId, mark: AutoMark) -> Option<Position> {
        self.buffers.get(&buffer).and_then(|m| m.auto[mark.index()])
    }

    /// Keep marks of `buffer` attached to their text after `edit`. `after`
    /// is the buffer as it is once the edit has been applied.
    pub fn apply_edit(&mut self, buffer: BufferId, edit: &Edit, after: &Buffer) {
        if !edit.changes_line_count() {
            return;
        }
        if let Some(marks) = self.buffers.get_mut(&buffer) {
            for slot in marks.local.iter_mut().chain(marks.auto.iter_mut()) {
                *slot = slot.and_then(|pos| adjust_position(pos, edit, after));
            }
        }
        for slot in &mut self.global {
            let Some(mark) = *slot else { continue };
            if mark.buffer == buffer {
                *slot = adjust_position(mark.pos, edit, after).map(|pos| GlobalMark { pos, ..mark });
            }
        }
    }

    /// Record `last_pos` as the buffer's `"` mark and make global marks into
    /// it dangling.
    pub fn close_buffer(&mut self, buffer: BufferId, last_pos: Position) {
        self.set_auto(buffer, AutoMark::LastExit, last_pos);
        self.closed.insert(buffer);
        tracing::debug!(target: "editor.mark", buffer = %buffer, "buffer closed");
    }

    #[must_use]
    pub fn is_closed(&self, buffer: BufferId) -> bool {
        self.closed.contains(&buffer)
    }

    /// Up to `n` live global marks, most recently set first.
    #[must_use]
    pub fn recent_global_marks(&self, n: usize) -> Vec<(char, BufferId, Position)> {
        let mut marks: Vec<(u64, char, BufferId, Position)> = self
            .global
            .iter()
            .zip('A'..='Z')
            .filter_map(|(slot, key)| slot.map(|m| (m.seq, key, m.buffer, m.pos)))
            .filter(|(_, _, buffer, _)| !self.closed.contains(buffer))
            .collect();
        marks.sort_by(|a, b| b.0.cmp(&a.0));
        marks
            .into_iter()
            .take(n)
            .map(|(_, key, buffer, pos)| (key, buffer, pos))
            .collect()
    }

    fn marks_mut(&mut self, buffer: BufferId) -> &mut BufferMarks {
        self.buffers.entry(buffer).or_default()
    }
}

/// Where `pos` ends up after `edit`, or `None` if its line was removed.
///
/// Only line breaks matter: marks move with their line and keep their
/// column, except on a line that was split or joined, where the column
/// follows the text.
#[must_use]
pub fn adjust_position(pos: Position, edit: &Edit, after: &Buffer) -> Option<Position> {
    let text = edit.text();
    let breaks = text.matches('\n').count();
    if breaks == 0 {
        return Some(pos);
    }
    let at = edit.pos();
    let end = end_after_insert(at, text);

    match edit {
        Edit::Insert { .. } => {
            if pos.line > at.line {
                return Some(Position::new(pos.line + breaks, pos.col));
            }
            if pos.line < at.line || pos.col < at.col {
                return Some(pos);
            }
            // Length of the split line before the insert.
            let old_len = at.col + after.line_len(end.line) - end.col;
            let splits = at.col < old_len
                || (at.col == 0 && text.ends_with('\n') && !text.starts_with('\n'));
            if splits {
                Some(Position::new(end.line, end.col + pos.col - at.col))
            } else {
                Some(pos)
            }
        }
        Edit::Delete { .. } => {
            // Range of lines whose text is gone entirely.
            let (first, last) = if at.col == 0 && end.col == 0 {
                (at.line, end.line - 1)
            } else if text.starts_with('\n') && after.line_len(at.line) == at.col {
                (at.line + 1, end.line)
            } else {
                (at.line + 1, end.line.saturating_sub(1))
            };
            let removed = first <= last && (first..=last).contains(&pos.line);
            if removed {
                return None;
            }
            if pos.line > end.line {
                Some(Position::new(pos.line - breaks, pos.col))
            } else if pos.line == end.line {
                Some(Position::new(at.line, at.col + pos.col.saturating_sub(end.col)))
            } else {
                Some(pos)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const B1: BufferId = BufferId(1);
    const B2: BufferId = BufferId(2);

    fn p(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    /// Apply `edit` to `buf` and move the store's marks with it.
    fn edit(store: &mut MarkStore, buf: &mut Buffer, edit: &Edit) {
        edit.apply(buf);
        store.apply_edit(B1, edit, buf);
    }

    fn del(line: usize, col: usize, text: &str) -> Edit {
        Edit::Delete {
            pos: p(line, col),
            text: text.into(),
        }
    }

    fn ins(line: usize, col: usize, text: &str) -> Edit {
        Edit::Insert {
            pos: p(line, col),
            text: text.into(),
        }
    }

    // -- Setting and reading ------------------------------------------------

    #[test]
    fn local_marks_are_per_buffer() {
        let mut store = MarkStore::new();
        store.set_mark('a', B1, p(2, 3)).unwrap();
        assert_eq!(store.get_mark('a', B1), Ok((B1, p(2, 3))));
        assert_eq!(store.get_mark('a', B2), Err(MarkError::Unset));
    }

    #[test]
    fn global_marks_cross_buffers() {
        let mut store = MarkStore::new();
        store.set_mark('A', B1, p(3, 0)).unwrap();
        assert_eq!(store.get_mark('A', B2), Ok((B1, p(3, 0))));
    }

    #[test]
    fn auto_marks_are_read_only() {
        let mut store = MarkStore::new();
        assert_eq!(store.set_mark('.', B1, p(0, 0)), Err(MarkError::ReadOnly));
        assert_eq!(store.set_mark('1', B1, p(0, 0)), Err(MarkError::Invalid));
        store.set_auto(B1, AutoMark::LastChange, p(4, 1));
        assert_eq!(store.get_mark('.', B1), Ok((B1, p(4, 1))));
        assert_eq!(store.get_mark('^', B1), Err(MarkError::Unset));
        assert_eq!(store.get_mark('!', B1), Err(MarkError::Invalid));
    }

    #[test]
    fn backtick_and_quote_share_previous_jump() {
        let mut store = MarkStore::new();
        store.set_auto(B1, AutoMark::PreviousJump, p(9, 2));
        assert_eq!(store.get_mark('`', B1), store.get_mark('\'', B1));
    }

    #[test]
    fn closing_a_buffer_dangles_its_global_marks() {
        let mut store = MarkStore::new();
        store.set_mark('A', B1, p(1, 0)).unwrap();
        store.set_mark('B', B2, p(0, 0)).unwrap();
        store.close_buffer(B1, p(5, 2));
        assert_eq!(store.get_mark('A', B2), Err(MarkError::Dangling));
        assert_eq!(store.get_mark('B', B1), Ok((B2, p(0, 0))));
        assert_eq!(store.auto(B1, AutoMark::LastExit), Some(p(5, 2)));
    }

    #[test]
    fn recent_global_marks_newest_first() {
        let mut store = MarkStore::new();
        store.set_mark('C', B1, p(0, 0)).unwrap();
        store.set_mark('A', B1, p(1, 0)).unwrap();
        store.set_mark('B', B2, p(2, 0)).unwrap();
        let keys: Vec<char> = store
            .recent_global_marks(2)
            .into_iter()
            .map(|(k, _, _)| k)
            .collect();
        assert_eq!(keys, vec!['B', 'A']);
    }

    // -- Following the text -------------------------------------------------

    #[test]
    fn deleting_a_line_above_shifts_marks_up() {
        let mut buf = Buffer::from_lines(&["a", "b", "c"]);
        let mut store = MarkStore::new();
        store.set_mark('x', B1, p(2, 0)).unwrap();
        edit(&mut store, &mut buf, &del(0, 0, "a\n"));
        assert_eq!(store.get_mark('x', B1), Ok((B1, p(1, 0))));
    }

    #[test]
    fn deleting_the_marked_line_unsets_it() {
        let mut buf = Buffer::from_lines(&["a", "b", "c"]);
        let mut store = MarkStore::new();
        store.set_mark('x', B1, p(1, 0)).unwrap();
        store.set_mark('y', B1, p(0, 0)).unwrap();
        edit(&mut store, &mut buf, &del(1, 0, "b\n"));
        assert_eq!(store.get_mark('x', B1), Err(MarkError::Unset));
        assert_eq!(store.get_mark('y', B1), Ok((B1, p(0, 0))));
    }

    #[test]
    fn deleting_the_last_line_unsets_its_marks() {
        let mut buf = Buffer::from_lines(&["a", "bc"]);
        let mut store = MarkStore::new();
        store.set_mark('x', B1, p(1, 1)).unwrap();
        store.set_mark('y', B1, p(0, 0)).unwrap();
        edit(&mut store, &mut buf, &del(0, 1, "\nbc"));
        assert_eq!(buf.lines(), vec!["a"]);
        assert_eq!(store.get_mark('x', B1), Err(MarkError::Unset));
        assert_eq!(store.get_mark('y', B1), Ok((B1, p(0, 0))));
    }

    #[test]
    fn inserted_lines_push_marks_down() {
        let mut buf = Buffer::from_lines(&["a", "b"]);
        let mut store = MarkStore::new();
        store.set_mark('x', B1, p(1, 0)).unwrap();
        store.set_mark('y', B1, p(0, 0)).unwrap();
        // `o` on line 0: a line break at its end.
        edit(&mut store, &mut buf, &ins(0, 1, "\nnew"));
        assert_eq!(store.get_mark('x', B1), Ok((B1, p(2, 0))));
        assert_eq!(store.get_mark('y', B1), Ok((B1, p(0, 0))));
    }

    #[test]
    fn lines_pasted_above_push_the_mark_line() {
        let mut buf = Buffer::from_lines(&["abc"]);
        let mut store = MarkStore::new();
        store.set_mark('x', B1, p(0, 2)).unwrap();
        edit(&mut store, &mut buf, &ins(0, 0, "one\ntwo\n"));
        assert_eq!(store.get_mark('x', B1), Ok((B1, p(2, 2))));
    }

    #[test]
    fn joining_lines_moves_marks_onto_the_joined_line() {
        let mut buf = Buffer::from_lines(&["ab", "cd", "ef"]);
        let mut store = MarkStore::new();
        store.set_mark('x', B1, p(1, 1)).unwrap();
        store.set_mark('z', B1, p(2, 0)).unwrap();
        edit(&mut store, &mut buf, &del(0, 2, "\n"));
        assert_eq!(buf.lines(), vec!["abcd", "ef"]);
        assert_eq!(store.get_mark('x', B1), Ok((B1, p(0, 3))));
        assert_eq!(store.get_mark('z', B1), Ok((B1, p(1, 0))));
    }

    #[test]
    fn global_marks_follow_their_buffer_only() {
        let mut buf = Buffer::from_lines(&["a", "b"]);
        let mut store = MarkStore::new();
        store.set_mark('A', B1, p(1, 0)).unwrap();
        store.set_mark('B', B2, p(1, 0)).unwrap();
        edit(&mut store, &mut buf, &ins(0, 0, "new\n"));
        assert_eq!(store.get_mark('A', B2), Ok((B1, p(2, 0))));
        assert_eq!(store.get_mark('B', B1), Ok((B2, p(1, 0))));
    }

    #[test]
    fn same_line_edits_leave_marks() {
        let mut buf = Buffer::from_lines(&["hello"]);
        let mut store = MarkStore::new();
        store.set_mark('x', B1, p(0, 4)).unwrap();
        edit(&mut store, &mut buf, &del(0, 0, "he"));
        assert_eq!(store.get_mark('x', B1), Ok((B1, p(0, 4))));
    }
}
