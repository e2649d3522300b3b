//! Word motions — word and WORD navigation.
//!
//! | Function | Key | Target |
//! |----------|-----|--------|
//! | [`next_start`] | `w` / `W` | start of the next word |
//! | [`prev_start`] | `b` / `B` | start of the previous word |
//! | [`next_end`] | `e` / `E` | end of the current or next word |
//!
//! A **word** is a run of keyword characters (letters, digits, underscore)
//! or a run of other non-blank characters: `hello.world` is three words.
//! A **WORD** is a run of non-blank characters: `hello.world` is one WORD.
//! An empty line counts as a word for `w` and `b`.
//!
//! When there is no further word, `w` and `e` land at the end of the buffer
//! and `b` at its start. Callers compare the result with the starting
//! position to detect a motion that could not move.

use crate::buffer::Buffer;
use crate::position::Position;

// ---------------------------------------------------------------------------
// Character classification
// ---------------------------------------------------------------------------

/// Small word or big WORD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Word,
    Big,
}

/// Character class for word boundary detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CharClass {
    Word,
    Punctuation,
    Blank,
    Newline,
}

/// True for letters, digits and underscore.
#[inline]
#[must_use]
pub fn is_keyword(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

pub(crate) fn classify(ch: char, kind: WordKind) -> CharClass {
    if ch == '\n' {
        CharClass::Newline
    } else if ch.is_whitespace() {
        CharClass::Blank
    } else if kind == WordKind::Big || is_keyword(ch) {
        CharClass::Word
    } else {
        CharClass::Punctuation
    }
}

const fn is_text(class: CharClass) -> bool {
    matches!(class, CharClass::Word | CharClass::Punctuation)
}

// ---------------------------------------------------------------------------
// Motions
// ---------------------------------------------------------------------------

/// `w` / `W`: forward to the start of the next word.
#[must_use]
pub fn next_start(buf: &Buffer, pos: Position, kind: WordKind) -> Position {
    let rope = buf.rope();
    let total = rope.len_chars();
    let Some(mut idx) = buf.pos_to_char_idx(pos) else {
        return pos;
    };
    if idx >= total {
        return pos;
    }

    // Skip the current token.
    let start_class = classify(rope.char(idx), kind);
    if is_text(start_class) {
        while idx < total && classify(rope.char(idx), kind) == start_class {
            idx += 1;
        }
    }

    // Skip blanks and line breaks, stopping on an empty line.
    while idx < total {
        match classify(rope.char(idx), kind) {
            CharClass::Word | CharClass::Punctuation => break,
            CharClass::Blank => idx += 1,
            CharClass::Newline => {
                idx += 1;
                if idx == total || rope.char(idx) == '\n' {
                    break;
                }
            }
        }
    }

    buf.char_idx_to_pos(idx.min(total)).unwrap_or(pos)
}

/// `b` / `B`: backward to the start of the previous word.
#[must_use]
pub fn prev_start(buf: &Buffer, pos: Position, kind: WordKind) -> Position {
    let rope = buf.rope();
    let Some(start_idx) = buf.pos_to_char_idx(pos) else {
        return pos;
    };
    if start_idx == 0 {
        return pos;
    }

    let mut idx = start_idx - 1;
    loop {
        match classify(rope.char(idx), kind) {
            CharClass::Word | CharClass::Punctuation => break,
            CharClass::Newline => {
                let line = rope.char_to_line(idx);
                if buf.line_len(line) == 0 && Position::new(line, 0) < pos {
                    return Position::new(line, 0);
                }
                if idx == 0 {
                    return Position::ZERO;
                }
                idx -= 1;
            }
            CharClass::Blank => {
                if idx == 0 {
                    return Position::ZERO;
                }
                idx -= 1;
            }
        }
    }

    let class = classify(rope.char(idx), kind);
    while idx > 0 && classify(rope.char(idx - 1), kind) == class {
        idx -= 1;
    }
    buf.char_idx_to_pos(idx).unwrap_or(pos)
}

/// `e` / `E`: forward to the last char of the current or next word.
#[must_use]
pub fn next_end(buf: &Buffer, pos: Position, kind: WordKind) -> Position {
    let rope = buf.rope();
    let total = rope.len_chars();
    let Some(start_idx) = buf.pos_to_char_idx(pos) else {
        return pos;
    };
    if total == 0 || start_idx + 1 >= total {
        return pos;
    }

    let mut idx = start_idx + 1;
    while idx < total && !is_text(classify(rope.char(idx), kind)) {
        idx += 1;
    }
    if idx >= total {
        return buf.end_position();
    }

    let class = classify(rope.char(idx), kind);
    while idx + 1 < total && classify(rope.char(idx + 1), kind) == class {
        idx += 1;
    }
    buf.char_idx_to_pos(idx).unwrap_or(pos)
}

/// The word under or after `pos` on its line, as `(start_col, end_col)`
/// (end exclusive). Used by `*` and `#`.
#[must_use]
pub fn word_at(buf: &Buffer, pos: Position) -> Option<(usize, usize)> {
    let chars: Vec<char> = buf.line_text(pos.line).chars().collect();
    let mut start = chars
        .iter()
        .skip(pos.col)
        .position(|&c| is_keyword(c))
        .map(|off| pos.col + off)?;
    while start > 0 && is_keyword(chars[start - 1]) {
        start -= 1;
    }
    let mut end = start;
    while end < chars.len() && is_keyword(chars[end]) {
        end += 1;
    }
    Some((start, end))
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

    fn w(lines: &[&str], pos: Position) -> Position {
        next_start(&Buffer::from_lines(lines), pos, WordKind::Word)
    }

    fn b(lines: &[&str], pos: Position) -> Position {
        prev_start(&Buffer::from_lines(lines), pos, WordKind::Word)
    }

    fn e(lines: &[&str], pos: Position) -> Position {
        next_end(&Buffer::from_lines(lines), pos, WordKind::Word)
    }

    // -- Classification -----------------------------------------------------

    #[test]
    fn classes() {
        assert_eq!(classify('a', WordKind::Word), CharClass::Word);
        assert_eq!(classify('_', WordKind::Word), CharClass::Word);
        assert_eq!(classify('é', WordKind::Word), CharClass::Word);
        assert_eq!(classify('.', WordKind::Word), CharClass::Punctuation);
        assert_eq!(classify('.', WordKind::Big), CharClass::Word);
        assert_eq!(classify('\t', WordKind::Big), CharClass::Blank);
        assert_eq!(classify('\n', WordKind::Word), CharClass::Newline);
    }

    // -- w ------------------------------------------------------------------

    #[test]
    fn w_basic() {
        assert_eq!(w(&["hello world"], p(0, 0)), p(0, 6));
        assert_eq!(w(&["hello world"], p(0, 2)), p(0, 6));
        assert_eq!(w(&["a   b"], p(0, 0)), p(0, 4));
    }

    #[test]
    fn w_punctuation_is_its_own_word() {
        assert_eq!(w(&["hello.world"], p(0, 0)), p(0, 5));
        assert_eq!(w(&["hello.world"], p(0, 5)), p(0, 6));
        let buf = Buffer::from_lines(&["hello.world x"]);
        assert_eq!(next_start(&buf, p(0, 0), WordKind::Big), p(0, 12));
    }

    #[test]
    fn w_crosses_lines_and_stops_on_empty_line() {
        assert_eq!(w(&["hello", "world"], p(0, 0)), p(1, 0));
        assert_eq!(w(&["hello", "", "world"], p(0, 0)), p(1, 0));
        assert_eq!(w(&["hello", "", "world"], p(1, 0)), p(2, 0));
        assert_eq!(w(&["hello", "   ", "world"], p(0, 0)), p(2, 0));
    }

    #[test]
    fn w_on_last_word_goes_to_buffer_end() {
        assert_eq!(w(&["one two"], p(0, 4)), p(0, 7));
        assert_eq!(w(&[""], p(0, 0)), p(0, 0));
    }

    // -- b ------------------------------------------------------------------

    #[test]
    fn b_basic() {
        assert_eq!(b(&["hello world"], p(0, 6)), p(0, 0));
        assert_eq!(b(&["hello world"], p(0, 8)), p(0, 6));
        assert_eq!(b(&["hello.world"], p(0, 6)), p(0, 5));
    }

    #[test]
    fn b_crosses_lines_and_stops_on_empty_line() {
        assert_eq!(b(&["hello", "world"], p(1, 0)), p(0, 0));
        assert_eq!(b(&["hello", "", "world"], p(2, 0)), p(1, 0));
        assert_eq!(b(&["hello", "", "world"], p(1, 0)), p(0, 0));
    }

    #[test]
    fn b_at_start_stays() {
        assert_eq!(b(&["hello"], p(0, 0)), p(0, 0));
        assert_eq!(b(&["   x"], p(0, 3)), p(0, 0));
    }

    // -- e ------------------------------------------------------------------

    #[test]
    fn e_basic() {
        assert_eq!(e(&["hello world"], p(0, 0)), p(0, 4));
        assert_eq!(e(&["hello world"], p(0, 4)), p(0, 10));
        assert_eq!(e(&["ab", "cd"], p(0, 1)), p(1, 1));
    }

    #[test]
    fn e_big_spans_punctuation() {
        let buf = Buffer::from_lines(&["foo.bar baz"]);
        assert_eq!(next_end(&buf, p(0, 0), WordKind::Big), p(0, 6));
        assert_eq!(next_end(&buf, p(0, 0), WordKind::Word), p(0, 2));
    }

    #[test]
    fn e_at_last_char_stays() {
        assert_eq!(e(&["abc"], p(0, 2)), p(0, 2));
    }

    // -- word_at ------------------------------------------------------------

    #[test]
    fn word_at_cursor_or_after() {
        let buf = Buffer::from_lines(&["let foo_bar = 1;"]);
        assert_eq!(word_at(&buf, p(0, 6)), Some((4, 11)));
        assert_eq!(word_at(&buf, p(0, 3)), Some((4, 11)));
        assert_eq!(word_at(&buf, p(0, 15)), None);
    }
}
