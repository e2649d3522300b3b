//! Text objects — spans selected by structure rather than by motion.
//!
//! Combined with an operator they form the `operator + object` grammar:
//!
//! ```text
//! d + iw  = delete inner word
//! c + i"  = change inside quotes
//! y + 2a( = yank around the second enclosing parentheses
//! ```
//!
//! | Inner    | Around   | Object                          |
//! |----------|----------|---------------------------------|
//! | `iw`     | `aw`     | word (letters, digits, `_`)     |
//! | `iW`     | `aW`     | WORD (non-blank characters)     |
//! | `i"` `i'` `` i` `` | `a"` `a'` `` a` `` | quoted string on the cursor line |
//! | `i(` `ib`| `a(` `ab`| parenthesised block             |
//! | `i[`     | `a[`     | square-bracketed block          |
//! | `i{` `iB`| `a{` `aB`| curly-braced block              |
//! | `i<`     | `a<`     | angle-bracketed block           |
//! | `ip`     | `ap`     | paragraph (line-wise)           |
//! | `is`     | `as`     | sentence                        |
//!
//! Every resolver returns a half-open [`Range`] or `None` when there is no
//! such object around the cursor; [`TextObject::resolve`] turns `None` into
//! [`EditError::NoEnclosingObject`].

use crate::buffer::Buffer;
use crate::error::{EditError, EditResult};
use crate::position::{Position, Range};
use crate::word::{classify, CharClass, WordKind};

/// `i` or `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Inner,
    Around,
}

/// What the object is delimited by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Word(WordKind),
    Quote(char),
    Bracket { open: char, close: char },
    Paragraph,
    Sentence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextObject {
    pub scope: Scope,
    pub kind: ObjectKind,
}

/// A resolved object. Line-wise spans cover whole lines
/// `range.start.line..=range.end.line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpan {
    pub range: Range,
    pub linewise: bool,
}

impl TextObject {
    /// Parse the `i`/`a` prefix and the object key.
    #[must_use]
    pub const fn from_keys(scope: char, key: char) -> Option<Self> {
        let scope = match scope {
            'i' => Scope::Inner,
            'a' => Scope::Around,
            _ => return None,
        };
        let kind = match key {
            'w' => ObjectKind::Word(WordKind::Word),
            'W' => ObjectKind::Word(WordKind::Big),
            '"' | '\'' | '`' => ObjectKind::Quote(key),
            '(' | ')' | 'b' => ObjectKind::Bracket { open: '(', close: ')' },
            '[' | ']' => ObjectKind::Bracket { open: '[', close: ']' },
            '{' | '}' | 'B' => ObjectKind::Bracket { open: '{', close: '}' },
            '<' | '>' => ObjectKind::Bracket { open: '<', close: '>' },
            'p' => ObjectKind::Paragraph,
            's' => ObjectKind::Sentence,
            _ => return None,
        };
        Some(Self { scope, kind })
    }

    /// Resolve the object around `pos`. `count` selects the Nth enclosing
    /// bracket pair, or extends word and paragraph objects.
    pub fn resolve(self, buf: &Buffer, pos: Position, count: usize) -> EditResult<ObjectSpan> {
        let count = count.max(1);
        let inner = self.scope == Scope::Inner;
        let range = match self.kind {
            ObjectKind::Word(kind) => word_object(buf, pos, kind, inner, count),
            ObjectKind::Quote(q) => quote_object(buf, pos, q, inner),
            ObjectKind::Bracket { open, close } => bracket_object(buf, pos, open, close, inner, count),
            ObjectKind::Paragraph => {
                return paragraph_object(buf, pos.line, inner, count)
                    .map(|range| ObjectSpan { range, linewise: true })
                    .ok_or(EditError::NoEnclosingObject);
            }
            ObjectKind::Sentence => sentence_object(buf, pos, inner),
        };
        range
            .map(|range| ObjectSpan { range, linewise: false })
            .ok_or(EditError::NoEnclosingObject)
    }
}

// ---------------------------------------------------------------------------
// Word objects
// ---------------------------------------------------------------------------

/// `iw` / `aw` / `iW` / `aW`, confined to the cursor line.
///
/// Inner selects the run of same-class characters under the cursor (a blank
/// run counts). Around adds the trailing blanks, or the leading blanks when
/// there are none; starting on blanks it adds the following word instead.
#[must_use]
pub fn word_object(
    buf: &Buffer,
    pos: Position,
    kind: WordKind,
    inner: bool,
    count: usize,
) -> Option<Range> {
    let chars: Vec<char> = buf.line_text(pos.line).chars().collect();
    if pos.col >= chars.len() {
        return None;
    }
    let class_at = |i: usize| classify(chars[i], kind);

    let run_start = |mut i: usize| {
        let class = class_at(i);
        while i > 0 && class_at(i - 1) == class {
            i -= 1;
        }
        i
    };
    let run_end = |mut i: usize| {
        let class = class_at(i);
        while i < chars.len() && class_at(i) == class {
            i += 1;
        }
        i
    };

    let start = run_start(pos.col);
    let mut end = pos.col;
    let mut leading = false;
    for n in 0..count {
        if end >= chars.len() {
            if n == 0 {
                return None;
            }
            break;
        }
        let on_blank = class_at(end) == CharClass::Blank;
        end = run_end(end);
        if inner {
            continue;
        }
        if on_blank {
            if end < chars.len() {
                end = run_end(end);
            }
        } else if end < chars.len() && class_at(end) == CharClass::Blank {
            end = run_end(end);
        } else if n == 0 {
            leading = true;
        }
    }

    let mut start = start;
    if leading && start > 0 && class_at(start - 1) == CharClass::Blank {
        start = run_start(start - 1);
    }
    Some(Range::new(pos.with_col(start), pos.with_col(end)))
}

// ---------------------------------------------------------------------------
// Quote objects
// ---------------------------------------------------------------------------

/// `i"` / `a"` and friends. Quotes pair up left to right on the cursor
/// line, skipping backslash-escaped ones. When the cursor is outside every
/// pair the next pair to the right is used.
#[must_use]
pub fn quote_object(buf: &Buffer, pos: Position, quote: char, inner: bool) -> Option<Range> {
    let chars: Vec<char> = buf.line_text(pos.line).chars().collect();
    let (open, close) = find_quote_pair(&chars, pos.col, quote)?;
    if inner {
        return Some(Range::new(pos.with_col(open + 1), pos.with_col(close)));
    }

    let is_blank = |c: char| c == ' ' || c == '\t';
    let mut end = close + 1;
    while end < chars.len() && is_blank(chars[end]) {
        end += 1;
    }
    let mut start = open;
    if end == close + 1 {
        while start > 0 && is_blank(chars[start - 1]) {
            start -= 1;
        }
    }
    Some(Range::new(pos.with_col(start), pos.with_col(end)))
}

fn find_quote_pair(chars: &[char], col: usize, quote: char) -> Option<(usize, usize)> {
    let quotes: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| c == quote && (i == 0 || chars[i - 1] != '\\'))
        .map(|(i, _)| i)
        .collect();

    let pairs = quotes.chunks_exact(2).map(|pair| (pair[0], pair[1]));
    pairs
        .clone()
        .find(|&(open, close)| (open..=close).contains(&col))
        .or_else(|| pairs.clone().find(|&(open, _)| open > col))
}

// ---------------------------------------------------------------------------
// Bracket objects
// ---------------------------------------------------------------------------

/// `i(` / `a(` and friends, nesting-aware and spanning lines.
///
/// Inner excludes the brackets. When the opening bracket ends its line the
/// inner span starts on the next line, and when the closing bracket is the
/// first non-blank of its line the span stops before that line, so
/// `di{` on a block body leaves `{` and `}` on their own lines.
#[must_use]
pub fn bracket_object(
    buf: &Buffer,
    pos: Position,
    open: char,
    close: char,
    inner: bool,
    count: usize,
) -> Option<Range> {
    let (open_idx, close_idx) = enclosing_pair(buf, pos, open, close, count)?;
    let open_pos = buf.char_idx_to_pos(open_idx)?;
    let close_pos = buf.char_idx_to_pos(close_idx)?;
    if !inner {
        return Some(Range::new(open_pos, close_pos.with_col(close_pos.col + 1)));
    }

    let mut start = open_pos.with_col(open_pos.col + 1);
    if start.col == buf.line_len(start.line) && start.line < close_pos.line {
        start = Position::new(start.line + 1, 0);
    }
    let mut end = close_pos;
    if end.line > start.line && buf.first_non_blank(end.line) == end.col {
        end = end.with_col(0);
    }
    Some(Range::new(start, end.max(start)))
}

/// Char indices of the `count`th bracket pair enclosing `pos`. A cursor on
/// a bracket counts as inside that pair.
fn enclosing_pair(
    buf: &Buffer,
    pos: Position,
    open: char,
    close: char,
    count: usize,
) -> Option<(usize, usize)> {
    let rope = buf.rope();
    let idx = buf.pos_to_char_idx(pos)?;
    if idx >= rope.len_chars() {
        return None;
    }

    let mut open_idx = if rope.char(idx) == open {
        idx
    } else {
        scan_open(rope, idx, open, close)?
    };
    for _ in 1..count {
        open_idx = scan_open(rope, open_idx, open, close)?;
    }
    let close_idx = scan_close(rope, open_idx, open, close)?;
    (close_idx >= idx).then_some((open_idx, close_idx))
}

/// Nearest unmatched `open` strictly before `from`.
fn scan_open(rope: &ropey::Rope, from: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..from).rev() {
        let c = rope.char(i);
        if c == close {
            depth += 1;
        } else if c == open {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

/// The `close` matching the `open` at `from`.
fn scan_close(rope: &ropey::Rope, from: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for i in from + 1..rope.len_chars() {
        let c = rope.char(i);
        if c == open {
            depth += 1;
        } else if c == close {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Paragraph objects
// ---------------------------------------------------------------------------

/// `ip` / `ap`, line-wise.
///
/// A paragraph is a run of non-blank lines or a run of blank lines. `ip`
/// selects the run under the cursor (`count` runs). `ap` also takes the
/// blank run that follows, or the one before it at the end of the buffer.
#[must_use]
pub fn paragraph_object(buf: &Buffer, line: usize, inner: bool, count: usize) -> Option<Range> {
    let last = buf.last_line();
    if line > last {
        return None;
    }
    let blank = |l: usize| buf.line_text(l).trim().is_empty();
    let run_end = |l: usize| {
        let b = blank(l);
        let mut end = l;
        while end < last && blank(end + 1) == b {
            end += 1;
        }
        end
    };

    let mut start = line;
    while start > 0 && blank(start - 1) == blank(line) {
        start -= 1;
    }

    let runs = if inner { count } else { count * 2 };
    let mut end = run_end(start);
    let mut taken = 1;
    while taken < runs && end < last {
        end = run_end(end + 1);
        taken += 1;
    }

    if !inner && taken < runs && !blank(line) {
        // Nothing after the paragraph: take the blank run before it.
        while start > 0 && blank(start - 1) {
            start -= 1;
        }
    }
    Some(Range::new(Position::new(start, 0), Position::new(end, buf.line_len(end))))
}

// ---------------------------------------------------------------------------
// Sentence objects
// ---------------------------------------------------------------------------

/// `is` / `as`, within the paragraph around the cursor.
///
/// A sentence ends at `.`, `!` or `?` (optionally followed by closing
/// `)`, `]`, `"` or `'`) that is followed by whitespace or the end of the
/// paragraph. Line breaks inside a paragraph count as whitespace.
#[must_use]
pub fn sentence_object(buf: &Buffer, pos: Position, inner: bool) -> Option<Range> {
    if buf.line_text(pos.line).trim().is_empty() {
        return None;
    }
    let mut first = pos.line;
    while first > 0 && !buf.line_text(first - 1).trim().is_empty() {
        first -= 1;
    }
    let mut last = pos.line;
    while last < buf.last_line() && !buf.line_text(last + 1).trim().is_empty() {
        last += 1;
    }

    let base = buf.pos_to_char_idx(Position::new(first, 0))?;
    let end_idx = buf.pos_to_char_idx(Position::new(last, buf.line_len(last)))?;
    let text: Vec<char> = buf.rope().slice(base..end_idx).chars().collect();
    let cursor = buf.pos_to_char_idx(pos)?.checked_sub(base)?;

    let spans = sentence_spans(&text);
    let at = |off: usize| buf.char_idx_to_pos(base + off);

    // Each span is (start, end, next_start): the sentence text followed by
    // the whitespace gap up to the next sentence.
    for (i, &(start, end, next)) in spans.iter().enumerate() {
        if cursor < start || cursor >= next.max(end) {
            continue;
        }
        if cursor >= end {
            // On the gap between two sentences.
            let stop = if inner {
                next
            } else {
                spans.get(i + 1).map_or(next, |&(_, e, _)| e)
            };
            return Some(Range::new(at(end)?, at(stop)?));
        }
        if inner {
            return Some(Range::new(at(start)?, at(end)?));
        }
        if next > end {
            return Some(Range::new(at(start)?, at(next)?));
        }
        let lead = i.checked_sub(1).map_or(start, |j| spans[j].1);
        return Some(Range::new(at(lead)?, at(end)?));
    }
    None
}

fn sentence_spans(text: &[char]) -> Vec<(usize, usize, usize)> {
    let n = text.len();
    let skip_ws = |mut i: usize| {
        while i < n && text[i].is_whitespace() {
            i += 1;
        }
        i
    };

    let mut spans = Vec::new();
    let mut start = skip_ws(0);
    let mut i = start;
    while i < n {
        if matches!(text[i], '.' | '!' | '?') {
            let mut j = i + 1;
            while j < n && matches!(text[j], ')' | ']' | '"' | '\'') {
                j += 1;
            }
            if j == n || text[j].is_whitespace() {
                let next = skip_ws(j);
                spans.push((start, j, next));
                start = next;
                i = next;
                continue;
            }
        }
        i += 1;
    }
    if start < n {
        let mut end = n;
        while end > start && text[end - 1].is_whitespace() {
            end -= 1;
        }
        spans.push((start, end, n));
    }
    spans
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

    fn r(sl: usize, sc: usize, el: usize, ec: usize) -> Range {
        Range::new(p(sl, sc), p(el, ec))
    }

    fn obj(keys: &str, text: &str, pos: Position) -> EditResult<ObjectSpan> {
        let mut k = keys.chars();
        let (Some(scope), Some(key)) = (k.next(), k.next()) else {
            panic!("bad object keys {keys}");
        };
        TextObject::from_keys(scope, key)
            .expect("known object")
            .resolve(&Buffer::from_text(text), pos, 1)
    }

    fn range(keys: &str, text: &str, pos: Position) -> Option<Range> {
        obj(keys, text, pos).ok().map(|s| s.range)
    }

    // -- Parsing ------------------------------------------------------------

    #[test]
    fn from_keys_aliases() {
        let b = TextObject::from_keys('i', 'b').expect("ib");
        assert_eq!(b.kind, ObjectKind::Bracket { open: '(', close: ')' });
        let big = TextObject::from_keys('a', 'B').expect("aB");
        assert_eq!(big.kind, ObjectKind::Bracket { open: '{', close: '}' });
        assert_eq!(big.scope, Scope::Around);
        assert!(TextObject::from_keys('i', 'z').is_none());
        assert!(TextObject::from_keys('x', 'w').is_none());
    }

    // -- Words --------------------------------------------------------------

    #[test]
    fn iw_selects_run_under_cursor() {
        assert_eq!(range("iw", "hello world", p(0, 2)), Some(r(0, 0, 0, 5)));
        assert_eq!(range("iw", "hello world", p(0, 6)), Some(r(0, 6, 0, 11)));
        assert_eq!(range("iw", "foo.bar", p(0, 3)), Some(r(0, 3, 0, 4)));
        assert_eq!(range("iw", "a   b", p(0, 2)), Some(r(0, 1, 0, 4)));
    }

    #[test]
    fn aw_takes_trailing_then_leading_blanks() {
        assert_eq!(range("aw", "hello world", p(0, 2)), Some(r(0, 0, 0, 6)));
        assert_eq!(range("aw", "hello world", p(0, 7)), Some(r(0, 5, 0, 11)));
        assert_eq!(range("aw", "a   bc d", p(0, 2)), Some(r(0, 1, 0, 6)));
    }

    #[test]
    fn big_word_spans_punctuation() {
        assert_eq!(range("iW", "foo.bar baz", p(0, 1)), Some(r(0, 0, 0, 7)));
        assert_eq!(range("aW", "foo.bar baz", p(0, 1)), Some(r(0, 0, 0, 8)));
    }

    #[test]
    fn word_count_extends() {
        let buf = Buffer::from_text("one two three");
        let iw = word_object(&buf, p(0, 0), WordKind::Word, true, 3);
        assert_eq!(iw, Some(r(0, 0, 0, 7)));
        let aw = word_object(&buf, p(0, 0), WordKind::Word, false, 2);
        assert_eq!(aw, Some(r(0, 0, 0, 8)));
    }

    #[test]
    fn word_on_empty_line_fails() {
        assert_eq!(obj("iw", "a\n\nb", p(1, 0)), Err(EditError::NoEnclosingObject));
    }

    // -- Quotes -------------------------------------------------------------

    #[test]
    fn quotes_inner_and_around() {
        let text = r#"say "hello" now"#;
        assert_eq!(range("i\"", text, p(0, 6)), Some(r(0, 5, 0, 10)));
        assert_eq!(range("a\"", text, p(0, 6)), Some(r(0, 4, 0, 12)));
        assert_eq!(range("i\"", text, p(0, 1)), Some(r(0, 5, 0, 10)));
    }

    #[test]
    fn quotes_pair_left_to_right_and_skip_escapes() {
        let text = r#""a" x "b""#;
        assert_eq!(range("i\"", text, p(0, 4)), Some(r(0, 7, 0, 8)));
        let escaped = r#"x = "a\"b";"#;
        assert_eq!(range("i\"", escaped, p(0, 5)), Some(r(0, 5, 0, 9)));
        assert_eq!(range("i'", "no quotes", p(0, 0)), None);
    }

    #[test]
    fn around_quote_at_line_end_takes_leading_blanks() {
        assert_eq!(range("a'", "x 'y'", p(0, 3)), Some(r(0, 1, 0, 5)));
    }

    // -- Brackets -----------------------------------------------------------

    #[test]
    fn brackets_nest() {
        let text = "f(a, (b), c)";
        assert_eq!(range("i(", text, p(0, 2)), Some(r(0, 2, 0, 11)));
        assert_eq!(range("i(", text, p(0, 6)), Some(r(0, 6, 0, 7)));
        assert_eq!(range("a(", text, p(0, 6)), Some(r(0, 5, 0, 8)));
        assert_eq!(range("ib", text, p(0, 1)), Some(r(0, 2, 0, 11)));
        assert_eq!(range("i(", text, p(0, 11)), Some(r(0, 2, 0, 11)));
    }

    #[test]
    fn bracket_count_selects_outer_pair() {
        let buf = Buffer::from_text("f(a, (b), c)");
        let outer = bracket_object(&buf, p(0, 6), '(', ')', true, 2);
        assert_eq!(outer, Some(r(0, 2, 0, 11)));
        assert_eq!(bracket_object(&buf, p(0, 6), '(', ')', true, 3), None);
    }

    #[test]
    fn inner_block_keeps_brace_lines() {
        let text = "fn main() {\n    body\n}";
        assert_eq!(range("i{", text, p(1, 4)), Some(r(1, 0, 2, 0)));
        assert_eq!(range("a{", text, p(1, 4)), Some(r(0, 10, 2, 1)));
    }

    #[test]
    fn empty_brackets_give_empty_inner() {
        assert_eq!(range("i[", "x[]", p(0, 1)), Some(Range::point(p(0, 2))));
    }

    #[test]
    fn no_enclosing_bracket() {
        assert_eq!(obj("i(", "(a) b", p(0, 4)), Err(EditError::NoEnclosingObject));
        assert_eq!(obj("i<", "a < b", p(0, 4)), Err(EditError::NoEnclosingObject));
    }

    // -- Paragraphs ---------------------------------------------------------

    #[test]
    fn paragraph_inner_and_around() {
        let text = "a\nb\n\n\nc\nd";
        let ip = obj("ip", text, p(1, 0)).expect("ip");
        assert!(ip.linewise);
        assert_eq!(ip.range, r(0, 0, 1, 1));
        assert_eq!(range("ap", text, p(0, 0)), Some(r(0, 0, 3, 0)));
        assert_eq!(range("ip", text, p(2, 0)), Some(r(2, 0, 3, 0)));
    }

    #[test]
    fn around_last_paragraph_takes_preceding_blanks() {
        let text = "a\n\nc\nd";
        assert_eq!(range("ap", text, p(3, 0)), Some(r(1, 0, 3, 1)));
    }

    // -- Sentences ----------------------------------------------------------

    #[test]
    fn sentences_inner_and_around() {
        let text = "One two. Three four! Five";
        assert_eq!(range("is", text, p(0, 10)), Some(r(0, 9, 0, 20)));
        assert_eq!(range("as", text, p(0, 10)), Some(r(0, 9, 0, 21)));
        assert_eq!(range("is", text, p(0, 0)), Some(r(0, 0, 0, 8)));
        assert_eq!(range("as", text, p(0, 22)), Some(r(0, 20, 0, 25)));
    }

    #[test]
    fn sentences_cross_line_breaks_within_paragraph() {
        let text = "First line\ncontinues. Next.";
        assert_eq!(range("is", text, p(0, 3)), Some(r(0, 0, 1, 10)));
        assert_eq!(obj("is", "a.\n\nb.", p(1, 0)), Err(EditError::NoEnclosingObject));
    }
}
