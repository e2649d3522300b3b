//! Text buffer — the fundamental unit of text storage.
//!
//! A `Buffer` wraps a [`ropey::Rope`] holding the buffer's lines joined by
//! `\n`, with **no** trailing terminator: `["abc", "def"]` is stored as
//! `"abc\ndef"`. That makes the line model exact:
//!
//! - `line_count()` is always ≥ 1 (an empty buffer is one empty line);
//! - a line's length never includes a line ending;
//! - inserting `"\n"` splits a line, deleting it joins two.
//!
//! Files are normalised on load (CRLF and lone CR become LF, one trailing
//! newline is dropped) and the detected [`LineEnding`] is restored on save.
//! Columns are char offsets, never bytes.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::fs;
use std::hash::Hasher;
use std::io;
use std::path::{Path, PathBuf};

use ropey::Rope;

use crate::position::{Position, Range};

// ---------------------------------------------------------------------------
// Line ending detection
// ---------------------------------------------------------------------------

/// Line ending style of a file, detected from its first line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Detect the style of the first line break in `text`. Text without any
    /// line break is `Lf`.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let bytes = text.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'\n' => return Self::Lf,
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => return Self::CrLf,
                b'\r' => return Self::Cr,
                _ => {}
            }
        }
        Self::Lf
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lf => "LF",
            Self::CrLf => "CRLF",
            Self::Cr => "CR",
        })
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// A text buffer backed by a rope.
///
/// Every open file (or scratch buffer) gets its own `Buffer`. Editing goes
/// through [`insert`](Self::insert) and [`delete`](Self::delete); both take
/// positions the caller already validated, and panic otherwise. The editor
/// resolves and clamps every position before it mutates, so an out-of-range
/// edit is a bug, not a user error.
pub struct Buffer {
    rope: Rope,
    path: Option<PathBuf>,
    modified: bool,
    line_ending: LineEnding,
}

impl Buffer {
    // -- Construction -------------------------------------------------------

    /// An empty buffer: one empty line, no path.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            path: None,
            modified: false,
            line_ending: LineEnding::Lf,
        }
    }

    /// Build a buffer from text. Line endings are normalised and a single
    /// trailing newline is treated as the last line's terminator.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let line_ending = LineEnding::detect(text);
        let mut normalized = normalize_line_endings(text);
        if normalized.ends_with('\n') {
            normalized.pop();
        }
        Self {
            rope: Rope::from_str(&normalized),
            path: None,
            modified: false,
            line_ending,
        }
    }

    /// Build a buffer with exactly these lines.
    #[must_use]
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let joined = lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            rope: Rope::from_str(&joined),
            path: None,
            modified: false,
            line_ending: LineEnding::Lf,
        }
    }

    /// Load a buffer from a file. A missing file yields an empty buffer that
    /// will be created on first save.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read as UTF-8.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let mut buf = match fs::read_to_string(path) {
            Ok(text) => Self::from_text(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::new(),
            Err(e) => return Err(e),
        };
        buf.path = Some(path.to_path_buf());
        Ok(buf)
    }

    // -- Text access --------------------------------------------------------

    /// The underlying rope, for scanning code that walks char indices.
    #[inline]
    #[must_use]
    pub const fn rope(&self) -> &Rope {
        &self.rope
    }

    /// Number of lines. Never zero.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Index of the last line.
    #[inline]
    #[must_use]
    pub fn last_line(&self) -> usize {
        self.line_count() - 1
    }

    #[inline]
    #[must_use]
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// True when the buffer is a single empty line.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Number of chars on `line`, excluding the line break. Lines past the
    /// end report 0.
    #[must_use]
    pub fn line_len(&self, line: usize) -> usize {
        if line >= self.line_count() {
            return 0;
        }
        let slice = self.rope.line(line);
        let total = slice.len_chars();
        if line < self.last_line() { total - 1 } else { total }
    }

    /// The text of `line` without its line break. Lines past the end are empty.
    #[must_use]
    pub fn line_text(&self, line: usize) -> String {
        if line >= self.line_count() {
            return String::new();
        }
        let mut text = self.rope.line(line).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        text
    }

    /// All lines, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        (0..self.line_count()).map(|l| self.line_text(l)).collect()
    }

    /// The whole buffer as one string (lines joined by `\n`).
    #[must_use]
    pub fn contents(&self) -> String {
        self.rope.to_string()
    }

    /// The character at `pos`, or `None` past the end of the line.
    #[must_use]
    pub fn char_at(&self, pos: Position) -> Option<char> {
        if pos.col >= self.line_len(pos.line) {
            return None;
        }
        self.pos_to_char_idx(pos).map(|idx| self.rope.char(idx))
    }

    /// The text covered by `range`, or `None` if either end is invalid.
    #[must_use]
    pub fn slice(&self, range: Range) -> Option<String> {
        let start = self.pos_to_char_idx(range.start)?;
        let end = self.pos_to_char_idx(range.end)?;
        Some(self.rope.slice(start..end).to_string())
    }

    /// Column of the first non-blank char on `line` (the `^` motion target).
    /// A blank line reports its length.
    #[must_use]
    pub fn first_non_blank(&self, line: usize) -> usize {
        self.line_text(line)
            .chars()
            .position(|c| c != ' ' && c != '\t')
            .unwrap_or_else(|| self.line_len(line))
    }

    /// Position one past the last char of the buffer.
    #[must_use]
    pub fn end_position(&self) -> Position {
        let last = self.last_line();
        Position::new(last, self.line_len(last))
    }

    /// Content fingerprint used to check that persisted history still
    /// belongs to the text on disk.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut h = DefaultHasher::new();
        for chunk in self.rope.chunks() {
            h.write(chunk.as_bytes());
        }
        h.finish()
    }

    // -- Coordinate conversion ----------------------------------------------

    /// Absolute char index of `pos`. Column `line_len` (just past the last
    /// char) is valid; anything beyond is not.
    #[must_use]
    pub fn pos_to_char_idx(&self, pos: Position) -> Option<usize> {
        if pos.line >= self.line_count() || pos.col > self.line_len(pos.line) {
            return None;
        }
        Some(self.rope.line_to_char(pos.line) + pos.col)
    }

    #[must_use]
    pub fn char_idx_to_pos(&self, char_idx: usize) -> Option<Position> {
        if char_idx > self.rope.len_chars() {
            return None;
        }
        let line = self.rope.char_to_line(char_idx);
        Some(Position::new(line, char_idx - self.rope.line_to_char(line)))
    }

    /// Clamp to a normal-mode cursor position: an existing line, and a
    /// column on a character (column 0 on an empty line).
    #[must_use]
    pub fn clamp_position(&self, pos: Position) -> Position {
        let line = pos.line.min(self.last_line());
        let max_col = self.line_len(line).saturating_sub(1);
        Position::new(line, pos.col.min(max_col))
    }

    /// Clamp to an insert-mode position, where the column may sit just past
    /// the last char.
    #[must_use]
    pub fn clamp_insert(&self, pos: Position) -> Position {
        let line = pos.line.min(self.last_line());
        Position::new(line, pos.col.min(self.line_len(line)))
    }

    // -- Editing ------------------------------------------------------------

    /// Insert text at `pos` and return the position just after it.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is not a valid position in the buffer.
    pub fn insert(&mut self, pos: Position, text: &str) -> Position {
        let idx = self
            .pos_to_char_idx(pos)
            .expect("insert position out of bounds");
        self.rope.insert(idx, text);
        self.modified = true;
        end_after_insert(pos, text)
    }

    /// Delete the text in `range` and return it.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint is not a valid position.
    pub fn delete(&mut self, range: Range) -> String {
        if range.is_empty() {
            return String::new();
        }
        let start = self
            .pos_to_char_idx(range.start)
            .expect("delete range start out of bounds");
        let end = self
            .pos_to_char_idx(range.end)
            .expect("delete range end out of bounds");
        let removed = self.rope.slice(start..end).to_string();
        self.rope.remove(start..end);
        self.modified = true;
        removed
    }

    // -- Metadata -----------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    /// True if the buffer changed since it was loaded or saved.
    #[inline]
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    #[inline]
    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    // -- File I/O -----------------------------------------------------------

    /// Save to the buffer's path.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is set or the write fails.
    pub fn save(&mut self) -> io::Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "buffer has no file path"))?;
        self.save_as(&path)
    }

    /// Save to `path`, which becomes the buffer's path. Every line, the last
    /// included, is terminated with the buffer's line ending.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_as(&mut self, path: &Path) -> io::Result<()> {
        let ending = self.line_ending.as_str();
        let mut content = self.lines().join(ending);
        content.push_str(ending);
        fs::write(path, content)?;
        self.path = Some(path.to_path_buf());
        self.modified = false;
        tracing::debug!(target: "editor.buffer", path = %path.display(), lines = self.line_count(), "saved");
        Ok(())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lines", &self.line_count())
            .field("path", &self.path)
            .field("modified", &self.modified)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The position just past `text` once it has been inserted at `start`.
#[must_use]
pub fn end_after_insert(start: Position, text: &str) -> Position {
    let newlines = text.matches('\n').count();
    if newlines == 0 {
        Position::new(start.line, start.col + text.chars().count())
    } else {
        let tail = text.rsplit('\n').next().unwrap_or("");
        Position::new(start.line + newlines, tail.chars().count())
    }
}

/// Convert `\r\n` and lone `\r` to `\n`.
fn normalize_line_endings(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            result.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
        } else {
            result.push(ch);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
