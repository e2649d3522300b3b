//! Search — regex search over a buffer.
//!
//! Provides forward (`/`, `n`) and backward (`?`, `N`) search, whole-word
//! search for `*` and `#`, and [`find_all`](SearchEngine::find_all) for
//! collaborators that paint matches.
//!
//! Patterns use `regex` syntax, applied one line at a time. Vim's `\<` and
//! `\>` word boundaries are part of that syntax. With `magic` off the
//! pattern is matched literally.
//!
//! # Match semantics
//!
//! | Direction | First candidate |
//! |-----------|-----------------|
//! | forward   | first match starting after `from` |
//! | backward  | last match starting before `from` |
//!
//! With `wrap` on, the search continues from the other end of the buffer
//! and may come back to a match at `from` itself.

use regex::{Regex, RegexBuilder};

use crate::buffer::Buffer;
use crate::error::{EditError, EditResult};
use crate::position::{Position, Range};
use crate::word;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Search direction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

impl SearchDirection {
    /// The opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Case sensitivity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CaseMode {
    #[default]
    Sensitive,
    Insensitive,
    /// Insensitive unless the pattern contains an uppercase letter.
    Smart,
}

impl CaseMode {
    fn ignores_case(self, pattern: &str) -> bool {
        match self {
            Self::Sensitive => false,
            Self::Insensitive => true,
            Self::Smart => !pattern.chars().any(char::is_uppercase),
        }
    }
}

/// The options a search runs under.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SearchConfig {
    pub case: CaseMode,
    pub wrap: bool,
    /// Off: the pattern is a literal string.
    pub magic: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case: CaseMode::Sensitive,
            wrap: true,
            magic: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A search match. `groups[0]` is the whole match; later entries are the
/// capture groups, `None` where a group did not participate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub start: Position,
    pub end: Position,
    pub groups: Vec<Option<Range>>,
}

impl Match {
    #[must_use]
    pub const fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }

    /// Span of capture group `i`.
    #[must_use]
    pub fn group(&self, i: usize) -> Option<Range> {
        self.groups.get(i).copied().flatten()
    }
}

// ---------------------------------------------------------------------------
// SearchEngine
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
struct CacheKey {
    pattern: String,
    ignore_case: bool,
    magic: bool,
}

/// Compiles and runs patterns, remembering the last one for `n` and `N`.
#[derive(Default)]
pub struct SearchEngine {
    last: Option<(String, SearchDirection)>,
    cache: Option<(CacheKey, Regex)>,
}

impl SearchEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last searched pattern and its direction.
    #[must_use]
    pub fn last(&self) -> Option<(&str, SearchDirection)> {
        self.last.as_ref().map(|(p, d)| (p.as_str(), *d))
    }

    /// Remember `pattern` for `n`/`N`. Called once a search has been
    /// accepted, whether or not it matched.
    pub fn remember(&mut self, pattern: &str, direction: SearchDirection) {
        self.last = Some((pattern.to_owned(), direction));
    }

    /// Validate and compile `pattern` without searching.
    pub fn compile(&mut self, pattern: &str, config: SearchConfig) -> EditResult<&Regex> {
        let key = CacheKey {
            pattern: pattern.to_owned(),
            ignore_case: config.case.ignores_case(pattern),
            magic: config.magic,
        };
        let re = match self.cache.take() {
            Some((k, re)) if k == key => re,
            _ => {
                let source = if key.magic {
                    pattern.to_owned()
                } else {
                    regex::escape(pattern)
                };
                let re = RegexBuilder::new(&source)
                    .case_insensitive(key.ignore_case)
                    .build()
                    .map_err(|e| EditError::InvalidPattern(e.to_string()))?;
                tracing::trace!(target: "editor.search", pattern, ignore_case = key.ignore_case, "compiled");
                re
            }
        };
        Ok(&self.cache.insert((key, re)).1)
    }

    /// Find the `occurrence`th match of `pattern` from `from`.
    ///
    /// # Errors
    ///
    /// `InvalidPattern` if the pattern does not compile, `NoMatch` if there
    /// are fewer than `occurrence` matches in reach.
    pub fn find(
        &mut self,
        buf: &Buffer,
        pattern: &str,
        from: Position,
        direction: SearchDirection,
        occurrence: usize,
        config: SearchConfig,
    ) -> EditResult<Match> {
        if pattern.is_empty() {
            return Err(EditError::NoPreviousPattern);
        }
        let re = self.compile(pattern, config)?;
        let mut at = from;
        let mut found = None;
        for _ in 0..occurrence.max(1) {
            let m = match direction {
                SearchDirection::Forward => find_forward(re, buf, at, config.wrap),
                SearchDirection::Backward => find_backward(re, buf, at, config.wrap),
            }
            .ok_or_else(|| EditError::NoMatch(pattern.to_owned()))?;
            at = m.start;
            found = Some(m);
        }
        found.ok_or_else(|| EditError::NoMatch(pattern.to_owned()))
    }

    /// Repeat the last search (`n`), or reverse it (`N`).
    pub fn find_next(
        &mut self,
        buf: &Buffer,
        from: Position,
        reverse: bool,
        count: usize,
        config: SearchConfig,
    ) -> EditResult<Match> {
        let (pattern, direction) = self.last.clone().ok_or(EditError::NoPreviousPattern)?;
        let direction = if reverse { direction.opposite() } else { direction };
        self.find(buf, &pattern, from, direction, count, config)
    }

    /// All matches on lines `lines`, in document order.
    pub fn find_all(
        &mut self,
        buf: &Buffer,
        pattern: &str,
        lines: std::ops::Range<usize>,
        config: SearchConfig,
    ) -> EditResult<Vec<Match>> {
        let re = self.compile(pattern, config)?;
        let end = lines.end.min(buf.line_count());
        Ok((lines.start..end).flat_map(|l| line_matches(re, buf, l)).collect())
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine").field("last", &self.last).finish_non_exhaustive()
    }
}

/// Whole-word pattern for the keyword under or after `pos` (`*` and `#`).
#[must_use]
pub fn word_under_cursor(buf: &Buffer, pos: Position) -> Option<String> {
    let (start, end) = word::word_at(buf, pos)?;
    let text: String = buf
        .line_text(pos.line)
        .chars()
        .skip(start)
        .take(end - start)
        .collect();
    Some(format!(r"\<{}\>", regex::escape(&text)))
}

// ---------------------------------------------------------------------------
// Line scanning
// ---------------------------------------------------------------------------

fn line_matches(re: &Regex, buf: &Buffer, line: usize) -> Vec<Match> {
    let text = buf.line_text(line);
    let col = |byte: usize| text[..byte].chars().count();
    let at = |byte: usize| Position::new(line, col(byte));
    re.captures_iter(&text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let groups = caps
                .iter()
                .map(|g| g.map(|g| Range::new(at(g.start()), at(g.end()))))
                .collect();
            Some(Match {
                start: at(whole.start()),
                end: at(whole.end()),
                groups,
            })
        })
        .collect()
}

fn find_forward(re: &Regex, buf: &Buffer, from: Position, wrap: bool) -> Option<Match> {
    let count = buf.line_count();
    let after = |m: &Match| m.start > from;

    for line in from.line..count {
        if let Some(m) = line_matches(re, buf, line).into_iter().find(after) {
            return Some(m);
        }
    }
    if !wrap {
        return None;
    }
    (0..=from.line.min(count - 1))
        .find_map(|line| line_matches(re, buf, line).into_iter().next())
        .filter(|m| m.start <= from)
}

fn find_backward(re: &Regex, buf: &Buffer, from: Position, wrap: bool) -> Option<Match> {
    let count = buf.line_count();
    let before = |m: &Match| m.start < from;

    for line in (0..=from.line.min(count - 1)).rev() {
        if let Some(m) = line_matches(re, buf, line).into_iter().rev().find(before) {
            return Some(m);
        }
    }
    if !wrap {
        return None;
    }
    (from.line..count)
        .rev()
        .find_map(|line| line_matches(re, buf, line).into_iter().next_back())
        .filter(|m| m.start >= from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
