//! Register — storage for yanked and deleted text.
//!
//! Registers are the clipboard system. Every yank and delete copies text into
//! one or more registers, paste reads it back, and macros are stored in them
//! as key notation.
//!
//! | Key | Register | Written by |
//! |-----|----------|------------|
//! | `"` | unnamed | every yank and delete |
//! | `a`–`z` | named | `"x` prefix; lowercase overwrites |
//! | `A`–`Z` | named | `"X` prefix; appends to the lowercase slot |
//! | `0` | last yank | yanks with no register prefix |
//! | `1`–`9` | delete history | line-wise or multi-line deletes, shifting |
//! | `-` | small delete | deletes within one line |
//! | `_` | black hole | discards writes, reads empty |
//!
//! Every write carries a [`RegisterKind`], recorded at write time. Paste
//! dispatches on the stored kind; it is never re-derived from the text.

use crate::error::{EditError, EditResult};

/// Deepest numbered delete register.
pub const MAX_DEPTH: usize = 9;

/// Shape of the stored text. Determines how it pastes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterKind {
    /// Character-wise: pastes inline at the cursor.
    #[default]
    Char,

    /// Line-wise: pastes whole lines above or below the cursor line. The
    /// text always ends in `\n`.
    Line,

    /// Block-wise: one row per line, joined by `\n`. Pastes as a rectangle.
    Block,
}

/// Whether a write replaces or extends the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

/// A single register slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Register {
    text: String,
    kind: RegisterKind,
}

static EMPTY: Register = Register::new();

impl Register {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            text: String::new(),
            kind: RegisterKind::Char,
        }
    }

    #[must_use]
    pub const fn with(text: String, kind: RegisterKind) -> Self {
        Self { text, kind }
    }

    /// Append to the slot.
    ///
    /// If either side is line-wise the result is line-wise, with a line
    /// break between the old and new text. Otherwise if either side is
    /// block-wise, the new text adds rows to the block. Char-wise text is
    /// concatenated directly.
    pub fn append(&mut self, text: &str, kind: RegisterKind) {
        if self.text.is_empty() {
            self.text = text.to_string();
            self.kind = kind;
            return;
        }
        if kind == RegisterKind::Line || self.kind == RegisterKind::Line {
            if !self.text.ends_with('\n') {
                self.text.push('\n');
            }
            self.text.push_str(text);
            if !self.text.ends_with('\n') {
                self.text.push('\n');
            }
            self.kind = RegisterKind::Line;
        } else if kind == RegisterKind::Block || self.kind == RegisterKind::Block {
            self.text.push('\n');
            self.text.push_str(text);
            self.kind = RegisterKind::Block;
        } else {
            self.text.push_str(text);
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn kind(&self) -> RegisterKind {
        self.kind
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

// ── Register store ──────────────────────────────────────────────────────

/// Every register the editor knows, shared by all buffers.
#[derive(Debug, Clone)]
pub struct RegisterStore {
    unnamed: Register,
    /// Indexed by `ch as u8 - b'a'`.
    named: [Register; 26],
    /// `"0` through `"9`.
    numbered: [Register; 10],
    small_delete: Register,
    depth: usize,
}

impl RegisterStore {
    /// All registers empty, delete history nine deep.
    #[must_use]
    pub fn new() -> Self {
        Self {
            unnamed: Register::new(),
            named: std::array::from_fn(|_| Register::new()),
            numbered: std::array::from_fn(|_| Register::new()),
            small_delete: Register::new(),
            depth: MAX_DEPTH,
        }
    }

    /// How many numbered registers take part in delete shifting. Clamped to
    /// `1..=9`. Registers past a lowered depth are emptied.
    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth.clamp(1, MAX_DEPTH);
        for slot in &mut self.numbered[self.depth + 1..] {
            *slot = Register::new();
        }
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// True for any key [`write`](Self::write) accepts.
    #[must_use]
    pub const fn is_valid_key(key: char) -> bool {
        matches!(key, 'a'..='z' | 'A'..='Z' | '0'..='9' | '"' | '-' | '_')
    }

    /// Write `text` into one slot. Uppercase keys always append to their
    /// lowercase slot, whatever `mode` says. The black hole swallows the
    /// write.
    ///
    /// # Errors
    ///
    /// `InvalidComposition` if `key` does not name a register.
    pub fn write(
        &mut self,
        key: char,
        text: String,
        kind: RegisterKind,
        mode: WriteMode,
    ) -> EditResult<()> {
        let (slot, mode) = match key {
            '_' => return Ok(()),
            'A'..='Z' => (
                &mut self.named[(key as u8 - b'A') as usize],
                WriteMode::Append,
            ),
            'a'..='z' => (&mut self.named[(key as u8 - b'a') as usize], mode),
            '0'..='9' => (&mut self.numbered[(key as u8 - b'0') as usize], mode),
            '-' => (&mut self.small_delete, mode),
            '"' => (&mut self.unnamed, mode),
            _ => return Err(EditError::invalid(format!("\"{key}"))),
        };
        match mode {
            WriteMode::Overwrite => *slot = Register::with(text, kind),
            WriteMode::Append => slot.append(&text, kind),
        }
        tracing::trace!(target: "editor.register", register = %key, ?kind, ?mode, "write");
        Ok(())
    }

    /// Read a register. Unknown keys and the black hole read as empty;
    /// uppercase keys read their lowercase slot.
    #[must_use]
    pub fn read(&self, key: char) -> &Register {
        match key {
            'a'..='z' => &self.named[(key as u8 - b'a') as usize],
            'A'..='Z' => &self.named[(key as u8 - b'A') as usize],
            '0'..='9' => &self.numbered[(key as u8 - b'0') as usize],
            '-' => &self.small_delete,
            '"' => &self.unnamed,
            _ => &EMPTY,
        }
    }

    /// Store the result of a yank.
    ///
    /// With no register prefix the text lands in `"0` and the unnamed
    /// register. With a named prefix it lands in that register, and the
    /// unnamed register mirrors the slot's full content afterwards.
    pub fn record_yank(&mut self, target: Option<char>, text: String, kind: RegisterKind) {
        match target {
            Some('_') => {}
            Some(key) if key != '"' && Self::is_valid_key(key) => {
                self.write_named_and_mirror(key, text, kind);
            }
            _ => {
                self.numbered[0] = Register::with(text.clone(), kind);
                self.unnamed = Register::with(text, kind);
            }
        }
    }

    /// Store the result of a delete or change.
    ///
    /// With no register prefix, line-wise and multi-line deletes shift the
    /// numbered history (`"1` becomes `"2` and so on, the oldest falls off)
    /// and land in `"1`; smaller deletes land in `"-`. Either way the
    /// unnamed register gets the text.
    pub fn record_delete(&mut self, target: Option<char>, text: String, kind: RegisterKind) {
        match target {
            Some('_') => {}
            Some(key) if key != '"' && Self::is_valid_key(key) => {
                self.write_named_and_mirror(key, text, kind);
            }
            _ => {
                if kind != RegisterKind::Char || text.contains('\n') {
                    self.shift_numbered(Register::with(text.clone(), kind));
                } else {
                    self.small_delete = Register::with(text.clone(), kind);
                }
                self.unnamed = Register::with(text, kind);
            }
        }
    }

    fn write_named_and_mirror(&mut self, key: char, text: String, kind: RegisterKind) {
        let mode = if key.is_ascii_uppercase() {
            WriteMode::Append
        } else {
            WriteMode::Overwrite
        };
        // Keys were validated by the caller.
        if self.write(key, text, kind, mode).is_ok() {
            self.unnamed = self.read(key).clone();
        }
    }

    fn shift_numbered(&mut self, newest: Register) {
        for i in (2..=self.depth).rev() {
            self.numbered[i] = std::mem::take(&mut self.numbered[i - 1]);
        }
        self.numbered[1] = newest;
        tracing::trace!(target: "editor.register", depth = self.depth, "numbered shift");
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(text: &str) -> String {
        format!("{text}\n")
    }

    // ── Register slot ───────────────────────────────────────────────────

    #[test]
    fn append_char_to_char_concatenates() {
        let mut reg = Register::with("foo".into(), RegisterKind::Char);
        reg.append("bar", RegisterKind::Char);
        assert_eq!(reg.text(), "foobar");
        assert_eq!(reg.kind(), RegisterKind::Char);
    }

    #[test]
    fn append_line_makes_line_wise() {
        let mut reg = Register::with("foo".into(), RegisterKind::Char);
        reg.append("bar\n", RegisterKind::Line);
        assert_eq!(reg.text(), "foo\nbar\n");
        assert_eq!(reg.kind(), RegisterKind::Line);
    }

    #[test]
    fn append_char_to_line_keeps_line_wise() {
        let mut reg = Register::with("foo\n".into(), RegisterKind::Line);
        reg.append("bar", RegisterKind::Char);
        assert_eq!(reg.text(), "foo\nbar\n");
        assert_eq!(reg.kind(), RegisterKind::Line);
    }

    #[test]
    fn append_to_empty_takes_kind() {
        let mut reg = Register::new();
        reg.append("ab\ncd", RegisterKind::Block);
        assert_eq!(reg.kind(), RegisterKind::Block);
        reg.append("ef", RegisterKind::Char);
        assert_eq!(reg.text(), "ab\ncd\nef");
    }

    // ── Named registers ─────────────────────────────────────────────────

    #[test]
    fn lowercase_overwrites_uppercase_appends() {
        let mut regs = RegisterStore::new();
        regs.write('a', "one".into(), RegisterKind::Char, WriteMode::Overwrite)
            .unwrap();
        regs.write('A', "two".into(), RegisterKind::Char, WriteMode::Overwrite)
            .unwrap();
        assert_eq!(regs.read('a').text(), "onetwo");
        assert_eq!(regs.read('A').text(), "onetwo");

        regs.write('a', "three".into(), RegisterKind::Char, WriteMode::Overwrite)
            .unwrap();
        assert_eq!(regs.read('a').text(), "three");
    }

    #[test]
    fn invalid_key_is_rejected() {
        let mut regs = RegisterStore::new();
        let err = regs
            .write('%', "x".into(), RegisterKind::Char, WriteMode::Overwrite)
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidComposition(_)));
    }

    #[test]
    fn black_hole_discards() {
        let mut regs = RegisterStore::new();
        regs.record_delete(None, "keep".into(), RegisterKind::Char);
        regs.record_delete(Some('_'), line("gone"), RegisterKind::Line);
        assert!(regs.read('_').is_empty());
        assert_eq!(regs.read('"').text(), "keep");
        assert!(regs.read('1').is_empty());
    }

    #[test]
    fn unknown_read_is_empty_char() {
        let regs = RegisterStore::new();
        assert!(regs.read('!').is_empty());
        assert_eq!(regs.read('!').kind(), RegisterKind::Char);
    }

    // ── Yank / delete semantics ─────────────────────────────────────────

    #[test]
    fn unqualified_yank_fills_zero_and_unnamed() {
        let mut regs = RegisterStore::new();
        regs.record_yank(None, line("abc"), RegisterKind::Line);
        assert_eq!(regs.read('0').text(), "abc\n");
        assert_eq!(regs.read('0').kind(), RegisterKind::Line);
        assert_eq!(regs.read('"').text(), "abc\n");
    }

    #[test]
    fn named_yank_leaves_zero_alone() {
        let mut regs = RegisterStore::new();
        regs.record_yank(None, "first".into(), RegisterKind::Char);
        regs.record_yank(Some('b'), "second".into(), RegisterKind::Char);
        assert_eq!(regs.read('0').text(), "first");
        assert_eq!(regs.read('b').text(), "second");
        assert_eq!(regs.read('"').text(), "second");
    }

    #[test]
    fn unnamed_mirrors_appended_content() {
        let mut regs = RegisterStore::new();
        regs.record_yank(Some('c'), "ab".into(), RegisterKind::Char);
        regs.record_yank(Some('C'), "cd".into(), RegisterKind::Char);
        assert_eq!(regs.read('"').text(), "abcd");
    }

    #[test]
    fn deletes_never_touch_zero() {
        let mut regs = RegisterStore::new();
        regs.record_yank(None, "yanked".into(), RegisterKind::Char);
        regs.record_delete(None, line("deleted"), RegisterKind::Line);
        assert_eq!(regs.read('0').text(), "yanked");
        assert_eq!(regs.read('1').text(), "deleted\n");
    }

    #[test]
    fn line_deletes_shift_history() {
        let mut regs = RegisterStore::new();
        for i in 1..=10 {
            regs.record_delete(None, line(&i.to_string()), RegisterKind::Line);
        }
        // Newest in "1, oldest surviving in "9; the first delete fell off.
        assert_eq!(regs.read('1').text(), "10\n");
        assert_eq!(regs.read('2').text(), "9\n");
        assert_eq!(regs.read('9').text(), "2\n");
    }

    #[test]
    fn small_delete_goes_to_dash() {
        let mut regs = RegisterStore::new();
        regs.record_delete(None, line("big"), RegisterKind::Line);
        regs.record_delete(None, "x".into(), RegisterKind::Char);
        assert_eq!(regs.read('-').text(), "x");
        assert_eq!(regs.read('1').text(), "big\n");
        assert!(regs.read('2').is_empty());
        assert_eq!(regs.read('"').text(), "x");
    }

    #[test]
    fn multiline_char_delete_shifts() {
        let mut regs = RegisterStore::new();
        regs.record_delete(None, "c\nd".into(), RegisterKind::Char);
        assert_eq!(regs.read('1').text(), "c\nd");
        assert!(regs.read('-').is_empty());
    }

    #[test]
    fn named_delete_skips_history() {
        let mut regs = RegisterStore::new();
        regs.record_delete(Some('a'), line("abc"), RegisterKind::Line);
        assert!(regs.read('1').is_empty());
        assert_eq!(regs.read('a').text(), "abc\n");
        assert_eq!(regs.read('"').kind(), RegisterKind::Line);
    }

    #[test]
    fn configured_depth_limits_shift() {
        let mut regs = RegisterStore::new();
        regs.set_depth(3);
        for i in 1..=5 {
            regs.record_delete(None, line(&i.to_string()), RegisterKind::Line);
        }
        assert_eq!(regs.read('1').text(), "5\n");
        assert_eq!(regs.read('3').text(), "3\n");
        assert!(regs.read('4').is_empty());
    }

    #[test]
    fn lowering_depth_empties_higher_registers() {
        let mut regs = RegisterStore::new();
        for i in 1..=5 {
            regs.record_delete(None, line(&i.to_string()), RegisterKind::Line);
        }
        assert_eq!(regs.read('4').text(), "2\n");
        regs.set_depth(2);
        assert_eq!(regs.read('2').text(), "4\n");
        assert!(regs.read('3').is_empty());
        assert!(regs.read('4').is_empty());
        assert!(regs.read('5').is_empty());
    }

    #[test]
    fn depth_is_clamped() {
        let mut regs = RegisterStore::new();
        regs.set_depth(40);
        assert_eq!(regs.depth(), MAX_DEPTH);
        regs.set_depth(0);
        assert_eq!(regs.depth(), 1);
    }
}
