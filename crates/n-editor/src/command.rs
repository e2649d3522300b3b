//! Commands — the parsed form of a normal- or visual-mode key sequence.
//!
//! The [`Composer`](crate::composer::Composer) turns keys into a
//! [`Command`]; the [`Editor`](crate::editor::Editor) executes it. The same
//! key may parse differently depending on the mode it was typed in: `u` is
//! [`CommandKind::Undo`] in normal mode and a lowercase operator on the
//! selection in visual mode.
//!
//! # Motion classes
//!
//! | Class     | Motions                                   | Operator span     |
//! |-----------|-------------------------------------------|-------------------|
//! | exclusive | `h l 0 ^ w b W B F T { } / ? n N * #` `` `x `` | `[start, target)` |
//! | inclusive | `e E $ f t %`                             | `[start, target]` |
//! | line-wise | `j k gg G 'x`                             | whole lines       |
//!
//! `;` and `,` take the class of the find they repeat. An exclusive span
//! that ends in column 0 of a later line stops at the end of the line
//! before; if it also starts at or before the first non-blank of its line
//! it becomes line-wise.

use crate::cursor::FindKind;
use crate::key::Key;
use crate::mode::VisualKind;
use crate::search::SearchDirection;
use crate::text_object::TextObject;
use crate::word::WordKind;

/// A cursor motion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    LineStart,
    FirstNonBlank,
    LineEnd,
    WordForward(WordKind),
    WordBackward(WordKind),
    WordEnd(WordKind),
    /// `gg`: the count (default 1) is a line number.
    FirstLine,
    /// `G`: the count is a line number, default the last line.
    LastLine,
    ParagraphForward,
    ParagraphBackward,
    MatchBracket,
    Find { kind: FindKind, ch: char },
    /// `;` (`reverse` false) and `,`.
    RepeatFind { reverse: bool },
    /// `/pattern<CR>` or `?pattern<CR>`. An empty pattern reuses the last.
    Search { direction: SearchDirection, pattern: String },
    /// `n` and `N`.
    SearchNext { reverse: bool },
    /// `*` and `#`.
    SearchWord { direction: SearchDirection },
    /// `` `x `` (`exact`) or `'x`.
    Mark { key: char, exact: bool },
}

/// How an operator treats a motion's span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionClass {
    Exclusive,
    Inclusive,
    Linewise,
}

impl Motion {
    #[must_use]
    pub const fn class(&self) -> MotionClass {
        match self {
            Self::Up
            | Self::Down
            | Self::FirstLine
            | Self::LastLine
            | Self::Mark { exact: false, .. } => MotionClass::Linewise,
            Self::LineEnd | Self::WordEnd(_) | Self::MatchBracket | Self::RepeatFind { .. } => {
                MotionClass::Inclusive
            }
            Self::Find { kind, .. } if kind.is_forward() => MotionClass::Inclusive,
            _ => MotionClass::Exclusive,
        }
    }

    /// Jumps set the `'` mark and add a jump-list entry.
    #[must_use]
    pub const fn is_jump(&self) -> bool {
        matches!(
            self,
            Self::FirstLine
                | Self::LastLine
                | Self::ParagraphForward
                | Self::ParagraphBackward
                | Self::MatchBracket
                | Self::Search { .. }
                | Self::SearchNext { .. }
                | Self::SearchWord { .. }
                | Self::Mark { .. }
        )
    }
}

/// An operator applied over a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Delete,
    Yank,
    Change,
    Indent,
    Outdent,
    ToggleCase,
    Lowercase,
    Uppercase,
}

impl Operator {
    /// The key sequence that names the operator (`d`, `g~`, ...).
    #[must_use]
    pub const fn keys(self) -> &'static str {
        match self {
            Self::Delete => "d",
            Self::Yank => "y",
            Self::Change => "c",
            Self::Indent => ">",
            Self::Outdent => "<",
            Self::ToggleCase => "g~",
            Self::Lowercase => "gu",
            Self::Uppercase => "gU",
        }
    }

    /// Operator from its final key (`d`, `y`, `c`, `>`, `<`).
    #[must_use]
    pub const fn from_key(key: char) -> Option<Self> {
        match key {
            'd' => Some(Self::Delete),
            'y' => Some(Self::Yank),
            'c' => Some(Self::Change),
            '>' => Some(Self::Indent),
            '<' => Some(Self::Outdent),
            _ => None,
        }
    }

    /// Operator from the key after `g` (`~`, `u`, `U`).
    #[must_use]
    pub const fn from_g_key(key: char) -> Option<Self> {
        match key {
            '~' => Some(Self::ToggleCase),
            'u' => Some(Self::Lowercase),
            'U' => Some(Self::Uppercase),
            _ => None,
        }
    }

    /// The key that, repeated, makes the operator line-wise (`dd`, `g~~`).
    #[must_use]
    pub const fn line_key(self) -> char {
        match self {
            Self::Delete => 'd',
            Self::Yank => 'y',
            Self::Change => 'c',
            Self::Indent => '>',
            Self::Outdent => '<',
            Self::ToggleCase => '~',
            Self::Lowercase => 'u',
            Self::Uppercase => 'U',
        }
    }

    /// True for operators that change the buffer.
    #[must_use]
    pub const fn is_change(self) -> bool {
        !matches!(self, Self::Yank)
    }
}

/// What an operator applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Motion(Motion),
    Object(TextObject),
    /// `dd`, `yy`, `>>`: `count` whole lines from the cursor.
    Lines,
    /// The visual selection.
    Selection,
}

/// How insert mode is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertEntry {
    /// `i`
    Before,
    /// `a`
    After,
    /// `I`
    LineStart,
    /// `A`
    LineEnd,
    /// `o`
    OpenBelow,
    /// `O`
    OpenAbove,
    /// `gi`: where insert mode was last exited.
    LastInsert,
}

/// The parsed command, keyed by the mode it was typed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Move(Motion),
    Operate { op: Operator, target: Target },
    Insert(InsertEntry),
    /// `R`
    Replace,
    /// `r{c}`; in visual mode replaces every selected char.
    ReplaceChar(char),
    /// `~` in normal mode.
    ToggleCaseChar,
    /// `J`; in visual mode joins the selected lines.
    Join,
    /// `p` / `P`.
    Put { before: bool },
    Undo,
    Redo,
    /// `U`
    UndoLine,
    /// `g-`
    Older,
    /// `g+`
    Newer,
    SetMark(char),
    /// `<C-o>`
    JumpOlder,
    /// `<Tab>` (same key as `<C-i>`)
    JumpNewer,
    /// `g;`
    ChangeOlder,
    /// `g,`
    ChangeNewer,
    /// `q{reg}`
    Record(char),
    /// `q` while recording.
    StopRecording,
    /// `@{reg}`; `@@` is `Play('@')`.
    Play(char),
    /// `.`
    Repeat,
    /// `v`, `V`, `<C-v>`
    Visual(VisualKind),
    /// `gv`
    Reselect,
    /// `o` in visual mode.
    SwapAnchor,
    /// `iw`, `ap`, ... in visual mode: extend the selection to the object.
    SelectObject(TextObject),
    /// `<Esc>` in visual mode.
    Escape,
}

/// One complete command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Product of all counts typed, `None` if none was.
    pub count: Option<usize>,
    pub register: Option<char>,
    pub kind: CommandKind,
    /// Every key typed for this command.
    pub keys: Vec<Key>,
    /// `keys` without the count digits; replayed by `.`.
    pub signature: Vec<Key>,
}

impl Command {
    /// The count, defaulting to 1.
    #[must_use]
    pub fn count1(&self) -> usize {
        self.count.unwrap_or(1)
    }

    /// True for commands `.` can repeat.
    #[must_use]
    pub const fn is_repeatable_change(&self) -> bool {
        match &self.kind {
            CommandKind::Operate { op, .. } => op.is_change(),
            CommandKind::ReplaceChar(_)
            | CommandKind::ToggleCaseChar
            | CommandKind::Join
            | CommandKind::Put { .. } => true,
            _ => false,
        }
    }
}
