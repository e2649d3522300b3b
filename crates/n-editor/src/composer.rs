//! Command composer — assembles keys into a [`Command`].
//!
//! The composer holds the keys of the command being typed and re-parses
//! them as each key arrives. A parse either needs more keys, yields a
//! complete command, fails, or is cancelled by `<Esc>`.
//!
//! ```text
//! [count] ["x] [count] command
//! [count] ["x] [count] operator [count] (motion | text-object | operator)
//! ```
//!
//! Counts multiply (`2d3w` deletes six words). `0` only continues a count;
//! on its own it is the line-start motion.

use crate::command::{Command, CommandKind, InsertEntry, Motion, Operator, Target};
use crate::cursor::FindKind;
use crate::error::EditError;
use crate::key::{Key, keys_to_string};
use crate::mode::VisualKind;
use crate::register::RegisterStore;
use crate::search::SearchDirection;
use crate::text_object::TextObject;
use crate::word::WordKind;

/// Counts are clamped here.
pub const MAX_COUNT: usize = 999_999;

/// What the composer needs to know about the editor to parse a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    /// Visual mode: operators apply to the selection.
    pub visual: bool,
    /// A macro is being recorded, so `q` stops it.
    pub recording: bool,
}

/// The outcome of feeding one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// More keys are needed. `operator` is true once an operator is held.
    Pending { operator: bool },
    Complete(Command),
    Invalid(EditError),
    /// `<Esc>` abandoned the command.
    Cancelled,
}

/// Parser for normal- and visual-mode commands.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    keys: Vec<Key>,
}

impl Composer {
    #[must_use]
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Keys typed so far for the pending command.
    #[must_use]
    pub fn pending(&self) -> &[Key] {
        &self.keys
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drop any pending keys.
    pub fn reset(&mut self) {
        self.keys.clear();
    }

    /// Add `key` to the pending command.
    pub fn feed(&mut self, key: Key, ctx: Context) -> Step {
        self.keys.push(key);
        let mut parser = Parser::new(&self.keys, ctx);
        let step = match parser.command() {
            Err(Halt::More) => {
                return Step::Pending { operator: parser.operator };
            }
            Err(Halt::Cancel) => Step::Cancelled,
            Err(Halt::Bad) => Step::Invalid(EditError::invalid(keys_to_string(&self.keys))),
            Ok((count, register, kind)) => {
                let signature = self
                    .keys
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !parser.digits.contains(i))
                    .map(|(_, k)| *k)
                    .collect();
                Step::Complete(Command {
                    count,
                    register,
                    kind,
                    keys: self.keys.clone(),
                    signature,
                })
            }
        };
        if let Step::Complete(cmd) = &step {
            tracing::trace!(target: "editor.composer", keys = %keys_to_string(&cmd.keys), kind = ?cmd.kind, "composed");
        }
        self.keys.clear();
        step
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

enum Halt {
    More,
    Bad,
    Cancel,
}

type Parse<T> = Result<T, Halt>;

struct Parser<'k> {
    keys: &'k [Key],
    at: usize,
    ctx: Context,
    count: Option<usize>,
    /// Indices of the keys that were count digits.
    digits: Vec<usize>,
    operator: bool,
}

impl<'k> Parser<'k> {
    const fn new(keys: &'k [Key], ctx: Context) -> Self {
        Self {
            keys,
            at: 0,
            ctx,
            count: None,
            digits: Vec::new(),
            operator: false,
        }
    }

    fn peek(&self) -> Option<Key> {
        self.keys.get(self.at).copied()
    }

    fn next(&mut self) -> Parse<Key> {
        let key = self.peek().ok_or(Halt::More)?;
        self.at += 1;
        Ok(key)
    }

    /// The next key as a literal character (`f{c}`, `m{c}`, `"{c}`).
    fn next_char(&mut self) -> Parse<char> {
        match self.next()? {
            Key::Char(c) => Ok(c),
            Key::Tab => Ok('\t'),
            Key::Escape => Err(Halt::Cancel),
            _ => Err(Halt::Bad),
        }
    }

    /// Read a digit run and multiply it into the count.
    fn absorb_count(&mut self) {
        let mut n: Option<usize> = None;
        while let Some(Key::Char(c)) = self.peek() {
            let Some(d) = c.to_digit(10) else { break };
            if d == 0 && n.is_none() {
                break;
            }
            n = Some((n.unwrap_or(0) * 10 + d as usize).min(MAX_COUNT));
            self.digits.push(self.at);
            self.at += 1;
        }
        if let Some(n) = n {
            self.count = Some(self.count.map_or(n, |c| c.saturating_mul(n).min(MAX_COUNT)));
        }
    }

    fn command(&mut self) -> Parse<(Option<usize>, Option<char>, CommandKind)> {
        self.absorb_count();
        let mut register = None;
        if self.peek() == Some(Key::Char('"')) {
            self.at += 1;
            let key = self.next_char()?;
            if !RegisterStore::is_valid_key(key) {
                return Err(Halt::Bad);
            }
            register = Some(key);
            self.absorb_count();
        }
        let key = self.next()?;
        let kind = if self.ctx.visual {
            self.visual_command(key)?
        } else {
            self.normal_command(key)?
        };
        Ok((self.count, register, kind))
    }

    // -- Normal mode --------------------------------------------------------

    fn normal_command(&mut self, key: Key) -> Parse<CommandKind> {
        use CommandKind as K;
        let op = |op, motion| K::Operate { op, target: Target::Motion(motion) };
        let kind = match key {
            Key::Char(c @ ('d' | 'y' | 'c' | '>' | '<')) => {
                let operator = Operator::from_key(c).ok_or(Halt::Bad)?;
                self.operator_target(operator)?
            }
            Key::Char('g') => self.g_command()?,
            Key::Char('x') => op(Operator::Delete, Motion::Right),
            Key::Char('X') => op(Operator::Delete, Motion::Left),
            Key::Char('D') => op(Operator::Delete, Motion::LineEnd),
            Key::Char('C') => op(Operator::Change, Motion::LineEnd),
            Key::Char('s') => op(Operator::Change, Motion::Right),
            Key::Char('S') => K::Operate { op: Operator::Change, target: Target::Lines },
            Key::Char('Y') => K::Operate { op: Operator::Yank, target: Target::Lines },
            Key::Char('~') => K::ToggleCaseChar,
            Key::Char('r') => K::ReplaceChar(self.next_char()?),
            Key::Char('J') => K::Join,
            Key::Char('p') => K::Put { before: false },
            Key::Char('P') => K::Put { before: true },
            Key::Char('i') => K::Insert(InsertEntry::Before),
            Key::Char('a') => K::Insert(InsertEntry::After),
            Key::Char('I') => K::Insert(InsertEntry::LineStart),
            Key::Char('A') => K::Insert(InsertEntry::LineEnd),
            Key::Char('o') => K::Insert(InsertEntry::OpenBelow),
            Key::Char('O') => K::Insert(InsertEntry::OpenAbove),
            Key::Char('R') => K::Replace,
            Key::Char('v') => K::Visual(VisualKind::Char),
            Key::Char('V') => K::Visual(VisualKind::Line),
            Key::Ctrl('v') => K::Visual(VisualKind::Block),
            Key::Char('u') => K::Undo,
            Key::Ctrl('r') => K::Redo,
            Key::Char('U') => K::UndoLine,
            Key::Char('m') => K::SetMark(self.next_char()?),
            Key::Ctrl('o') => K::JumpOlder,
            Key::Tab | Key::Ctrl('i') => K::JumpNewer,
            Key::Char('q') if self.ctx.recording => K::StopRecording,
            Key::Char('q') => K::Record(self.next_char()?),
            Key::Char('@') => K::Play(self.next_char()?),
            Key::Char('.') => K::Repeat,
            Key::Escape => return Err(Halt::Cancel),
            other => K::Move(self.motion(other)?),
        };
        Ok(kind)
    }

    fn g_command(&mut self) -> Parse<CommandKind> {
        use CommandKind as K;
        Ok(match self.next_char()? {
            'g' => K::Move(Motion::FirstLine),
            'i' => K::Insert(InsertEntry::LastInsert),
            'v' => K::Reselect,
            '-' => K::Older,
            '+' => K::Newer,
            ';' => K::ChangeOlder,
            ',' => K::ChangeNewer,
            c => {
                let op = Operator::from_g_key(c).ok_or(Halt::Bad)?;
                self.operator_target(op)?
            }
        })
    }

    fn operator_target(&mut self, op: Operator) -> Parse<CommandKind> {
        self.operator = true;
        self.absorb_count();
        let target = match self.next()? {
            Key::Char(c) if c == op.line_key() => Target::Lines,
            Key::Char('g') => match self.next_char()? {
                'g' => Target::Motion(Motion::FirstLine),
                c if c == op.line_key() && op.keys().starts_with('g') => Target::Lines,
                _ => return Err(Halt::Bad),
            },
            Key::Char(scope @ ('i' | 'a')) => {
                let key = self.next_char()?;
                Target::Object(TextObject::from_keys(scope, key).ok_or(Halt::Bad)?)
            }
            Key::Escape => return Err(Halt::Cancel),
            other => Target::Motion(self.motion(other)?),
        };
        Ok(CommandKind::Operate { op, target })
    }

    // -- Visual mode --------------------------------------------------------

    fn visual_command(&mut self, key: Key) -> Parse<CommandKind> {
        use CommandKind as K;
        let on_selection = |op| K::Operate { op, target: Target::Selection };
        let kind = match key {
            Key::Char('d' | 'x') => on_selection(Operator::Delete),
            Key::Char('y') => on_selection(Operator::Yank),
            Key::Char('c' | 's') => on_selection(Operator::Change),
            Key::Char('>') => on_selection(Operator::Indent),
            Key::Char('<') => on_selection(Operator::Outdent),
            Key::Char('~') => on_selection(Operator::ToggleCase),
            Key::Char('u') => on_selection(Operator::Lowercase),
            Key::Char('U') => on_selection(Operator::Uppercase),
            Key::Char('J') => K::Join,
            Key::Char('r') => K::ReplaceChar(self.next_char()?),
            Key::Char('o') => K::SwapAnchor,
            Key::Char('v') => K::Visual(VisualKind::Char),
            Key::Char('V') => K::Visual(VisualKind::Line),
            Key::Ctrl('v') => K::Visual(VisualKind::Block),
            Key::Char('m') => K::SetMark(self.next_char()?),
            Key::Char(scope @ ('i' | 'a')) => {
                let key = self.next_char()?;
                K::SelectObject(TextObject::from_keys(scope, key).ok_or(Halt::Bad)?)
            }
            Key::Char('g') => match self.next_char()? {
                'g' => K::Move(Motion::FirstLine),
                c => on_selection(Operator::from_g_key(c).ok_or(Halt::Bad)?),
            },
            Key::Escape => K::Escape,
            other => K::Move(self.motion(other)?),
        };
        Ok(kind)
    }

    // -- Motions ------------------------------------------------------------

    fn motion(&mut self, key: Key) -> Parse<Motion> {
        let Key::Char(c) = key else {
            return match key {
                Key::Backspace => Ok(Motion::Left),
                _ => Err(Halt::Bad),
            };
        };
        let motion = match c {
            'h' => Motion::Left,
            'l' | ' ' => Motion::Right,
            'j' => Motion::Down,
            'k' => Motion::Up,
            '0' => Motion::LineStart,
            '^' => Motion::FirstNonBlank,
            '$' => Motion::LineEnd,
            'w' => Motion::WordForward(WordKind::Word),
            'W' => Motion::WordForward(WordKind::Big),
            'b' => Motion::WordBackward(WordKind::Word),
            'B' => Motion::WordBackward(WordKind::Big),
            'e' => Motion::WordEnd(WordKind::Word),
            'E' => Motion::WordEnd(WordKind::Big),
            'G' => Motion::LastLine,
            '}' => Motion::ParagraphForward,
            '{' => Motion::ParagraphBackward,
            '%' => Motion::MatchBracket,
            ';' => Motion::RepeatFind { reverse: false },
            ',' => Motion::RepeatFind { reverse: true },
            'n' => Motion::SearchNext { reverse: false },
            'N' => Motion::SearchNext { reverse: true },
            '*' => Motion::SearchWord { direction: SearchDirection::Forward },
            '#' => Motion::SearchWord { direction: SearchDirection::Backward },
            '/' => self.search(SearchDirection::Forward)?,
            '?' => self.search(SearchDirection::Backward)?,
            '\'' => Motion::Mark { key: self.next_char()?, exact: false },
            '`' => Motion::Mark { key: self.next_char()?, exact: true },
            'f' | 'F' | 't' | 'T' => {
                let kind = FindKind::from_key(c).ok_or(Halt::Bad)?;
                Motion::Find { kind, ch: self.next_char()? }
            }
            _ => return Err(Halt::Bad),
        };
        Ok(motion)
    }

    /// The pattern typed after `/` or `?`, up to `<CR>`.
    fn search(&mut self, direction: SearchDirection) -> Parse<Motion> {
        let mut pattern = String::new();
        loop {
            match self.next()? {
                Key::Enter => break,
                Key::Escape => return Err(Halt::Cancel),
                Key::Backspace => {
                    if pattern.pop().is_none() {
                        return Err(Halt::Cancel);
                    }
                }
                Key::Char(c) => pattern.push(c),
                Key::Tab => pattern.push('\t'),
                Key::Ctrl(_) => {}
            }
        }
        Ok(Motion::Search { direction, pattern })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::parse_keys;
    use crate::text_object::{ObjectKind, Scope};

    fn run(keys: &str, ctx: Context) -> Vec<Step> {
        let mut c = Composer::new();
        parse_keys(keys).into_iter().map(|k| c.feed(k, ctx)).collect()
    }

    fn normal(keys: &str) -> Command {
        match run(keys, Context::default()).pop() {
            Some(Step::Complete(cmd)) => cmd,
            other => panic!("{keys}: expected a command, got {other:?}"),
        }
    }

    fn visual(keys: &str) -> CommandKind {
        let ctx = Context { visual: true, recording: false };
        match run(keys, ctx).pop() {
            Some(Step::Complete(cmd)) => cmd.kind,
            other => panic!("{keys}: expected a command, got {other:?}"),
        }
    }

    // -- Counts -------------------------------------------------------------

    #[test]
    fn counts_multiply() {
        let cmd = normal("2d3w");
        assert_eq!(cmd.count, Some(6));
        assert_eq!(
            cmd.kind,
            CommandKind::Operate {
                op: Operator::Delete,
                target: Target::Motion(Motion::WordForward(WordKind::Word)),
            }
        );
        assert_eq!(keys_to_string(&cmd.signature), "dw");
        assert_eq!(keys_to_string(&cmd.keys), "2d3w");
    }

    #[test]
    fn zero_is_motion_unless_continuing_count() {
        assert_eq!(normal("0").kind, CommandKind::Move(Motion::LineStart));
        let cmd = normal("10j");
        assert_eq!(cmd.count, Some(10));
        assert_eq!(cmd.kind, CommandKind::Move(Motion::Down));
        assert_eq!(normal("d0").kind, CommandKind::Operate {
            op: Operator::Delete,
            target: Target::Motion(Motion::LineStart),
        });
    }

    #[test]
    fn huge_counts_are_clamped() {
        assert_eq!(normal("99999999x").count, Some(MAX_COUNT));
    }

    // -- Registers ----------------------------------------------------------

    #[test]
    fn register_prefix() {
        let cmd = normal("\"a3yy");
        assert_eq!(cmd.register, Some('a'));
        assert_eq!(cmd.count, Some(3));
        assert_eq!(cmd.kind, CommandKind::Operate { op: Operator::Yank, target: Target::Lines });
        assert_eq!(keys_to_string(&cmd.signature), "\"ayy");
        assert_eq!(normal("2\"_dd").register, Some('_'));
    }

    #[test]
    fn invalid_register_is_rejected() {
        let steps = run("\"!", Context::default());
        assert!(matches!(steps.last(), Some(Step::Invalid(EditError::InvalidComposition(_)))));
    }

    // -- Operators ----------------------------------------------------------

    #[test]
    fn doubled_operators_are_linewise() {
        for keys in ["dd", "yy", "cc", ">>", "<<", "g~~", "guu", "gUU", "gUgU"] {
            let cmd = normal(keys);
            assert!(
                matches!(cmd.kind, CommandKind::Operate { target: Target::Lines, .. }),
                "{keys}"
            );
        }
    }

    #[test]
    fn operator_with_text_object() {
        let cmd = normal("ci\"");
        let CommandKind::Operate { op, target: Target::Object(obj) } = cmd.kind else {
            panic!("expected object target");
        };
        assert_eq!(op, Operator::Change);
        assert_eq!(obj.scope, Scope::Inner);
        assert_eq!(obj.kind, ObjectKind::Quote('"'));
    }

    #[test]
    fn operator_pending_is_reported() {
        let steps = run("2d", Context::default());
        assert_eq!(steps[0], Step::Pending { operator: false });
        assert_eq!(steps[1], Step::Pending { operator: true });
    }

    #[test]
    fn dgg_and_bad_operator_target() {
        assert_eq!(
            normal("dgg").kind,
            CommandKind::Operate { op: Operator::Delete, target: Target::Motion(Motion::FirstLine) }
        );
        assert!(matches!(run("dq", Context::default()).pop(), Some(Step::Invalid(_))));
        assert!(matches!(run("diz", Context::default()).pop(), Some(Step::Invalid(_))));
    }

    #[test]
    fn shorthands_expand() {
        assert_eq!(
            normal("x").kind,
            CommandKind::Operate { op: Operator::Delete, target: Target::Motion(Motion::Right) }
        );
        assert_eq!(
            normal("C").kind,
            CommandKind::Operate { op: Operator::Change, target: Target::Motion(Motion::LineEnd) }
        );
        assert_eq!(normal("Y").kind, CommandKind::Operate { op: Operator::Yank, target: Target::Lines });
    }

    // -- Multi-key commands -------------------------------------------------

    #[test]
    fn find_and_marks() {
        assert_eq!(
            normal("dt,").kind,
            CommandKind::Operate {
                op: Operator::Delete,
                target: Target::Motion(Motion::Find { kind: FindKind::TillForward, ch: ',' }),
            }
        );
        assert_eq!(normal("`a").kind, CommandKind::Move(Motion::Mark { key: 'a', exact: true }));
        assert_eq!(normal("mZ").kind, CommandKind::SetMark('Z'));
    }

    #[test]
    fn search_pattern_until_enter() {
        let steps = run("/fo<BS>oo<CR>", Context::default());
        assert!(steps[..steps.len() - 1].iter().all(|s| matches!(s, Step::Pending { .. })));
        let Some(Step::Complete(cmd)) = steps.last() else {
            panic!("expected complete");
        };
        assert_eq!(
            cmd.kind,
            CommandKind::Move(Motion::Search {
                direction: SearchDirection::Forward,
                pattern: "foo".into(),
            })
        );
    }

    #[test]
    fn escape_cancels() {
        assert_eq!(run("d<Esc>", Context::default()).pop(), Some(Step::Cancelled));
        assert_eq!(run("/ab<Esc>", Context::default()).pop(), Some(Step::Cancelled));
        assert_eq!(run("/<BS>", Context::default()).pop(), Some(Step::Cancelled));
        let mut c = Composer::new();
        c.feed(Key::Char('2'), Context::default());
        assert!(!c.is_idle());
        c.feed(Key::Escape, Context::default());
        assert!(c.is_idle());
    }

    #[test]
    fn g_commands() {
        assert_eq!(normal("g-").kind, CommandKind::Older);
        assert_eq!(normal("g+").kind, CommandKind::Newer);
        assert_eq!(normal("g;").kind, CommandKind::ChangeOlder);
        assert_eq!(normal("gi").kind, CommandKind::Insert(InsertEntry::LastInsert));
        assert_eq!(normal("gv").kind, CommandKind::Reselect);
    }

    #[test]
    fn macro_keys_depend_on_recording() {
        assert_eq!(normal("qa").kind, CommandKind::Record('a'));
        assert_eq!(normal("@@").kind, CommandKind::Play('@'));
        let ctx = Context { visual: false, recording: true };
        assert!(matches!(
            run("q", ctx).pop(),
            Some(Step::Complete(Command { kind: CommandKind::StopRecording, .. }))
        ));
    }

    #[test]
    fn control_keys() {
        assert_eq!(normal("<C-r>").kind, CommandKind::Redo);
        assert_eq!(normal("<C-o>").kind, CommandKind::JumpOlder);
        assert_eq!(normal("<Tab>").kind, CommandKind::JumpNewer);
        assert_eq!(normal("<C-v>").kind, CommandKind::Visual(VisualKind::Block));
    }

    // -- Visual mode --------------------------------------------------------

    #[test]
    fn visual_keys_act_on_selection() {
        assert_eq!(
            visual("u"),
            CommandKind::Operate { op: Operator::Lowercase, target: Target::Selection }
        );
        assert_eq!(
            visual("~"),
            CommandKind::Operate { op: Operator::ToggleCase, target: Target::Selection }
        );
        assert_eq!(
            visual("gU"),
            CommandKind::Operate { op: Operator::Uppercase, target: Target::Selection }
        );
        assert_eq!(visual("o"), CommandKind::SwapAnchor);
        assert_eq!(visual("<Esc>"), CommandKind::Escape);
        assert_eq!(visual("w"), CommandKind::Move(Motion::WordForward(WordKind::Word)));
        assert!(matches!(visual("ip"), CommandKind::SelectObject(_)));
    }

    #[test]
    fn same_key_differs_by_mode() {
        assert_eq!(normal("u").kind, CommandKind::Undo);
        assert_eq!(normal("~").kind, CommandKind::ToggleCaseChar);
    }
}
