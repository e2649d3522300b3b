//! Editor — one buffer's modal editing state and command execution.
//!
//! An [`Editor`] owns a [`Buffer`] together with everything that belongs to
//! that buffer alone: cursor, mode, pending command keys, undo tree, jump
//! and change lists, and the open insert session. State shared by every
//! buffer (registers, marks, the search engine, macros and options) lives in
//! [`Shared`], which the session lends to the editor for each key.
//!
//! Every command resolves its span completely before it touches the buffer,
//! so a failing command leaves buffer, registers, marks and history as they
//! were. The edits a command makes are collected into one [`Delta`] and
//! committed as one undo node; a change (`c`, `i`, `o`, ...) keeps the node
//! open until the insert session ends.

use std::time::Duration;

use crate::buffer::{Buffer, end_after_insert};
use crate::command::{Command, CommandKind, InsertEntry, Motion, MotionClass, Operator, Target};
use crate::composer::{Composer, Context, Step};
use crate::cursor::{Cursor, FindKind};
use crate::error::{EditError, EditResult, MarkError};
use crate::history::{ChangeTag, Delta, Edit, NodeId, Replay, UndoTree};
use crate::jumplist::{ChangeList, JumpList};
use crate::key::{Key, keys_to_string, parse_keys};
use crate::macros::MacroEngine;
use crate::mark::{AutoMark, MarkStore};
use crate::mode::{Mode, ModeEvent, ModeMachine, VisualKind};
use crate::options::Options;
use crate::position::{Position, Range};
use crate::register::{RegisterKind, RegisterStore};
use crate::search::{SearchDirection, SearchEngine, word_under_cursor};
use crate::session::BufferId;
use crate::text_object::TextObject;
use crate::word::{self, CharClass, WordKind, classify};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State every buffer sees.
#[derive(Debug, Default)]
pub struct Shared {
    pub registers: RegisterStore,
    pub marks: MarkStore,
    pub search: SearchEngine,
    pub macros: MacroEngine,
    pub options: Options,
}

/// What the session must do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// A global mark points into another buffer.
    SwitchBuffer {
        buffer: BufferId,
        pos: Position,
        /// `` `X `` lands on the column, `'X` on the first non-blank.
        exact: bool,
    },
}

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// A resolved operator span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    /// Half-open character range.
    Chars(Range),
    /// Whole lines `first..=last`.
    Lines { first: usize, last: usize },
    /// Columns `left..right` on lines `first..=last`.
    Block {
        first: usize,
        last: usize,
        left: usize,
        right: usize,
    },
}

/// Where a motion ends up.
enum Landing {
    Here(Cursor),
    Elsewhere { buffer: BufferId, pos: Position, exact: bool },
}

/// An insert or replace session, open from entry until `<Esc>`.
#[derive(Debug, Clone)]
struct InsertSession {
    entry: Option<InsertEntry>,
    /// Times the typed text is inserted (`3ix<Esc>`).
    count: usize,
    tag_count: Option<usize>,
    signature: Vec<Key>,
    typed: Vec<Key>,
    /// Replace mode: the chars overwritten, `None` where text was added.
    overwritten: Vec<Option<char>>,
    repeatable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LastChange {
    count: Option<usize>,
    keys: Vec<Key>,
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// Modal editing state for one buffer.
#[derive(Debug)]
pub struct Editor {
    id: BufferId,
    buffer: Buffer,
    cursor: Cursor,
    modes: ModeMachine,
    composer: Composer,
    history: UndoTree,
    jumps: JumpList,
    changes: ChangeList,
    /// Edits of the command in progress.
    txn: Option<Delta>,
    insert: Option<InsertSession>,
    last_change: Option<LastChange>,
    last_find: Option<(FindKind, char)>,
    last_visual: Option<(VisualKind, Position, Position)>,
}

impl Editor {
    #[must_use]
    pub fn new(id: BufferId, buffer: Buffer) -> Self {
        Self {
            id,
            buffer,
            cursor: Cursor::new(),
            modes: ModeMachine::new(),
            composer: Composer::new(),
            history: UndoTree::new(),
            jumps: JumpList::new(),
            changes: ChangeList::new(),
            txn: None,
            insert: None,
            last_change: None,
            last_find: None,
            last_visual: None,
        }
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.modes.mode()
    }

    #[must_use]
    pub const fn history(&self) -> &UndoTree {
        &self.history
    }

    #[must_use]
    pub const fn jumps(&self) -> &JumpList {
        &self.jumps
    }

    #[must_use]
    pub const fn changes(&self) -> &ChangeList {
        &self.changes
    }

    /// Keys of the command being typed.
    #[must_use]
    pub fn pending_keys(&self) -> &[Key] {
        self.composer.pending()
    }

    /// The visual selection, ordered, while in visual mode.
    #[must_use]
    pub fn selection(&self) -> Option<Range> {
        if self.mode().is_visual() {
            self.cursor.selection()
        } else {
            None
        }
    }

    /// Replace the undo history, e.g. with one restored from disk.
    pub fn restore_history(&mut self, history: UndoTree) {
        self.history = history;
    }

    /// Write the buffer to its file.
    ///
    /// # Errors
    ///
    /// `Io` if the buffer has no path or the write fails.
    pub fn write(&mut self) -> EditResult<()> {
        self.buffer.save()?;
        Ok(())
    }

    /// Put the cursor on `pos` after a jump from elsewhere.
    pub fn land(&mut self, pos: Position, exact: bool) {
        let line = pos.line.min(self.buffer.last_line());
        let pos = if exact {
            pos
        } else {
            Position::new(line, self.buffer.first_non_blank(line))
        };
        self.cursor.set_position(pos, &self.buffer, false);
    }

    /// Remember the cursor as a jump origin (jump list and `'` mark).
    pub fn push_jump(&mut self, marks: &mut MarkStore) {
        let pos = self.cursor.position();
        self.jumps.push(pos);
        marks.set_auto(self.id, AutoMark::PreviousJump, pos);
    }

    /// Bring the editor back to normal mode: drop a half-typed command,
    /// end an open insert session and leave visual mode.
    pub fn reset_pending(&mut self, shared: &mut Shared) {
        self.composer.reset();
        self.settle();
        if self.mode().is_input() {
            if let Err(err) = self.finish_insert(shared) {
                tracing::debug!(target: "editor.command", buffer = %self.id, error = %err, "insert not closed");
            }
        }
        if let Some(kind) = self.mode().visual_kind() {
            let _ = self.modes.transition(ModeEvent::Escape);
            self.save_visual(kind, shared);
        }
    }

    /// `:earlier {time}`: restore the state the buffer was in `ago` before
    /// now.
    pub fn earlier(&mut self, ago: Duration, shared: &mut Shared) {
        let replay = self.history.seek_time(ago);
        self.replay(&replay, shared);
    }

    /// `:undo {n}`: jump to the state after change `node`.
    ///
    /// # Errors
    ///
    /// `Undo(AtLeaf)` if there is no such change.
    pub fn goto_change(&mut self, node: NodeId, shared: &mut Shared) -> EditResult<()> {
        let replay = self.history.goto(node)?;
        self.replay(&replay, shared);
        Ok(())
    }

    // -- Key dispatch -------------------------------------------------------

    /// Process one key.
    ///
    /// # Errors
    ///
    /// Any [`EditError`]; the command in progress is abandoned and nothing
    /// it would have changed is touched.
    pub fn handle_key(&mut self, key: Key, shared: &mut Shared) -> EditResult<Effect> {
        if self.mode().is_input() {
            self.input_key(key, shared)?;
            return Ok(Effect::None);
        }
        let ctx = Context {
            visual: self.mode().is_visual(),
            recording: shared.macros.is_recording(),
        };
        match self.composer.feed(key, ctx) {
            Step::Pending { operator } => {
                let event = if operator { ModeEvent::HoldOperator } else { ModeEvent::Hold };
                if let Err(err) = self.modes.transition(event) {
                    self.composer.reset();
                    return Err(err);
                }
                Ok(Effect::None)
            }
            Step::Cancelled => {
                self.settle();
                Ok(Effect::None)
            }
            Step::Invalid(err) => {
                self.settle();
                Err(err)
            }
            Step::Complete(cmd) => {
                let result = self.execute(&cmd, shared);
                self.settle();
                result
            }
        }
    }

    fn settle(&mut self) {
        if matches!(self.mode(), Mode::CommandPending | Mode::OperatorPending) {
            let _ = self.modes.transition(ModeEvent::Settle);
        }
    }

    fn execute(&mut self, cmd: &Command, shared: &mut Shared) -> EditResult<Effect> {
        tracing::trace!(target: "editor.command", buffer = %self.id, kind = ?cmd.kind, count = ?cmd.count, "execute");
        let count = cmd.count1();
        match &cmd.kind {
            CommandKind::Move(motion) => return self.move_cursor(motion, cmd.count, shared),
            CommandKind::Operate { op, target } => self.operate(*op, target, cmd, shared)?,
            CommandKind::Insert(entry) => self.begin_insert(*entry, cmd, shared)?,
            CommandKind::Replace => {
                self.modes.transition(ModeEvent::EnterReplace)?;
                self.begin();
                self.start_session(self.cursor.position(), None, count, cmd, true);
            }
            CommandKind::ReplaceChar(ch) => self.replace_chars(*ch, cmd, shared)?,
            CommandKind::ToggleCaseChar => self.toggle_case_chars(cmd, shared),
            CommandKind::Join => self.join(cmd, shared)?,
            CommandKind::Put { before } => self.put(*before, cmd, shared)?,
            CommandKind::Undo => {
                let replay = self.history.undo(count)?;
                self.replay(&replay, shared);
            }
            CommandKind::Redo => {
                let replay = self.history.redo(count)?;
                self.replay(&replay, shared);
            }
            CommandKind::Older => {
                let replay = self.history.go_older(count)?;
                self.replay(&replay, shared);
            }
            CommandKind::Newer => {
                let replay = self.history.go_newer(count)?;
                self.replay(&replay, shared);
            }
            CommandKind::UndoLine => self.undo_line(shared)?,
            CommandKind::SetMark(key) => {
                shared.marks.set_mark(*key, self.id, self.cursor.position())?;
            }
            CommandKind::JumpOlder => {
                let pos = self
                    .jumps
                    .back(self.cursor.position(), count)
                    .ok_or(EditError::BufferBoundary)?;
                self.cursor.set_position(pos, &self.buffer, false);
            }
            CommandKind::JumpNewer => {
                let pos = self.jumps.forward(count).ok_or(EditError::BufferBoundary)?;
                self.cursor.set_position(pos, &self.buffer, false);
            }
            CommandKind::ChangeOlder => {
                let pos = self.changes.back(count).ok_or(EditError::BufferBoundary)?;
                self.cursor.set_position(pos, &self.buffer, false);
            }
            CommandKind::ChangeNewer => {
                let pos = self.changes.forward(count).ok_or(EditError::BufferBoundary)?;
                self.cursor.set_position(pos, &self.buffer, false);
            }
            CommandKind::Record(key) => shared.macros.start_recording(*key)?,
            CommandKind::StopRecording => {
                shared.macros.stop_recording(&mut shared.registers);
            }
            CommandKind::Play(key) => shared.macros.play(*key, count, &shared.registers)?,
            CommandKind::Repeat => self.repeat(cmd.count, shared)?,
            CommandKind::Visual(kind) => self.toggle_visual(*kind, shared)?,
            CommandKind::Reselect => self.reselect()?,
            CommandKind::SwapAnchor => self.cursor.swap_anchor(),
            CommandKind::SelectObject(obj) => self.select_object(*obj, count)?,
            CommandKind::Escape => {
                let kind = self.mode().visual_kind();
                self.modes.transition(ModeEvent::Escape)?;
                if let Some(kind) = kind {
                    self.save_visual(kind, shared);
                }
            }
        }
        Ok(Effect::None)
    }

    // -- Motions ------------------------------------------------------------

    fn move_cursor(
        &mut self,
        motion: &Motion,
        count: Option<usize>,
        shared: &mut Shared,
    ) -> EditResult<Effect> {
        let landing = self.resolve_motion(motion, count, false, shared)?;
        if motion.is_jump() {
            self.push_jump(&mut shared.marks);
        }
        match landing {
            Landing::Here(cursor) => {
                self.cursor = cursor;
                Ok(Effect::None)
            }
            Landing::Elsewhere { buffer, pos, exact } => {
                if self.mode().is_visual() {
                    return Err(EditError::invalid("mark in another buffer"));
                }
                Ok(Effect::SwitchBuffer { buffer, pos, exact })
            }
        }
    }

    /// Move a copy of the cursor. `operator` lets horizontal and word motions
    /// reach one past the last char.
    fn resolve_motion(
        &mut self,
        motion: &Motion,
        count: Option<usize>,
        operator: bool,
        shared: &mut Shared,
    ) -> EditResult<Landing> {
        let n = count.unwrap_or(1);
        let past = operator || self.mode().cursor_past_end();
        let config = shared.options.search_config();
        let buf = &self.buffer;
        let mut c = self.cursor.clone();

        let moved = match motion {
            Motion::Left => c.move_left(n, buf, past),
            Motion::Right => c.move_right(n, buf, past),
            Motion::Up => c.move_up(n, buf, past),
            Motion::Down => c.move_down(n, buf, past),
            Motion::LineStart => c.move_to_line_start(),
            Motion::FirstNonBlank => c.move_to_first_non_blank(buf, false),
            Motion::LineEnd => c.move_to_line_end(n, buf, false),
            Motion::WordForward(kind) => c.word_forward(n, buf, *kind, past),
            Motion::WordBackward(kind) => c.word_backward(n, buf, *kind, past),
            Motion::WordEnd(kind) => c.word_end_forward(n, buf, *kind, false),
            Motion::FirstLine => {
                c.goto_line(count.map_or(0, |n| n.saturating_sub(1)), buf);
                true
            }
            Motion::LastLine => {
                c.goto_line(count.map_or(buf.last_line(), |n| n.saturating_sub(1)), buf);
                true
            }
            Motion::ParagraphForward => c.paragraph_forward(n, buf),
            Motion::ParagraphBackward => c.paragraph_backward(n, buf),
            Motion::MatchBracket => {
                if !c.match_bracket(buf) {
                    return Err(EditError::NoEnclosingObject);
                }
                true
            }
            Motion::Find { kind, ch } => {
                if !c.find_char(buf, *kind, *ch, n, false) {
                    return Err(EditError::NotFound(*ch));
                }
                self.last_find = Some((*kind, *ch));
                true
            }
            Motion::RepeatFind { reverse } => {
                let (kind, ch) = self.last_find.ok_or(EditError::NothingToRepeat)?;
                let kind = if *reverse { kind.reversed() } else { kind };
                if !c.find_char(buf, kind, ch, n, true) {
                    return Err(EditError::NotFound(ch));
                }
                true
            }
            Motion::Search { direction, pattern } => {
                let pattern = if pattern.is_empty() {
                    shared
                        .search
                        .last()
                        .map(|(p, _)| p.to_owned())
                        .ok_or(EditError::NoPreviousPattern)?
                } else {
                    pattern.clone()
                };
                let found = shared.search.find(buf, &pattern, c.position(), *direction, n, config);
                if !matches!(found, Err(EditError::InvalidPattern(_))) {
                    shared.search.remember(&pattern, *direction);
                }
                c.set_position(found?.start, buf, past);
                true
            }
            Motion::SearchNext { reverse } => {
                let m = shared.search.find_next(buf, c.position(), *reverse, n, config)?;
                c.set_position(m.start, buf, past);
                true
            }
            Motion::SearchWord { direction } => {
                let pos = c.position();
                let pattern = word_under_cursor(buf, pos)
                    .ok_or_else(|| EditError::NoMatch(String::new()))?;
                let from = match word::word_at(buf, pos) {
                    Some((start, _)) if *direction == SearchDirection::Backward => pos.with_col(start),
                    _ => pos,
                };
                shared.search.remember(&pattern, *direction);
                let m = shared.search.find(buf, &pattern, from, *direction, n, config)?;
                c.set_position(m.start, buf, past);
                true
            }
            Motion::Mark { key, exact } => {
                let (buffer, pos) = shared.marks.get_mark(*key, self.id)?;
                if buffer != self.id {
                    return Ok(Landing::Elsewhere { buffer, pos, exact: *exact });
                }
                let line = pos.line.min(buf.last_line());
                let pos = if *exact {
                    pos
                } else {
                    Position::new(line, buf.first_non_blank(line))
                };
                c.set_position(pos, buf, past);
                true
            }
        };

        let must_move = matches!(
            motion,
            Motion::Left
                | Motion::Right
                | Motion::Up
                | Motion::Down
                | Motion::WordForward(_)
                | Motion::WordBackward(_)
                | Motion::WordEnd(_)
                | Motion::ParagraphForward
                | Motion::ParagraphBackward
        );
        // Under an operator, `h` and `l` that cannot move give an empty span.
        let empty_span_ok = operator && matches!(motion, Motion::Left | Motion::Right);
        if must_move && !moved && !empty_span_ok {
            return Err(EditError::BufferBoundary);
        }
        Ok(Landing::Here(c))
    }

    // -- Operators ----------------------------------------------------------

    fn operate(
        &mut self,
        op: Operator,
        target: &Target,
        cmd: &Command,
        shared: &mut Shared,
    ) -> EditResult<()> {
        let span = self.resolve_span(op, target, cmd.count, shared)?;
        let visual = self.mode().visual_kind();
        if let Some(kind) = visual {
            self.save_visual(kind, shared);
        }
        let empty = matches!(span, Span::Chars(r) if r.is_empty());

        match op {
            Operator::Change => return self.change(span, cmd, visual.is_none(), shared),
            _ if empty => {}
            Operator::Yank => self.yank(span, cmd.register, shared),
            Operator::Delete => self.delete(span, cmd, shared),
            Operator::Indent | Operator::Outdent => self.shift(span, op, cmd, shared),
            Operator::ToggleCase | Operator::Lowercase | Operator::Uppercase => {
                let map: fn(char) -> char = match op {
                    Operator::Lowercase => to_lower,
                    Operator::Uppercase => to_upper,
                    _ => toggle_case,
                };
                self.begin();
                self.map_span(span, map, shared);
                let (start, _) = self.span_bounds(span);
                self.cursor.set_position(start, &self.buffer, false);
                self.finish_change(cmd, shared);
            }
        }
        if visual.is_some() {
            self.modes.transition(ModeEvent::Escape)?;
        }
        Ok(())
    }

    fn resolve_span(
        &mut self,
        op: Operator,
        target: &Target,
        count: Option<usize>,
        shared: &mut Shared,
    ) -> EditResult<Span> {
        let pos = self.cursor.position();
        let n = count.unwrap_or(1);
        match target {
            Target::Lines => Ok(Span::Lines {
                first: pos.line,
                last: (pos.line + n - 1).min(self.buffer.last_line()),
            }),
            Target::Object(obj) => {
                let span = obj.resolve(&self.buffer, pos, n)?;
                Ok(if span.linewise {
                    Span::Lines {
                        first: span.range.start.line,
                        last: span.range.end.line,
                    }
                } else {
                    Span::Chars(span.range)
                })
            }
            Target::Selection => self
                .selection_span()
                .ok_or_else(|| EditError::invalid("no selection")),
            Target::Motion(motion) => self.motion_span(op, motion, count, shared),
        }
    }

    fn motion_span(
        &mut self,
        op: Operator,
        motion: &Motion,
        count: Option<usize>,
        shared: &mut Shared,
    ) -> EditResult<Span> {
        let start = self.cursor.position();

        // `cw` on a word changes to the end of the word, like `ce`.
        if let Motion::WordForward(kind) = motion {
            if op == Operator::Change && self.buffer.char_at(start).is_some_and(|c| !c.is_whitespace()) {
                let end = change_word_end(&self.buffer, start, *kind, count.unwrap_or(1));
                return Ok(Span::Chars(Range::new(start, inclusive_end(&self.buffer, end))));
            }
        }

        let class = match motion {
            Motion::RepeatFind { reverse } => {
                let (kind, _) = self.last_find.ok_or(EditError::NothingToRepeat)?;
                let kind = if *reverse { kind.reversed() } else { kind };
                if kind.is_forward() {
                    MotionClass::Inclusive
                } else {
                    MotionClass::Exclusive
                }
            }
            m => m.class(),
        };

        let target = match self.resolve_motion(motion, count, true, shared)? {
            Landing::Here(c) => c.position(),
            Landing::Elsewhere { .. } => {
                return Err(EditError::invalid("operator over a mark in another buffer"));
            }
        };
        let (a, b) = if start <= target { (start, target) } else { (target, start) };

        Ok(match class {
            MotionClass::Linewise => Span::Lines {
                first: a.line,
                last: b.line,
            },
            MotionClass::Inclusive => Span::Chars(Range::new(a, inclusive_end(&self.buffer, b))),
            MotionClass::Exclusive => {
                let line_start_blank = self
                    .buffer
                    .line_text(b.line)
                    .chars()
                    .take(b.col)
                    .all(char::is_whitespace);
                if b.line > a.line && line_start_blank {
                    let end = Position::new(b.line - 1, self.buffer.line_len(b.line - 1));
                    let word_motion = matches!(motion, Motion::WordForward(_));
                    if !word_motion && b.col == 0 && a.col <= self.buffer.first_non_blank(a.line) {
                        return Ok(Span::Lines {
                            first: a.line,
                            last: end.line,
                        });
                    }
                    if word_motion || b.col == 0 {
                        return Ok(Span::Chars(Range::new(a, end)));
                    }
                }
                Span::Chars(Range::new(a, b))
            }
        })
    }

    fn selection_span(&self) -> Option<Span> {
        let kind = self.mode().visual_kind()?;
        let anchor = self.cursor.anchor()?;
        let pos = self.cursor.position();
        let (a, b) = if anchor <= pos { (anchor, pos) } else { (pos, anchor) };
        Some(match kind {
            VisualKind::Char => Span::Chars(Range::new(a, inclusive_end(&self.buffer, b))),
            VisualKind::Line => Span::Lines {
                first: a.line,
                last: b.line,
            },
            VisualKind::Block => Span::Block {
                first: a.line,
                last: b.line,
                left: anchor.col.min(pos.col),
                right: anchor.col.max(pos.col) + 1,
            },
        })
    }

    /// Text and register kind of a span.
    fn span_text(&self, span: Span) -> (String, RegisterKind) {
        match span {
            Span::Chars(range) => (self.buffer.slice(range).unwrap_or_default(), RegisterKind::Char),
            Span::Lines { first, last } => {
                let mut text = (first..=last)
                    .map(|l| self.buffer.line_text(l))
                    .collect::<Vec<_>>()
                    .join("\n");
                text.push('\n');
                (text, RegisterKind::Line)
            }
            Span::Block { first, last, left, right } => {
                let rows = (first..=last)
                    .map(|l| {
                        self.buffer
                            .slice(self.block_row(l, left, right))
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>();
                (rows.join("\n"), RegisterKind::Block)
            }
        }
    }

    /// First and last position a span covers (for `[` and `]`).
    fn span_bounds(&self, span: Span) -> (Position, Position) {
        match span {
            Span::Chars(r) => (r.start, r.end),
            Span::Lines { first, last } => (
                Position::new(first, 0),
                Position::new(last, self.buffer.line_len(last).saturating_sub(1)),
            ),
            Span::Block { first, last, left, right } => {
                (Position::new(first, left), Position::new(last, right.saturating_sub(1)))
            }
        }
    }

    fn block_row(&self, line: usize, left: usize, right: usize) -> Range {
        let len = self.buffer.line_len(line);
        Range::new(Position::new(line, left.min(len)), Position::new(line, right.min(len)))
    }

    fn yank(&mut self, span: Span, register: Option<char>, shared: &mut Shared) {
        let (text, kind) = self.span_text(span);
        let lines = text.matches('\n').count();
        shared.registers.record_yank(register, text, kind);
        let (start, end) = self.span_bounds(span);
        shared.marks.set_auto(self.id, AutoMark::ChangeStart, start);
        shared.marks.set_auto(self.id, AutoMark::ChangeEnd, end);
        let pos = match span {
            Span::Chars(r) => r.start,
            Span::Lines { first, .. } => Position::new(first, self.cursor.col()),
            Span::Block { first, left, .. } => Position::new(first, left),
        };
        if pos < self.cursor.position() || !matches!(span, Span::Lines { .. }) {
            self.cursor.set_position(pos, &self.buffer, false);
        }
        tracing::debug!(target: "editor.register", register = ?register, ?kind, lines, "yank");
    }

    fn delete(&mut self, span: Span, cmd: &Command, shared: &mut Shared) {
        let (text, kind) = self.span_text(span);
        shared.registers.record_delete(cmd.register, text, kind);
        self.begin();
        match span {
            Span::Chars(range) => {
                self.delete_range(range, shared);
                self.cursor.set_position(range.start, &self.buffer, false);
            }
            Span::Lines { first, last } => {
                self.delete_lines(first, last, shared);
                self.cursor.goto_line(first.min(self.buffer.last_line()), &self.buffer);
            }
            Span::Block { first, last, left, right } => {
                for line in first..=last {
                    let row = self.block_row(line, left, right);
                    self.delete_range(row, shared);
                }
                self.cursor.set_position(Position::new(first, left), &self.buffer, false);
            }
        }
        self.finish_change(cmd, shared);
    }

    /// Remove lines `first..=last`, taking a line break with them.
    fn delete_lines(&mut self, first: usize, last: usize, shared: &mut Shared) {
        let last_line = self.buffer.last_line();
        let end_of = |buf: &Buffer, l: usize| Position::new(l, buf.line_len(l));
        let range = if last < last_line {
            Range::new(Position::new(first, 0), Position::new(last + 1, 0))
        } else if first > 0 {
            Range::new(end_of(&self.buffer, first - 1), end_of(&self.buffer, last))
        } else {
            Range::new(Position::ZERO, end_of(&self.buffer, last))
        };
        self.delete_range(range, shared);
    }

    /// Delete the span and open an insert session in the same undo node.
    fn change(
        &mut self,
        span: Span,
        cmd: &Command,
        repeatable: bool,
        shared: &mut Shared,
    ) -> EditResult<()> {
        let (text, kind) = self.span_text(span);
        self.modes.transition(ModeEvent::EnterInsert)?;
        if !matches!(span, Span::Chars(r) if r.is_empty()) {
            shared.registers.record_delete(cmd.register, text, kind);
        }
        self.begin();
        let at = match span {
            Span::Chars(range) => {
                self.delete_range(range, shared);
                range.start
            }
            Span::Lines { first, last } => {
                let end = Position::new(last, self.buffer.line_len(last));
                self.delete_range(Range::new(Position::new(first, 0), end), shared);
                Position::new(first, 0)
            }
            Span::Block { first, last, left, right } => {
                for line in first..=last {
                    let row = self.block_row(line, left, right);
                    self.delete_range(row, shared);
                }
                self.buffer.clamp_insert(Position::new(first, left))
            }
        };
        self.start_session(at, None, 1, cmd, repeatable);
        Ok(())
    }

    fn shift(&mut self, span: Span, op: Operator, cmd: &Command, shared: &mut Shared) {
        let (first, last) = match span {
            Span::Chars(r) => {
                let start_len = self.buffer.line_len(r.start.line);
                let first = if start_len > 0 && r.start.col >= start_len {
                    r.start.line + 1
                } else {
                    r.start.line
                };
                let last = if r.end.col == 0 && r.end.line > first {
                    r.end.line - 1
                } else {
                    r.end.line
                };
                (first, last)
            }
            Span::Lines { first, last } | Span::Block { first, last, .. } => (first, last),
        };
        if first > last {
            return;
        }
        self.begin();
        let width = shared.options.shiftwidth;
        let unit = shared.options.indent_unit();
        for line in first..=last {
            let text = self.buffer.line_text(line);
            if op == Operator::Indent {
                if !text.is_empty() {
                    self.insert_text(Position::new(line, 0), &unit, shared);
                }
                continue;
            }
            let mut remove = 0;
            for ch in text.chars() {
                match ch {
                    '\t' if remove == 0 => {
                        remove = 1;
                        break;
                    }
                    ' ' if remove < width => remove += 1,
                    _ => break,
                }
            }
            if remove > 0 {
                self.delete_range(
                    Range::new(Position::new(line, 0), Position::new(line, remove)),
                    shared,
                );
            }
        }
        self.cursor.goto_line(first, &self.buffer);
        self.finish_change(cmd, shared);
        tracing::debug!(target: "editor.command", buffer = %self.id, first, last, ?op, "shift");
    }

    /// Rewrite every char of `span` through `map`. Line breaks are kept.
    fn map_span(&mut self, span: Span, map: impl Fn(char) -> char, shared: &mut Shared) {
        let segments: Vec<Range> = match span {
            Span::Chars(r) => vec![r],
            Span::Lines { first, last } => vec![Range::new(
                Position::new(first, 0),
                Position::new(last, self.buffer.line_len(last)),
            )],
            Span::Block { first, last, left, right } => (first..=last)
                .map(|line| self.block_row(line, left, right))
                .collect(),
        };
        for seg in segments {
            let Some(old) = self.buffer.slice(seg) else { continue };
            let new: String = old.chars().map(|c| if c == '\n' { c } else { map(c) }).collect();
            if new != old {
                self.delete_range(seg, shared);
                self.insert_text(seg.start, &new, shared);
            }
        }
    }

    // -- Single-key changes -------------------------------------------------

    fn replace_chars(&mut self, ch: char, cmd: &Command, shared: &mut Shared) -> EditResult<()> {
        if let Some(span) = self.selection_span() {
            if let Some(kind) = self.mode().visual_kind() {
                self.save_visual(kind, shared);
            }
            self.begin();
            self.map_span(span, |_| ch, shared);
            let (start, _) = self.span_bounds(span);
            self.cursor.set_position(start, &self.buffer, false);
            self.finish_change(cmd, shared);
            self.modes.transition(ModeEvent::Escape)?;
            return Ok(());
        }
        let pos = self.cursor.position();
        let count = cmd.count1();
        if pos.col + count > self.buffer.line_len(pos.line) {
            return Err(EditError::BufferBoundary);
        }
        self.begin();
        let end = pos.with_col(pos.col + count);
        self.delete_range(Range::new(pos, end), shared);
        self.insert_text(pos, &ch.to_string().repeat(count), shared);
        self.cursor.set_position(end.with_col(end.col - 1), &self.buffer, false);
        self.finish_change(cmd, shared);
        Ok(())
    }

    fn toggle_case_chars(&mut self, cmd: &Command, shared: &mut Shared) {
        let pos = self.cursor.position();
        let len = self.buffer.line_len(pos.line);
        if len == 0 {
            return;
        }
        let end = (pos.col + cmd.count1()).min(len);
        self.begin();
        self.map_span(Span::Chars(Range::new(pos, pos.with_col(end))), toggle_case, shared);
        self.cursor.set_position(pos.with_col(end), &self.buffer, false);
        self.finish_change(cmd, shared);
    }

    /// `J`: join `count` lines (at least two) into one.
    fn join(&mut self, cmd: &Command, shared: &mut Shared) -> EditResult<()> {
        let visual = self.mode().visual_kind();
        let (first, joins) = match self.selection_span() {
            Some(span) => {
                let (a, b) = self.span_bounds(span);
                (a.line, (b.line - a.line).max(1))
            }
            None => (self.cursor.line(), cmd.count1().saturating_sub(1).max(1)),
        };
        let last_line = self.buffer.last_line();
        if first >= last_line {
            return Err(EditError::BufferBoundary);
        }
        if let Some(kind) = visual {
            self.save_visual(kind, shared);
        }
        self.begin();
        let mut join_col = 0;
        for _ in 0..joins.min(last_line - first) {
            let len = self.buffer.line_len(first);
            let ends_blank = len > 0
                && matches!(self.buffer.char_at(Position::new(first, len - 1)), Some(' ' | '\t'));
            let next = self.buffer.line_text(first + 1);
            let leading = next.chars().take_while(|c| matches!(c, ' ' | '\t')).count();
            let next_blank = leading == next.chars().count();

            self.delete_range(
                Range::new(Position::new(first, len), Position::new(first + 1, leading)),
                shared,
            );
            if !ends_blank && !next_blank && len > 0 {
                self.insert_text(Position::new(first, len), " ", shared);
            }
            join_col = len;
        }
        self.cursor.set_position(Position::new(first, join_col), &self.buffer, false);
        self.finish_change(cmd, shared);
        if visual.is_some() {
            self.modes.transition(ModeEvent::Escape)?;
        }
        Ok(())
    }

    // -- Put ----------------------------------------------------------------

    fn put(&mut self, before: bool, cmd: &Command, shared: &mut Shared) -> EditResult<()> {
        let key = cmd.register.unwrap_or('"');
        let register = shared.registers.read(key).clone();
        if register.is_empty() {
            return Err(EditError::EmptyRegister(key));
        }
        let count = cmd.count1();
        let pos = self.cursor.position();
        let len = self.buffer.line_len(pos.line);
        self.begin();

        match register.kind() {
            RegisterKind::Char => {
                let text = register.text().repeat(count);
                let at = if before || len == 0 { pos } else { pos.with_col(pos.col + 1) };
                let end = self.insert_text(at, &text, shared);
                let cursor = if text.contains('\n') {
                    at
                } else {
                    end.with_col(end.col.saturating_sub(1))
                };
                self.cursor.set_position(cursor, &self.buffer, false);
            }
            RegisterKind::Line => {
                let mut one = register.text().to_owned();
                if !one.ends_with('\n') {
                    one.push('\n');
                }
                let text = one.repeat(count);
                let first = if before {
                    self.insert_text(Position::new(pos.line, 0), &text, shared);
                    pos.line
                } else if pos.line < self.buffer.last_line() {
                    self.insert_text(Position::new(pos.line + 1, 0), &text, shared);
                    pos.line + 1
                } else {
                    let body = text.strip_suffix('\n').unwrap_or(&text);
                    self.insert_text(Position::new(pos.line, len), &format!("\n{body}"), shared);
                    pos.line + 1
                };
                self.cursor.goto_line(first, &self.buffer);
            }
            RegisterKind::Block => {
                let col = if before || len == 0 { pos.col } else { pos.col + 1 };
                self.put_block(register.text(), Position::new(pos.line, col), count, shared);
                self.cursor.set_position(Position::new(pos.line, col), &self.buffer, false);
            }
        }
        self.finish_change(cmd, shared);
        Ok(())
    }

    /// Paste a block: row `i` goes into line `at.line + i` at column
    /// `at.col`, padded so the rows stay aligned.
    fn put_block(&mut self, text: &str, at: Position, count: usize, shared: &mut Shared) {
        let rows: Vec<&str> = text.split('\n').collect();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        for (i, row) in rows.iter().enumerate() {
            let line = at.line + i;
            if line > self.buffer.last_line() {
                let end = self.buffer.end_position();
                self.insert_text(end, "\n", shared);
            }
            let len = self.buffer.line_len(line);
            let row_len = row.chars().count();
            let cell = format!("{row}{}", " ".repeat(width - row_len)).repeat(count);
            let cell: String = if len <= at.col {
                cell.chars().take((count - 1) * width + row_len).collect()
            } else {
                cell
            };
            let mut piece = " ".repeat(at.col.saturating_sub(len));
            piece.push_str(&cell);
            self.insert_text(Position::new(line, at.col.min(len)), &piece, shared);
        }
    }

    // -- Insert and replace -------------------------------------------------

    fn begin_insert(&mut self, entry: InsertEntry, cmd: &Command, shared: &mut Shared) -> EditResult<()> {
        let pos = self.cursor.position();
        let line = pos.line;
        let len = self.buffer.line_len(line);
        let target = match entry {
            InsertEntry::Before | InsertEntry::OpenBelow | InsertEntry::OpenAbove => pos,
            InsertEntry::After if len == 0 => pos,
            InsertEntry::After => pos.with_col(pos.col + 1),
            InsertEntry::LineStart => Position::new(line, self.buffer.first_non_blank(line)),
            InsertEntry::LineEnd => Position::new(line, len),
            InsertEntry::LastInsert => shared
                .marks
                .auto(self.id, AutoMark::LastInsert)
                .map_or(pos, |p| self.buffer.clamp_insert(p)),
        };
        self.modes.transition(ModeEvent::EnterInsert)?;
        self.begin();
        let at = match entry {
            InsertEntry::OpenBelow => {
                self.insert_text(Position::new(line, len), "\n", shared);
                Position::new(line + 1, 0)
            }
            InsertEntry::OpenAbove => {
                self.insert_text(Position::new(line, 0), "\n", shared);
                Position::new(line, 0)
            }
            _ => target,
        };
        self.start_session(at, Some(entry), cmd.count1(), cmd, true);
        Ok(())
    }

    fn start_session(
        &mut self,
        at: Position,
        entry: Option<InsertEntry>,
        count: usize,
        cmd: &Command,
        repeatable: bool,
    ) {
        self.cursor.clear_anchor();
        self.cursor.set_position(at, &self.buffer, true);
        self.insert = Some(InsertSession {
            entry,
            count,
            tag_count: cmd.count,
            signature: cmd.signature.clone(),
            typed: Vec::new(),
            overwritten: Vec::new(),
            repeatable,
        });
    }

    fn input_key(&mut self, key: Key, shared: &mut Shared) -> EditResult<()> {
        if key == Key::Escape {
            return self.finish_insert(shared);
        }
        if let Some(session) = &mut self.insert {
            session.typed.push(key);
        }
        self.type_key(key, shared);
        Ok(())
    }

    fn type_key(&mut self, key: Key, shared: &mut Shared) {
        let replace = self.mode() == Mode::Replace;
        let pos = self.cursor.position();
        match key {
            Key::Char(ch) => self.type_char(ch, replace, shared),
            Key::Tab => self.type_char('\t', replace, shared),
            Key::Enter => {
                self.insert_text(pos, "\n", shared);
                self.push_overwritten(None);
                self.cursor.set_position(Position::new(pos.line + 1, 0), &self.buffer, true);
            }
            Key::Backspace => self.backspace(replace, shared),
            Key::Escape | Key::Ctrl(_) => {}
        }
    }

    fn type_char(&mut self, ch: char, replace: bool, shared: &mut Shared) {
        let pos = self.cursor.position();
        if replace {
            let old = self.buffer.char_at(pos);
            if old.is_some() {
                self.delete_range(Range::new(pos, pos.with_col(pos.col + 1)), shared);
            }
            self.push_overwritten(old);
        }
        let mut utf8 = [0u8; 4];
        self.insert_text(pos, ch.encode_utf8(&mut utf8), shared);
        self.cursor.set_position(pos.with_col(pos.col + 1), &self.buffer, true);
    }

    fn push_overwritten(&mut self, old: Option<char>) {
        if let Some(session) = &mut self.insert {
            session.overwritten.push(old);
        }
    }

    fn backspace(&mut self, replace: bool, shared: &mut Shared) {
        let pos = self.cursor.position();
        if !replace {
            self.delete_before(pos, shared);
            return;
        }
        match self.insert.as_mut().and_then(|s| s.overwritten.pop()) {
            Some(Some(old)) => {
                if let Some(col) = pos.col.checked_sub(1) {
                    let at = pos.with_col(col);
                    self.delete_range(Range::new(at, pos), shared);
                    self.insert_text(at, &old.to_string(), shared);
                    self.cursor.set_position(at, &self.buffer, true);
                }
            }
            Some(None) => self.delete_before(pos, shared),
            None => {
                self.cursor.move_left(1, &self.buffer, true);
            }
        }
    }

    /// Delete the char before `pos`, joining with the line above at column 0.
    fn delete_before(&mut self, pos: Position, shared: &mut Shared) {
        let at = if pos.col > 0 {
            pos.with_col(pos.col - 1)
        } else if pos.line > 0 {
            Position::new(pos.line - 1, self.buffer.line_len(pos.line - 1))
        } else {
            return;
        };
        self.delete_range(Range::new(at, pos), shared);
        self.cursor.set_position(at, &self.buffer, true);
    }

    /// `<Esc>` in insert or replace mode.
    fn finish_insert(&mut self, shared: &mut Shared) -> EditResult<()> {
        let Some(session) = self.insert.take() else {
            self.modes.transition(ModeEvent::Escape)?;
            return Ok(());
        };
        for _ in 1..session.count {
            if matches!(session.entry, Some(InsertEntry::OpenBelow | InsertEntry::OpenAbove)) {
                let line = self.cursor.line();
                let len = self.buffer.line_len(line);
                self.insert_text(Position::new(line, len), "\n", shared);
                self.cursor.set_position(Position::new(line + 1, 0), &self.buffer, true);
            }
            for key in &session.typed {
                self.type_key(*key, shared);
            }
        }

        let end = self.cursor.position();
        if self.modes.transition(ModeEvent::Escape)?.exits_input() {
            shared.marks.set_auto(self.id, AutoMark::LastInsert, end);
        }
        self.cursor.set_position(end.with_col(end.col.saturating_sub(1)), &self.buffer, false);

        let mut keys = session.signature;
        keys.extend(session.typed);
        keys.push(Key::Escape);
        self.commit_change(session.tag_count, keys, session.repeatable, shared);
        Ok(())
    }

    // -- Undo ---------------------------------------------------------------

    /// Apply the edits of an undo-tree move and restore its cursor.
    fn replay(&mut self, replay: &Replay, shared: &mut Shared) {
        for edit in &replay.edits {
            edit.apply(&mut self.buffer);
            self.track(edit, shared);
        }
        self.cursor.set_position(replay.cursor, &self.buffer, false);
        tracing::debug!(target: "editor.undo", buffer = %self.id, node = replay.target, edits = replay.edits.len(), "replay");
    }

    /// `U`: revert the current node's changes to the cursor line, as a new
    /// node of its own.
    fn undo_line(&mut self, shared: &mut Shared) -> EditResult<()> {
        let pos = self.cursor.position();
        let mut delta = self.history.undo_line(pos.line, pos)?;
        for edit in delta.edits() {
            edit.apply(&mut self.buffer);
            self.track(edit, shared);
        }
        delta.set_tag(ChangeTag {
            count: None,
            keys: "U".to_owned(),
        });
        self.cursor.set_position(pos, &self.buffer, false);
        self.history.commit(delta, self.cursor.position());
        shared.marks.set_auto(self.id, AutoMark::LastChange, pos);
        self.changes.push(pos);
        Ok(())
    }

    // -- Repeat -------------------------------------------------------------

    /// `.`: feed the last change's keys again, with `count` if given.
    fn repeat(&mut self, count: Option<usize>, shared: &mut Shared) -> EditResult<()> {
        let last = self.last_change.clone().ok_or(EditError::NothingToRepeat)?;
        let mut keys = count
            .or(last.count)
            .map_or_else(Vec::new, |n| parse_keys(&n.to_string()));
        keys.extend(last.keys);
        tracing::trace!(target: "editor.command", buffer = %self.id, keys = %keys_to_string(&keys), "repeat");
        for key in keys {
            if let Err(err) = self.handle_key(key, shared) {
                self.composer.reset();
                if self.insert.is_some() {
                    self.finish_insert(shared)?;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    // -- Visual mode --------------------------------------------------------

    fn toggle_visual(&mut self, kind: VisualKind, shared: &mut Shared) -> EditResult<()> {
        let t = self.modes.transition(ModeEvent::EnterVisual(kind))?;
        if t.exits_visual() {
            if let Some(from) = t.from.visual_kind() {
                self.save_visual(from, shared);
            }
        } else if !t.from.is_visual() {
            self.cursor.set_anchor();
        }
        Ok(())
    }

    /// Record `<` `>` and the selection for `gv`, then drop the anchor.
    fn save_visual(&mut self, kind: VisualKind, shared: &mut Shared) {
        if let Some(anchor) = self.cursor.anchor() {
            let pos = self.cursor.position();
            let (a, b) = if anchor <= pos { (anchor, pos) } else { (pos, anchor) };
            shared.marks.set_auto(self.id, AutoMark::VisualStart, a);
            shared.marks.set_auto(self.id, AutoMark::VisualEnd, b);
            self.last_visual = Some((kind, anchor, pos));
        }
        self.cursor.clear_anchor();
    }

    /// `gv`
    fn reselect(&mut self) -> EditResult<()> {
        let (kind, anchor, pos) = self.last_visual.ok_or(MarkError::Unset)?;
        self.modes.transition(ModeEvent::EnterVisual(kind))?;
        self.cursor.set_position(pos, &self.buffer, false);
        self.cursor.set_anchor_at(self.buffer.clamp_position(anchor));
        Ok(())
    }

    fn select_object(&mut self, obj: TextObject, count: usize) -> EditResult<()> {
        let span = obj.resolve(&self.buffer, self.cursor.position(), count)?;
        let Range { start, end } = span.range;
        if span.linewise {
            if self.mode().visual_kind() != Some(VisualKind::Line) {
                self.modes.transition(ModeEvent::EnterVisual(VisualKind::Line))?;
            }
            self.cursor.set_anchor_at(Position::new(start.line, 0));
            self.cursor.set_position(Position::new(end.line, 0), &self.buffer, false);
            return Ok(());
        }
        let last = if end.col > 0 {
            end.with_col(end.col - 1)
        } else if end.line > start.line {
            let line = end.line - 1;
            Position::new(line, self.buffer.line_len(line).saturating_sub(1))
        } else {
            end
        };
        self.cursor.set_anchor_at(start);
        self.cursor.set_position(last.max(start), &self.buffer, false);
        Ok(())
    }

    // -- Edit plumbing ------------------------------------------------------

    fn begin(&mut self) {
        if self.txn.is_none() {
            self.txn = Some(Delta::new(self.cursor.position()));
        }
    }

    fn insert_text(&mut self, pos: Position, text: &str, shared: &mut Shared) -> Position {
        let end = self.buffer.insert(pos, text);
        let edit = Edit::Insert {
            pos,
            text: text.to_owned(),
        };
        self.track(&edit, shared);
        if let Some(delta) = &mut self.txn {
            delta.push(edit);
        }
        end
    }

    fn delete_range(&mut self, range: Range, shared: &mut Shared) -> String {
        let text = self.buffer.delete(range);
        if !text.is_empty() {
            let edit = Edit::Delete {
                pos: range.start,
                text: text.clone(),
            };
            self.track(&edit, shared);
            if let Some(delta) = &mut self.txn {
                delta.push(edit);
            }
        }
        text
    }

    /// Keep marks, jumps and changes attached to their text.
    fn track(&mut self, edit: &Edit, shared: &mut Shared) {
        shared.marks.apply_edit(self.id, edit, &self.buffer);
        self.jumps.apply_edit(edit, &self.buffer);
        self.changes.apply_edit(edit, &self.buffer);
    }

    /// Commit a non-insert change and remember it for `.`.
    fn finish_change(&mut self, cmd: &Command, shared: &mut Shared) {
        let repeatable = cmd.is_repeatable_change() && !self.mode().is_visual();
        self.commit_change(cmd.count, cmd.signature.clone(), repeatable, shared);
    }

    fn commit_change(
        &mut self,
        count: Option<usize>,
        keys: Vec<Key>,
        repeatable: bool,
        shared: &mut Shared,
    ) {
        let Some(mut delta) = self.txn.take() else { return };
        let tag = ChangeTag {
            count,
            keys: keys_to_string(&keys),
        };
        if repeatable {
            self.last_change = Some(LastChange { count, keys });
        }
        let Some(last) = delta.edits().last() else { return };
        let dot = last.pos();
        let end = match last {
            Edit::Insert { pos, text } => {
                let end = end_after_insert(*pos, text);
                end.with_col(end.col.saturating_sub(1))
            }
            Edit::Delete { pos, .. } => *pos,
        };
        let start = delta.edits().iter().map(Edit::pos).min().unwrap_or(dot);
        delta.set_tag(tag);
        let node = self.history.commit(delta, self.cursor.position());

        shared.marks.set_auto(self.id, AutoMark::LastChange, dot);
        shared.marks.set_auto(self.id, AutoMark::ChangeStart, start);
        shared.marks.set_auto(self.id, AutoMark::ChangeEnd, end);
        self.changes.push(dot);
        tracing::debug!(target: "editor.undo", buffer = %self.id, node, "change committed");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One past `pos`, clamped to its line: the end of an inclusive span.
fn inclusive_end(buf: &Buffer, pos: Position) -> Position {
    pos.with_col((pos.col + 1).min(buf.line_len(pos.line)))
}

/// End of the `count`th word for `cw`: a cursor already on the last char
/// of a word counts as one word.
fn change_word_end(buf: &Buffer, pos: Position, kind: WordKind, count: usize) -> Position {
    let mut end = pos;
    for i in 0..count.max(1) {
        if i == 0 && is_word_end(buf, end, kind) {
            continue;
        }
        let next = word::next_end(buf, end, kind);
        if next == end {
            break;
        }
        end = next;
    }
    end
}

fn is_word_end(buf: &Buffer, pos: Position, kind: WordKind) -> bool {
    let Some(ch) = buf.char_at(pos) else {
        return false;
    };
    let class = classify(ch, kind);
    class != CharClass::Blank
        && buf
            .char_at(pos.with_col(pos.col + 1))
            .is_none_or(|next| classify(next, kind) != class)
}

fn to_upper(c: char) -> char {
    let mut it = c.to_uppercase();
    match (it.next(), it.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

fn to_lower(c: char) -> char {
    let mut it = c.to_lowercase();
    match (it.next(), it.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn toggle_case(c: char) -> char {
    if c.is_lowercase() {
        to_upper(c)
    } else if c.is_uppercase() {
        to_lower(c)
    } else {
        c
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    fn editor(lines: &[&str]) -> (Editor, Shared) {
        (Editor::new(BufferId(1), Buffer::from_lines(lines)), Shared::default())
    }

    fn feed(ed: &mut Editor, shared: &mut Shared, keys: &str) -> EditResult<()> {
        for key in parse_keys(keys) {
            ed.handle_key(key, shared)?;
        }
        Ok(())
    }

    fn lines(ed: &Editor) -> Vec<String> {
        ed.buffer().lines()
    }

    // -- Operators ----------------------------------------------------------

    #[test]
    fn delete_word_goes_to_small_delete() {
        let (mut ed, mut sh) = editor(&["foo bar baz"]);
        feed(&mut ed, &mut sh, "dw").unwrap();
        assert_eq!(lines(&ed), vec!["bar baz"]);
        assert_eq!(sh.registers.read('-').text(), "foo ");
        assert_eq!(sh.registers.read('"').text(), "foo ");
        assert_eq!(ed.cursor().position(), p(0, 0));
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn dd_shifts_numbered_registers() {
        let (mut ed, mut sh) = editor(&["abc", "def"]);
        feed(&mut ed, &mut sh, "dd").unwrap();
        assert_eq!(lines(&ed), vec!["def"]);
        let r = sh.registers.read('1');
        assert_eq!(r.text(), "abc\n");
        assert_eq!(r.kind(), RegisterKind::Line);
        assert_eq!(ed.cursor().position(), p(0, 0));
    }

    #[test]
    fn yank_into_named_then_append() {
        let (mut ed, mut sh) = editor(&["foo bar"]);
        feed(&mut ed, &mut sh, "\"ayww\"Ayw").unwrap();
        assert_eq!(sh.registers.read('a').text(), "foo bar");
        assert_eq!(sh.registers.read('"').text(), "foo bar");
        assert!(sh.registers.read('0').is_empty());
    }

    #[test]
    fn indent_with_linewise_motion() {
        let (mut ed, mut sh) = editor(&["a", "b", "c"]);
        feed(&mut ed, &mut sh, ">j").unwrap();
        assert_eq!(lines(&ed), vec!["    a", "    b", "c"]);
        feed(&mut ed, &mut sh, "<<").unwrap();
        assert_eq!(lines(&ed), vec!["a", "    b", "c"]);
    }

    #[test]
    fn failed_motion_changes_nothing() {
        let (mut ed, mut sh) = editor(&["abc"]);
        let err = feed(&mut ed, &mut sh, "d/zzz<CR>").unwrap_err();
        assert_eq!(err, EditError::NoMatch("zzz".into()));
        assert_eq!(lines(&ed), vec!["abc"]);
        assert!(ed.history().is_empty());
        assert!(sh.registers.read('"').is_empty());
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn boundary_motion_fails() {
        let (mut ed, mut sh) = editor(&["abc"]);
        assert_eq!(feed(&mut ed, &mut sh, "h"), Err(EditError::BufferBoundary));
        assert_eq!(feed(&mut ed, &mut sh, "j"), Err(EditError::BufferBoundary));
        feed(&mut ed, &mut sh, "5l").unwrap();
        assert_eq!(ed.cursor().position(), p(0, 2));
    }

    #[test]
    fn delete_char_on_empty_line_does_nothing() {
        let (mut ed, mut sh) = editor(&[""]);
        feed(&mut ed, &mut sh, "x").unwrap();
        feed(&mut ed, &mut sh, "X").unwrap();
        assert_eq!(lines(&ed), vec![""]);
        assert!(ed.history().is_empty());
        assert!(sh.registers.read('"').is_empty());
        assert_eq!(ed.mode(), Mode::Normal);
    }

    // -- Change and insert --------------------------------------------------

    #[test]
    fn leaving_insert_sets_caret_mark() {
        let (mut ed, mut sh) = editor(&["ab"]);
        feed(&mut ed, &mut sh, "Acd<Esc>").unwrap();
        assert_eq!(sh.marks.get_mark('^', BufferId(1)), Ok((BufferId(1), p(0, 4))));
        assert_eq!(ed.cursor().position(), p(0, 3));
    }

    #[test]
    fn change_word_is_one_undo_step() {
        let (mut ed, mut sh) = editor(&["foo bar"]);
        feed(&mut ed, &mut sh, "cwxy<Esc>").unwrap();
        assert_eq!(lines(&ed), vec!["xy bar"]);
        assert_eq!(ed.cursor().position(), p(0, 1));
        feed(&mut ed, &mut sh, "u").unwrap();
        assert_eq!(lines(&ed), vec!["foo bar"]);
        assert_eq!(ed.cursor().position(), p(0, 0));
    }

    #[test]
    fn insert_count_repeats_text() {
        let (mut ed, mut sh) = editor(&[""]);
        feed(&mut ed, &mut sh, "3ix<Esc>").unwrap();
        assert_eq!(lines(&ed), vec!["xxx"]);
        assert_eq!(ed.cursor().position(), p(0, 2));
        assert_eq!(sh.marks.auto(BufferId(1), AutoMark::LastInsert), Some(p(0, 3)));
    }

    #[test]
    fn backspace_joins_lines() {
        let (mut ed, mut sh) = editor(&["ab", "cd"]);
        feed(&mut ed, &mut sh, "ji<BS><Esc>").unwrap();
        assert_eq!(lines(&ed), vec!["abcd"]);
        assert_eq!(ed.cursor().position(), p(0, 1));
    }

    #[test]
    fn replace_mode_backspace_restores() {
        let (mut ed, mut sh) = editor(&["abc"]);
        feed(&mut ed, &mut sh, "Rxy<BS><Esc>").unwrap();
        assert_eq!(lines(&ed), vec!["xbc"]);
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn change_inside_quotes() {
        let (mut ed, mut sh) = editor(&["say \"hi\" now"]);
        feed(&mut ed, &mut sh, "fhci\"yo<Esc>").unwrap();
        assert_eq!(lines(&ed), vec!["say \"yo\" now"]);
    }

    #[test]
    fn open_below_with_count() {
        let (mut ed, mut sh) = editor(&["top"]);
        feed(&mut ed, &mut sh, "2oab<Esc>").unwrap();
        assert_eq!(lines(&ed), vec!["top", "ab", "ab"]);
        assert_eq!(ed.cursor().position(), p(2, 1));
    }

    // -- Repeat -------------------------------------------------------------

    #[test]
    fn dot_repeats_last_change() {
        let (mut ed, mut sh) = editor(&["a b c d"]);
        feed(&mut ed, &mut sh, "dw.").unwrap();
        assert_eq!(lines(&ed), vec!["c d"]);
        feed(&mut ed, &mut sh, "u").unwrap();
        assert_eq!(lines(&ed), vec!["b c d"]);
    }

    #[test]
    fn dot_repeats_insert_with_new_count() {
        let (mut ed, mut sh) = editor(&[""]);
        feed(&mut ed, &mut sh, "ax<Esc>3.").unwrap();
        assert_eq!(lines(&ed), vec!["xxxx"]);
    }

    #[test]
    fn dot_without_change_fails() {
        let (mut ed, mut sh) = editor(&["abc"]);
        assert_eq!(feed(&mut ed, &mut sh, "."), Err(EditError::NothingToRepeat));
    }

    // -- Undo ---------------------------------------------------------------

    #[test]
    fn undo_line_is_its_own_node() {
        let (mut ed, mut sh) = editor(&["hello"]);
        feed(&mut ed, &mut sh, "AXY<Esc>").unwrap();
        assert_eq!(lines(&ed), vec!["helloXY"]);
        feed(&mut ed, &mut sh, "U").unwrap();
        assert_eq!(lines(&ed), vec!["hello"]);
        assert_eq!(ed.history().len(), 3);
        feed(&mut ed, &mut sh, "u").unwrap();
        assert_eq!(lines(&ed), vec!["helloXY"]);
    }

    #[test]
    fn undo_past_root_fails() {
        let (mut ed, mut sh) = editor(&["abc"]);
        feed(&mut ed, &mut sh, "x").unwrap();
        assert_eq!(
            feed(&mut ed, &mut sh, "2u"),
            Err(EditError::Undo(crate::error::UndoError::AtRoot))
        );
        assert_eq!(lines(&ed), vec!["bc"]);
    }

    // -- Put / join ---------------------------------------------------------

    #[test]
    fn put_line_below_last_line() {
        let (mut ed, mut sh) = editor(&["a", "b"]);
        feed(&mut ed, &mut sh, "yyjp").unwrap();
        assert_eq!(lines(&ed), vec!["a", "b", "a"]);
        assert_eq!(ed.cursor().position(), p(2, 0));
    }

    #[test]
    fn put_empty_register_fails() {
        let (mut ed, mut sh) = editor(&["a"]);
        assert_eq!(feed(&mut ed, &mut sh, "\"zp"), Err(EditError::EmptyRegister('z')));
    }

    #[test]
    fn join_strips_indent() {
        let (mut ed, mut sh) = editor(&["foo", "  bar"]);
        feed(&mut ed, &mut sh, "J").unwrap();
        assert_eq!(lines(&ed), vec!["foo bar"]);
        assert_eq!(ed.cursor().position(), p(0, 3));
    }

    // -- Visual -------------------------------------------------------------

    #[test]
    fn visual_lowercase() {
        let (mut ed, mut sh) = editor(&["ABCD"]);
        feed(&mut ed, &mut sh, "vlu").unwrap();
        assert_eq!(lines(&ed), vec!["abCD"]);
        assert_eq!(ed.mode(), Mode::Normal);
        assert_eq!(sh.marks.auto(BufferId(1), AutoMark::VisualEnd), Some(p(0, 1)));
    }

    #[test]
    fn visual_block_yank_and_put() {
        let (mut ed, mut sh) = editor(&["abc", "def"]);
        feed(&mut ed, &mut sh, "<C-v>jly").unwrap();
        let r = sh.registers.read('"');
        assert_eq!(r.text(), "ab\nde");
        assert_eq!(r.kind(), RegisterKind::Block);
        feed(&mut ed, &mut sh, "P").unwrap();
        assert_eq!(lines(&ed), vec!["ababc", "dedef"]);
    }

    #[test]
    fn visual_replace_char() {
        let (mut ed, mut sh) = editor(&["abcd"]);
        feed(&mut ed, &mut sh, "lvlrx").unwrap();
        assert_eq!(lines(&ed), vec!["axxd"]);
    }

    #[test]
    fn same_visual_key_leaves() {
        let (mut ed, mut sh) = editor(&["abc"]);
        feed(&mut ed, &mut sh, "Vj").unwrap_err();
        assert_eq!(ed.mode(), Mode::Visual(VisualKind::Line));
        feed(&mut ed, &mut sh, "V").unwrap();
        assert_eq!(ed.mode(), Mode::Normal);
        assert_eq!(ed.selection(), None);
    }

    // -- Marks and jumps ----------------------------------------------------

    #[test]
    fn marks_follow_deleted_lines() {
        let (mut ed, mut sh) = editor(&["a", "b", "c"]);
        feed(&mut ed, &mut sh, "jjmaggdd").unwrap();
        assert_eq!(sh.marks.get_mark('a', BufferId(1)), Ok((BufferId(1), p(1, 0))));
        feed(&mut ed, &mut sh, "jdd").unwrap();
        assert_eq!(sh.marks.get_mark('a', BufferId(1)), Err(MarkError::Unset));
    }

    #[test]
    fn jump_sets_previous_mark() {
        let (mut ed, mut sh) = editor(&["a", "b", "c"]);
        feed(&mut ed, &mut sh, "G").unwrap();
        assert_eq!(ed.cursor().line(), 2);
        feed(&mut ed, &mut sh, "''").unwrap();
        assert_eq!(ed.cursor().line(), 0);
        feed(&mut ed, &mut sh, "<C-o>").unwrap();
        assert_eq!(ed.cursor().line(), 2);
    }
}
