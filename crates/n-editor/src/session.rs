//! Session — all open buffers and the state they share.
//!
//! The session is the only owner of mutable editor state. Each buffer has
//! its own [`Editor`]; registers, marks, the last search, macros and options
//! live in [`Shared`] and are lent to whichever editor handles the key.
//!
//! # Key flow
//!
//! ```text
//! feed_key ─▶ macro capture ─▶ active Editor::handle_key
//!                                   │
//!                ┌──────────────────┘
//!                ▼
//!        macro queue non-empty? ── yes ─▶ handle next queued key
//!                │ no
//!                ▼
//!              done
//! ```
//!
//! `@x` only queues keys; the loop here drains the queue, so macros that
//! play macros never recurse. The first error drains the rest of the queue
//! and comes back as [`EditError::MacroAborted`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::editor::{Editor, Effect, Shared};
use crate::error::{EditError, EditResult, MarkError};
use crate::history::NodeId;
use crate::key::{Key, keys_to_string, parse_keys};
use crate::location::{Location, LocationList};
use crate::mark::AutoMark;
use crate::mode::Mode;
use crate::options::OptionError;
use crate::persist::{FileState, GlobalMarkState, SessionState};
use crate::position::{Position, Range};

/// Identity of an open buffer. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the render side needs after a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub buffer: BufferId,
    pub mode: Mode,
    pub cursor: Position,
    pub selection: Option<Range>,
    pub first_line: usize,
    pub lines: Vec<String>,
    /// Register being recorded into.
    pub recording: Option<char>,
    /// Keys of a half-typed command.
    pub pending: String,
}

/// Work applied to every buffer of a scope (`:bufdo`, `:windo`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopedAction {
    /// Keys in `<Esc>` notation.
    Keys(String),
    Macro { register: char, count: usize },
}

/// Per-buffer outcome of [`Session::run_in_scope`].
#[derive(Debug, Default)]
pub struct ScopeReport {
    pub results: Vec<(BufferId, EditResult<()>)>,
    /// The cancel callback stopped the scope before every buffer ran.
    pub cancelled: bool,
}

impl ScopeReport {
    #[must_use]
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Session {
    editors: BTreeMap<BufferId, Editor>,
    active: BufferId,
    next_id: u32,
    shared: Shared,
    locations: LocationList,
    /// Imported file state waiting for its file to be opened.
    restore: HashMap<PathBuf, FileState>,
    /// Imported global marks waiting for their file.
    pending_marks: Vec<GlobalMarkState>,
    /// State of closed file buffers, kept for export.
    closed: HashMap<BufferId, FileState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session with one empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        let mut session = Self {
            editors: BTreeMap::new(),
            active: BufferId(0),
            next_id: 1,
            shared: Shared::default(),
            locations: LocationList::default(),
            restore: HashMap::new(),
            pending_marks: Vec::new(),
            closed: HashMap::new(),
        };
        session.open_buffer(Buffer::new());
        session
    }

    // -- Buffers ------------------------------------------------------------

    /// Add `buffer` and make it active.
    pub fn open_buffer(&mut self, buffer: Buffer) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.editors.insert(id, Editor::new(id, buffer));
        self.active = id;
        tracing::debug!(target: "editor.session", buffer = %id, "buffer opened");
        id
    }

    /// Open `path` (empty if it does not exist yet) and make it active.
    /// Imported state for the file is applied.
    ///
    /// # Errors
    ///
    /// `Io` if the file exists but cannot be read.
    pub fn open_file(&mut self, path: &Path) -> EditResult<BufferId> {
        let path = absolute(path);
        let buffer = Buffer::from_file(&path)?;
        let id = self.open_buffer(buffer);
        self.restore_file(id, &path);
        Ok(id)
    }

    /// Apply imported history, `"` mark and global marks for `path`.
    fn restore_file(&mut self, id: BufferId, path: &Path) {
        let Some(editor) = self.editors.get_mut(&id) else { return };
        if let Some(state) = self.restore.remove(path) {
            let last = editor.buffer().clamp_position(state.last_position);
            self.shared.marks.set_auto(id, AutoMark::LastExit, last);
            match state.history {
                Some(history) if state.fingerprint == editor.buffer().fingerprint() => {
                    editor.restore_history(history);
                    tracing::debug!(target: "editor.session", buffer = %id, "undo history restored");
                }
                Some(_) => {
                    tracing::debug!(target: "editor.session", buffer = %id, "file changed, undo history dropped");
                }
                None => {}
            }
        }
        let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_marks)
            .into_iter()
            .partition(|m| m.path == path);
        self.pending_marks = rest;
        for mark in mine {
            let pos = editor.buffer().clamp_position(mark.position);
            if let Err(err) = self.shared.marks.set_mark(mark.key, id, pos) {
                tracing::debug!(target: "editor.session", key = %mark.key, error = %err, "global mark skipped");
            }
        }
    }

    /// Make `id` the active buffer.
    ///
    /// # Errors
    ///
    /// `NoSuchBuffer` if it is not open.
    pub fn switch_to(&mut self, id: BufferId) -> EditResult<()> {
        if !self.editors.contains_key(&id) {
            return Err(EditError::NoSuchBuffer(id));
        }
        self.active = id;
        Ok(())
    }

    /// Close `id`. Global marks into it become dangling. Closing the last
    /// buffer leaves a fresh scratch buffer.
    ///
    /// # Errors
    ///
    /// `NoSuchBuffer` if it is not open.
    pub fn close_buffer(&mut self, id: BufferId) -> EditResult<()> {
        let editor = self.editors.remove(&id).ok_or(EditError::NoSuchBuffer(id))?;
        let last = editor.cursor().position();
        self.shared.marks.close_buffer(id, last);
        if let Some(path) = editor.buffer().path() {
            self.closed.insert(id, file_state(&editor, path, last));
        }
        if self.active == id {
            match self.editors.keys().next_back().copied() {
                Some(next) => self.active = next,
                None => {
                    self.open_buffer(Buffer::new());
                }
            }
        }
        tracing::debug!(target: "editor.session", buffer = %id, "buffer closed");
        Ok(())
    }

    #[must_use]
    pub const fn active(&self) -> BufferId {
        self.active
    }

    /// Open buffers in creation order.
    #[must_use]
    pub fn buffers(&self) -> Vec<BufferId> {
        self.editors.keys().copied().collect()
    }

    #[must_use]
    pub fn editor(&self, id: BufferId) -> Option<&Editor> {
        self.editors.get(&id)
    }

    #[must_use]
    pub fn editor_mut(&mut self, id: BufferId) -> Option<&mut Editor> {
        self.editors.get_mut(&id)
    }

    /// The active editor.
    ///
    /// # Panics
    ///
    /// Never: the active buffer is always open.
    #[must_use]
    pub fn current(&self) -> &Editor {
        &self.editors[&self.active]
    }

    #[must_use]
    pub const fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Change shared state directly (preload registers, adjust options).
    /// The numbered-register depth is brought back in line with
    /// `regdepth` afterwards.
    pub fn update_shared<T>(&mut self, f: impl FnOnce(&mut Shared) -> T) -> T {
        let out = f(&mut self.shared);
        self.sync_register_depth();
        out
    }

    fn sync_register_depth(&mut self) {
        let depth = self.shared.options.regdepth;
        if self.shared.registers.depth() != depth {
            self.shared.registers.set_depth(depth);
        }
    }

    /// Apply a `:set` style directive list. The register depth follows
    /// `regdepth`.
    ///
    /// # Errors
    ///
    /// Whatever [`Options::set`](crate::options::Options::set) rejects.
    pub fn set_option(&mut self, args: &str) -> Result<Vec<String>, OptionError> {
        let shown = self.shared.options.set(args)?;
        self.sync_register_depth();
        Ok(shown)
    }

    // -- Keys ---------------------------------------------------------------

    /// Handle a key typed by the user.
    ///
    /// # Errors
    ///
    /// The first [`EditError`] of the key or of the macro keys it queued;
    /// macro failures come back as `MacroAborted`.
    pub fn feed_key(&mut self, key: Key) -> EditResult<()> {
        self.shared.macros.capture(key);
        self.run_key(key)
    }

    /// Feed keys in `<Esc>` notation, stopping at the first error.
    ///
    /// # Errors
    ///
    /// See [`feed_key`](Self::feed_key).
    pub fn feed_keys(&mut self, keys: &str) -> EditResult<()> {
        for key in parse_keys(keys) {
            self.feed_key(key)?;
        }
        Ok(())
    }

    /// Dispatch `key`, then every key it queued.
    fn run_key(&mut self, key: Key) -> EditResult<()> {
        let mut result = self.dispatch(key);
        while result.is_ok() {
            let Some(next) = self.shared.macros.next_key() else { break };
            result = self.dispatch(next);
        }
        result.map_err(|err| self.shared.macros.abort(err))
    }

    fn dispatch(&mut self, key: Key) -> EditResult<()> {
        let editor = self
            .editors
            .get_mut(&self.active)
            .ok_or(EditError::NoSuchBuffer(self.active))?;
        match editor.handle_key(key, &mut self.shared)? {
            Effect::None => Ok(()),
            Effect::SwitchBuffer { buffer, pos, exact } => self.land(buffer, pos, exact),
        }
    }

    /// Finish a jump into another buffer.
    fn land(&mut self, buffer: BufferId, pos: Position, exact: bool) -> EditResult<()> {
        let editor = self
            .editors
            .get_mut(&buffer)
            .ok_or(EditError::Mark(MarkError::Dangling))?;
        editor.land(pos, exact);
        self.active = buffer;
        tracing::debug!(target: "editor.session", buffer = %buffer, %pos, "switched buffer");
        Ok(())
    }

    /// `:earlier`: put the active buffer back to how it was `ago` before now.
    pub fn earlier(&mut self, ago: Duration) {
        if let Some(editor) = self.editors.get_mut(&self.active) {
            editor.earlier(ago, &mut self.shared);
        }
    }

    /// `:undo {n}` in the active buffer.
    ///
    /// # Errors
    ///
    /// `Undo(AtLeaf)` if change `node` does not exist.
    pub fn goto_change(&mut self, node: NodeId) -> EditResult<()> {
        let editor = self
            .editors
            .get_mut(&self.active)
            .ok_or(EditError::NoSuchBuffer(self.active))?;
        editor.goto_change(node, &mut self.shared)
    }

    // -- Render -------------------------------------------------------------

    /// A read-only view of the active buffer: `height` lines from
    /// `first_line`.
    #[must_use]
    pub fn snapshot(&self, first_line: usize, height: usize) -> Snapshot {
        let editor = self.current();
        let buffer = editor.buffer();
        let end = first_line.saturating_add(height).min(buffer.line_count());
        Snapshot {
            buffer: self.active,
            mode: editor.mode(),
            cursor: editor.cursor().position(),
            selection: editor.selection(),
            first_line,
            lines: (first_line..end).map(|l| buffer.line_text(l)).collect(),
            recording: self.shared.macros.recording(),
            pending: keys_to_string(editor.pending_keys()),
        }
    }

    // -- Batch --------------------------------------------------------------

    /// Run `action` in each buffer of `scope`, one after the other.
    ///
    /// Each buffer starts and ends in normal mode. A failure is reported
    /// for its buffer and the scope moves on; `cancel` is asked before each
    /// buffer and stops the scope when it returns true. The active buffer is
    /// restored afterwards. Keys run here are never recorded into a macro.
    pub fn run_in_scope(
        &mut self,
        scope: &[BufferId],
        action: &ScopedAction,
        mut cancel: impl FnMut() -> bool,
    ) -> ScopeReport {
        let original = self.active;
        let mut report = ScopeReport::default();
        for &id in scope {
            if cancel() {
                report.cancelled = true;
                break;
            }
            let Some(editor) = self.editors.get_mut(&id) else {
                report.results.push((id, Err(EditError::NoSuchBuffer(id))));
                continue;
            };
            editor.reset_pending(&mut self.shared);
            self.active = id;

            let result = match action {
                ScopedAction::Keys(keys) => parse_keys(keys)
                    .into_iter()
                    .try_for_each(|key| self.run_key(key)),
                ScopedAction::Macro { register, count } => self
                    .shared
                    .macros
                    .play(*register, *count, &self.shared.registers)
                    .and_then(|()| self.drain_queue()),
            };
            if let Some(editor) = self.editors.get_mut(&id) {
                editor.reset_pending(&mut self.shared);
            }
            tracing::debug!(target: "editor.session", buffer = %id, ok = result.is_ok(), "scope step");
            report.results.push((id, result));
        }
        if self.editors.contains_key(&original) {
            self.active = original;
        }
        report
    }

    fn drain_queue(&mut self) -> EditResult<()> {
        while let Some(key) = self.shared.macros.next_key() {
            if let Err(err) = self.dispatch(key) {
                return Err(self.shared.macros.abort(err));
            }
        }
        Ok(())
    }

    // -- Locations ----------------------------------------------------------

    /// Replace the location list.
    pub fn set_locations(&mut self, items: Vec<Location>) {
        tracing::debug!(target: "editor.session", count = items.len(), "locations set");
        self.locations = LocationList::new(items);
    }

    #[must_use]
    pub const fn locations(&self) -> &LocationList {
        &self.locations
    }

    /// Jump to the next location.
    ///
    /// # Errors
    ///
    /// `BufferBoundary` past the last entry, `NoSuchBuffer` if the entry's
    /// buffer is not open.
    pub fn location_next(&mut self) -> EditResult<Location> {
        let loc = self.locations.next().cloned().ok_or(EditError::BufferBoundary)?;
        self.goto_location(loc)
    }

    /// Jump to the previous location.
    ///
    /// # Errors
    ///
    /// As [`location_next`](Self::location_next).
    pub fn location_prev(&mut self) -> EditResult<Location> {
        let loc = self.locations.prev().cloned().ok_or(EditError::BufferBoundary)?;
        self.goto_location(loc)
    }

    /// Jump to location `index`.
    ///
    /// # Errors
    ///
    /// As [`location_next`](Self::location_next).
    pub fn location_jump(&mut self, index: usize) -> EditResult<Location> {
        let loc = self.locations.select(index).cloned().ok_or(EditError::BufferBoundary)?;
        self.goto_location(loc)
    }

    fn goto_location(&mut self, loc: Location) -> EditResult<Location> {
        if !self.editors.contains_key(&loc.buffer) {
            return Err(EditError::NoSuchBuffer(loc.buffer));
        }
        if let Some(editor) = self.editors.get_mut(&self.active) {
            editor.push_jump(&mut self.shared.marks);
        }
        self.land(loc.buffer, loc.position, true)?;
        Ok(loc)
    }

    // -- Persistence --------------------------------------------------------

    /// Set every buffer's `"` mark and export the session.
    pub fn shutdown(&mut self) -> SessionState {
        for (id, editor) in &self.editors {
            self.shared.marks.set_auto(*id, AutoMark::LastExit, editor.cursor().position());
        }
        self.export_state()
    }

    /// State worth keeping across restarts: per-file undo trees and last
    /// positions, and the most recent global marks.
    #[must_use]
    pub fn export_state(&self) -> SessionState {
        let mut state = SessionState::new();
        let mut paths: HashMap<BufferId, PathBuf> = HashMap::new();
        for (id, editor) in &self.editors {
            let Some(path) = editor.buffer().path() else { continue };
            paths.insert(*id, path.to_path_buf());
            state.files.push(file_state(editor, path, editor.cursor().position()));
        }
        for (id, file) in &self.closed {
            paths.insert(*id, file.path.clone());
            if !state.files.iter().any(|f| f.path == file.path) {
                state.files.push(file.clone());
            }
        }
        for file in self.restore.values() {
            if !state.files.iter().any(|f| f.path == file.path) {
                state.files.push(file.clone());
            }
        }

        let limit = self.shared.options.markhistory;
        for (key, buffer, position) in self.shared.marks.recent_global_marks(limit) {
            if let Some(path) = paths.get(&buffer) {
                state.global_marks.push(GlobalMarkState {
                    key,
                    path: path.clone(),
                    position,
                });
            }
        }
        for mark in &self.pending_marks {
            if state.global_marks.len() >= limit {
                break;
            }
            if !state.global_marks.iter().any(|m| m.key == mark.key) {
                state.global_marks.push(mark.clone());
            }
        }
        tracing::debug!(target: "editor.session", files = state.files.len(), marks = state.global_marks.len(), "state exported");
        state
    }

    /// Take in state from an earlier session. Files already open get theirs
    /// at once; others when they are opened.
    pub fn import_state(&mut self, state: SessionState) {
        for file in state.files {
            self.restore.insert(file.path.clone(), file);
        }
        self.pending_marks = state.global_marks;
        let open: Vec<(BufferId, PathBuf)> = self
            .editors
            .iter()
            .filter_map(|(id, e)| e.buffer().path().map(|p| (*id, p.to_path_buf())))
            .collect();
        for (id, path) in open {
            self.restore_file(id, &path);
        }
    }
}

fn file_state(editor: &Editor, path: &Path, last_position: Position) -> FileState {
    FileState {
        path: path.to_path_buf(),
        fingerprint: editor.buffer().fingerprint(),
        last_position,
        history: Some(editor.history().clone()),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
