//! Macro engine — register-backed recording and queued playback.
//!
//! `q{reg}` starts recording the keys the user types; `q` stops and stores
//! them in the register as key notation. `@{reg}` reads the register *at
//! that moment*, parses it back into keys and pushes them onto the front of
//! the input queue, so a macro that calls another macro (or itself) just
//! queues more keys. The session pops keys from the queue until it is
//! empty; nothing recurses on the native stack.
//!
//! The first failing command during playback drains the whole queue.
//! Changes made before the failure stay.

use std::collections::VecDeque;

use crate::error::{EditError, EditResult};
use crate::key::{Key, keys_to_string, parse_keys};
use crate::register::{RegisterKind, RegisterStore, WriteMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Queued {
    Key(Key),
    /// One iteration of the outermost `@` finished.
    IterationEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Playback {
    register: char,
    completed: usize,
}

/// Recording state and the playback queue.
#[derive(Debug, Default, Clone)]
pub struct MacroEngine {
    recording: Option<(char, Vec<Key>)>,
    queue: VecDeque<Queued>,
    playback: Option<Playback>,
    last_played: Option<char>,
}

impl MacroEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Recording ----------------------------------------------------------

    /// The register being recorded into.
    #[must_use]
    pub fn recording(&self) -> Option<char> {
        self.recording.as_ref().map(|(reg, _)| *reg)
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Start recording into `key`. Uppercase keys fold to lowercase:
    /// recording always overwrites.
    ///
    /// # Errors
    ///
    /// `InvalidComposition` if `key` cannot hold a recording.
    pub fn start_recording(&mut self, key: char) -> EditResult<()> {
        if !matches!(key, 'a'..='z' | 'A'..='Z' | '0'..='9' | '"') {
            return Err(EditError::invalid(format!("q{key}")));
        }
        let key = key.to_ascii_lowercase();
        self.recording = Some((key, Vec::new()));
        tracing::debug!(target: "editor.macro", register = %key, "recording");
        Ok(())
    }

    /// Record a key typed by the user. Keys replayed from the queue never
    /// reach this.
    pub fn capture(&mut self, key: Key) {
        if let Some((_, keys)) = &mut self.recording {
            keys.push(key);
        }
    }

    /// Stop recording and store the keys in the register. A `q` typed by
    /// the user is the last captured key and is left out; a `q` replayed
    /// from the queue was never captured. Returns the register and the
    /// stored notation.
    pub fn stop_recording(&mut self, registers: &mut RegisterStore) -> Option<(char, String)> {
        let (register, mut keys) = self.recording.take()?;
        if !self.is_playing() && keys.last() == Some(&Key::Char('q')) {
            keys.pop();
        }
        let text = keys_to_string(&keys);
        let written = registers.write(register, text.clone(), RegisterKind::Char, WriteMode::Overwrite);
        debug_assert!(written.is_ok(), "recording register {register:?} rejected");
        tracing::debug!(target: "editor.macro", register = %register, keys = %text, "recorded");
        Some((register, text))
    }

    // -- Playback -----------------------------------------------------------

    /// Queue `count` runs of the macro in `key`. `@` replays the register
    /// played last.
    ///
    /// # Errors
    ///
    /// `NothingToRepeat` for `@@` before any `@`, `EmptyRegister` if the
    /// register holds nothing (unless recording, where an empty register
    /// plays nothing), `InvalidComposition` for a key that names no
    /// register.
    pub fn play(&mut self, key: char, count: usize, registers: &RegisterStore) -> EditResult<()> {
        let key = if key == '@' {
            self.last_played.ok_or(EditError::NothingToRepeat)?
        } else {
            key
        };
        if !RegisterStore::is_valid_key(key) || key == '_' {
            return Err(EditError::invalid(format!("@{key}")));
        }
        let register = registers.read(key);
        if register.is_empty() {
            if self.is_recording() {
                tracing::trace!(target: "editor.macro", register = %key, "empty register while recording");
                return Ok(());
            }
            return Err(EditError::EmptyRegister(key));
        }
        let keys = parse_keys(register.text());

        let outermost = self.playback.is_none();
        if outermost {
            self.playback = Some(Playback { register: key, completed: 0 });
        }
        let count = count.max(1);
        let mut run = Vec::with_capacity((keys.len() + 1) * count);
        for _ in 0..count {
            run.extend(keys.iter().copied().map(Queued::Key));
            if outermost {
                run.push(Queued::IterationEnd);
            }
        }
        for item in run.into_iter().rev() {
            self.queue.push_front(item);
        }
        self.last_played = Some(key);
        tracing::debug!(target: "editor.macro", register = %key, count, queued = self.queue.len(), "play");
        Ok(())
    }

    /// Next queued key. Returns `None` once playback is over.
    pub fn next_key(&mut self) -> Option<Key> {
        loop {
            match self.queue.pop_front() {
                Some(Queued::Key(key)) => return Some(key),
                Some(Queued::IterationEnd) => {
                    if let Some(playback) = &mut self.playback {
                        playback.completed += 1;
                    }
                }
                None => {
                    self.playback = None;
                    return None;
                }
            }
        }
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// Drop everything still queued and wrap `source` in `MacroAborted`.
    pub fn abort(&mut self, source: EditError) -> EditError {
        let dropped = self.queue.len();
        self.queue.clear();
        match self.playback.take() {
            Some(Playback { register, completed }) => {
                tracing::debug!(target: "editor.macro", register = %register, completed, dropped, error = %source, "aborted");
                EditError::MacroAborted {
                    register,
                    completed,
                    source: Box::new(source),
                }
            }
            None => source,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
