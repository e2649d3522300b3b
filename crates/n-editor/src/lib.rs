//! # n-editor — Modal editing core
//!
//! The command and state core of a Vim-style editor, with no terminal or
//! rendering attached:
//!
//! - **[`position`]** — `Position` (line, col) and `Range` types, 0-indexed
//! - **[`buffer`]** — `Buffer` wrapping a rope with editing, file I/O, and metadata
//! - **[`key`]** — input keys and `<Esc>`-style key notation
//! - **[`mode`]** — the mode state machine (`Normal`, `Insert`, `Visual`, pending states)
//! - **[`cursor`]** / **[`word`]** / **[`text_object`]** — motions and text objects
//! - **[`command`]** / **[`composer`]** — keys in, parsed commands out
//! - **[`register`]** — unnamed, named, numbered and special registers
//! - **[`mark`]** / **[`jumplist`]** — marks, jump list and change list
//! - **[`history`]** — the branching undo tree
//! - **[`search`]** — regex search with case, wrap and literal modes
//! - **[`macros`]** — recording and queued playback
//! - **[`options`]** — `:set`-style configuration
//! - **[`editor`]** — one buffer's editing state and command execution
//! - **[`session`]** — all buffers plus shared state; the public entry point
//! - **[`location`]** / **[`persist`]** — external location lists and saved session state
//! - **[`error`]** — the `EditError` taxonomy
//!
//! ```text
//! Session::feed_key ─▶ Editor ─▶ Composer ─▶ Command ─▶ execute
//!                         │                               │
//!                         └── ModeMachine        Buffer, UndoTree, Shared
//! ```

pub mod buffer;
pub mod command;
pub mod composer;
pub mod cursor;
pub mod editor;
pub mod error;
pub mod history;
pub mod jumplist;
pub mod key;
pub mod location;
pub mod macros;
pub mod mark;
pub mod mode;
pub mod options;
pub mod persist;
pub mod position;
pub mod register;
pub mod search;
pub mod session;
pub mod text_object;
pub mod word;

pub use buffer::Buffer;
pub use error::{EditError, EditResult};
pub use key::Key;
pub use mode::Mode;
pub use position::{Position, Range};
pub use session::{BufferId, Session};
