//! Error taxonomy for the editing core.
//!
//! Every error here is recoverable: it aborts the command in progress and
//! leaves buffer, registers, marks and history exactly as they were. Callers
//! receive them as [`EditResult`] values; the status line shows the
//! `Display` text.

use thiserror::Error;

use crate::session::BufferId;

/// Result alias used throughout the crate.
pub type EditResult<T> = Result<T, EditError>;

/// Failure reading or writing a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarkError {
    #[error("mark not set")]
    Unset,
    /// A global mark whose buffer has been closed.
    #[error("mark points into a closed buffer")]
    Dangling,
    /// Automatic marks are maintained by the editor and cannot be set by hand.
    #[error("mark is read-only")]
    ReadOnly,
    #[error("invalid mark name")]
    Invalid,
}

/// Failure moving through the undo tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UndoError {
    #[error("already at oldest change")]
    AtRoot,
    #[error("already at newest change")]
    AtLeaf,
    #[error("line has no changes to undo")]
    LineUnchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("pattern not found: {0}")]
    NoMatch(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("no previous search pattern")]
    NoPreviousPattern,

    /// A find-character motion (`f`, `t`, ...) found no occurrence on the line.
    #[error("character not found: {0:?}")]
    NotFound(char),

    #[error("no enclosing text object")]
    NoEnclosingObject,

    #[error(transparent)]
    Mark(#[from] MarkError),

    #[error(transparent)]
    Undo(#[from] UndoError),

    #[error("invalid command: {0}")]
    InvalidComposition(String),

    /// A motion that cannot move at all.
    #[error("at buffer boundary")]
    BufferBoundary,

    #[error("register {0:?} is empty")]
    EmptyRegister(char),

    #[error("no change to repeat")]
    NothingToRepeat,

    #[error("no such buffer: {0}")]
    NoSuchBuffer(BufferId),

    #[error("{0}")]
    Io(String),

    /// Macro playback stopped at a failing command. Changes made by the
    /// iterations before the failure are kept.
    #[error("macro @{register} aborted after {completed} iteration(s): {source}")]
    MacroAborted {
        register: char,
        completed: usize,
        source: Box<EditError>,
    },
}

impl EditError {
    pub(crate) fn invalid(keys: impl Into<String>) -> Self {
        Self::InvalidComposition(keys.into())
    }
}

impl From<std::io::Error> for EditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_display_their_source() {
        let err = EditError::from(MarkError::Dangling);
        assert_eq!(err.to_string(), "mark points into a closed buffer");

        let err = EditError::from(UndoError::AtRoot);
        assert_eq!(err.to_string(), "already at oldest change");
    }

    #[test]
    fn macro_abort_mentions_progress() {
        let err = EditError::MacroAborted {
            register: 'q',
            completed: 3,
            source: Box::new(EditError::BufferBoundary),
        };
        assert_eq!(
            err.to_string(),
            "macro @q aborted after 3 iteration(s): at buffer boundary"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(EditError::from(io), EditError::Io("gone".to_string()));
    }
}
