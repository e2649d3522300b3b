//! Session state that outlives the process.
//!
//! At shutdown the session exports a [`SessionState`]: the undo tree of
//! every file-backed buffer, the last cursor position in each file (the `"`
//! mark) and the most recently set global marks. Files are identified by
//! path; a saved undo tree is only reattached if the file's content still
//! has the fingerprint it had when the tree was saved.
//!
//! The state is stored as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EditError, EditResult};
use crate::history::UndoTree;
use crate::position::Position;

/// Format version written to every state file.
pub const STATE_VERSION: u32 = 1;

/// Everything remembered about one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileState {
    pub path: PathBuf,
    /// [`Buffer::fingerprint`](crate::buffer::Buffer::fingerprint) of the
    /// text the history ends in.
    pub fingerprint: u64,
    pub last_position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<UndoTree>,
}

/// A global mark, keyed by the path of its file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalMarkState {
    pub key: char,
    pub path: PathBuf,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    #[serde(default)]
    pub files: Vec<FileState>,
    /// Most recent first.
    #[serde(default)]
    pub global_marks: Vec<GlobalMarkState>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: STATE_VERSION,
            files: Vec::new(),
            global_marks: Vec::new(),
        }
    }

    #[must_use]
    pub fn file(&self, path: &Path) -> Option<&FileState> {
        self.files.iter().find(|f| f.path == path)
    }

    /// # Errors
    ///
    /// `Io` if serialization fails.
    pub fn to_json(&self) -> EditResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EditError::Io(e.to_string()))
    }

    /// # Errors
    ///
    /// `Io` for malformed JSON or a state written by another format version.
    pub fn from_json(text: &str) -> EditResult<Self> {
        let state: Self = serde_json::from_str(text).map_err(|e| EditError::Io(e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(EditError::Io(format!(
                "unsupported session state version {}",
                state.version
            )));
        }
        Ok(state)
    }

    /// Read a state file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> EditResult<Self> {
        let text = fs::read_to_string(path)?;
        let state = Self::from_json(&text)?;
        tracing::debug!(target: "editor.session", path = %path.display(), files = state.files.len(), "state loaded");
        Ok(state)
    }

    /// Write the state file, replacing any previous one.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be written.
    pub fn save(&self, path: &Path) -> EditResult<()> {
        fs::write(path, self.to_json()?)?;
        tracing::debug!(target: "editor.session", path = %path.display(), files = self.files.len(), "state saved");
        Ok(())
    }
}
