//! Undo tree — branching, time-travelable edit history.
//!
//! Every buffer change is recorded as a reversible [`Edit`]; the edits of one
//! command are grouped into a [`Delta`] and committed as one node of the
//! [`UndoTree`]. Nodes live in an arena (`Vec<Node>`) and refer to each other
//! by [`NodeId`], which doubles as the creation sequence number: node `0` is
//! the root (the buffer as loaded), node `n` is the state after the `n`th
//! change.
//!
//! | Operation | Walks |
//! |-----------|-------|
//! | [`undo`](UndoTree::undo) / [`redo`](UndoTree::redo) | parent / newest child |
//! | [`go_older`](UndoTree::go_older) / [`go_newer`](UndoTree::go_newer) | creation order, across branches |
//! | [`seek_time`](UndoTree::seek_time) | newest node at or before a time |
//! | [`undo_line`](UndoTree::undo_line) | current node's edits on one line |
//!
//! Navigation never touches the buffer. It returns a [`Replay`]: the edits
//! that take the buffer from the current state to the target state, in
//! application order, plus the cursor to restore. The caller applies them
//! (keeping marks in step) and the tree has already moved.
//!
//! Nodes are never removed. An edit made after an undo starts a new branch;
//! the abandoned branch stays reachable through `go_older`/`go_newer`.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::buffer::{Buffer, end_after_insert};
use crate::error::UndoError;
use crate::position::{Position, Range};

/// Index of a node in the arena, and its creation sequence number.
pub type NodeId = usize;

/// The root node: the buffer before any recorded change.
pub const ROOT: NodeId = 0;

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// A single reversible buffer edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edit {
    /// `text` was inserted at `pos`.
    Insert { pos: Position, text: String },

    /// `text` was deleted starting at `pos`.
    Delete { pos: Position, text: String },
}

impl Edit {
    /// The edit that reverses this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Insert { pos, text } => Self::Delete {
                pos: *pos,
                text: text.clone(),
            },
            Self::Delete { pos, text } => Self::Insert {
                pos: *pos,
                text: text.clone(),
            },
        }
    }

    /// Perform the edit on `buf`.
    ///
    /// # Panics
    ///
    /// Panics if the edit does not fit the buffer, which means the history
    /// and the buffer have diverged.
    pub fn apply(&self, buf: &mut Buffer) {
        match self {
            Self::Insert { pos, text } => {
                buf.insert(*pos, text);
            }
            Self::Delete { pos, text } => {
                let end = end_after_insert(*pos, text);
                buf.delete(Range::new(*pos, end));
            }
        }
    }

    #[must_use]
    pub const fn pos(&self) -> Position {
        match self {
            Self::Insert { pos, .. } | Self::Delete { pos, .. } => *pos,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Insert { text, .. } | Self::Delete { text, .. } => text,
        }
    }

    /// True if the edit adds or removes line breaks.
    #[must_use]
    pub fn changes_line_count(&self) -> bool {
        self.text().contains('\n')
    }
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// What a node was created by, for repeating it with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTag {
    pub count: Option<usize>,
    /// The command's keys without the count, in key notation.
    pub keys: String,
}

/// The edits of one command, collected while the command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    edits: Vec<Edit>,
    cursor_before: Position,
    tag: Option<ChangeTag>,
}

impl Delta {
    #[must_use]
    pub const fn new(cursor_before: Position) -> Self {
        Self {
            edits: Vec::new(),
            cursor_before,
            tag: None,
        }
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn set_tag(&mut self, tag: ChangeTag) {
        self.tag = Some(tag);
    }

    #[must_use]
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    #[must_use]
    pub const fn cursor_before(&self) -> Position {
        self.cursor_before
    }
}

// ---------------------------------------------------------------------------
// Node / Replay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    edits: Vec<Edit>,
    cursor_before: Position,
    cursor_after: Position,
    timestamp: SystemTime,
    tag: Option<ChangeTag>,
}

/// The result of moving through the tree: apply `edits` in order, then put
/// the cursor at `cursor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub edits: Vec<Edit>,
    pub cursor: Position,
    pub target: NodeId,
}

// ---------------------------------------------------------------------------
// UndoTree
// ---------------------------------------------------------------------------

/// Branching undo history for one buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoTree {
    nodes: Vec<Node>,
    current: NodeId,
}

impl UndoTree {
    /// A tree holding only the root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                edits: Vec::new(),
                cursor_before: Position::ZERO,
                cursor_after: Position::ZERO,
                timestamp: SystemTime::now(),
                tag: None,
            }],
            current: ROOT,
        }
    }

    // -- Queries ------------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn current(&self) -> NodeId {
        self.current
    }

    /// Number of nodes, root included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing has been committed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&ChangeTag> {
        self.nodes.get(id).and_then(|n| n.tag.as_ref())
    }

    #[must_use]
    pub fn timestamp(&self, id: NodeId) -> Option<SystemTime> {
        self.nodes.get(id).map(|n| n.timestamp)
    }

    // -- Recording ----------------------------------------------------------

    /// Record a change as a new child of the current node, which becomes
    /// current. Returns the new node's id.
    pub fn commit(&mut self, delta: Delta, cursor_after: Position) -> NodeId {
        self.commit_at(delta, cursor_after, SystemTime::now())
    }

    /// [`commit`](Self::commit) with an explicit timestamp.
    pub fn commit_at(&mut self, delta: Delta, cursor_after: Position, at: SystemTime) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: Some(self.current),
            children: Vec::new(),
            edits: delta.edits,
            cursor_before: delta.cursor_before,
            cursor_after,
            timestamp: at,
            tag: delta.tag,
        });
        self.nodes[self.current].children.push(id);
        tracing::trace!(target: "editor.undo", node = id, parent = self.current, "commit");
        self.current = id;
        id
    }

    // -- Navigation ---------------------------------------------------------

    /// Step `count` nodes towards the root.
    ///
    /// # Errors
    ///
    /// `AtRoot` if fewer than `count` changes can be undone. Nothing moves.
    pub fn undo(&mut self, count: usize) -> Result<Replay, UndoError> {
        let mut target = self.current;
        for _ in 0..count.max(1) {
            target = self.nodes[target].parent.ok_or(UndoError::AtRoot)?;
        }
        Ok(self.move_to(target))
    }

    /// Step `count` nodes away from the root, always into the most recently
    /// created child.
    ///
    /// # Errors
    ///
    /// `AtLeaf` if the chain below the current node is shorter than `count`.
    pub fn redo(&mut self, count: usize) -> Result<Replay, UndoError> {
        let mut target = self.current;
        for _ in 0..count.max(1) {
            target = *self.nodes[target]
                .children
                .iter()
                .max()
                .ok_or(UndoError::AtLeaf)?;
        }
        Ok(self.move_to(target))
    }

    /// Move `count` states back in creation order, whatever branch they
    /// are on.
    ///
    /// # Errors
    ///
    /// `AtRoot` if that would go before the root.
    pub fn go_older(&mut self, count: usize) -> Result<Replay, UndoError> {
        let target = self
            .current
            .checked_sub(count.max(1))
            .ok_or(UndoError::AtRoot)?;
        Ok(self.move_to(target))
    }

    /// Move `count` states forward in creation order.
    ///
    /// # Errors
    ///
    /// `AtLeaf` if that would go past the newest node.
    pub fn go_newer(&mut self, count: usize) -> Result<Replay, UndoError> {
        let target = self.current + count.max(1);
        if target >= self.nodes.len() {
            return Err(UndoError::AtLeaf);
        }
        Ok(self.move_to(target))
    }

    /// Go to the state the buffer was in `ago` before now.
    pub fn seek_time(&mut self, ago: Duration) -> Replay {
        let cutoff = SystemTime::now()
            .checked_sub(ago)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.seek_before(cutoff)
    }

    /// Go to the newest node created at or before `cutoff`; the root if
    /// every change is newer.
    pub fn seek_before(&mut self, cutoff: SystemTime) -> Replay {
        let target = self
            .nodes
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|(_, n)| n.timestamp <= cutoff)
            .map_or(ROOT, |(id, _)| id);
        self.move_to(target)
    }

    /// Jump straight to `target`.
    ///
    /// # Errors
    ///
    /// `AtLeaf` if no such node exists.
    pub fn goto(&mut self, target: NodeId) -> Result<Replay, UndoError> {
        if target >= self.nodes.len() {
            return Err(UndoError::AtLeaf);
        }
        Ok(self.move_to(target))
    }

    /// Collect the edits that revert the current node's changes to `line`.
    ///
    /// Scans the node's edits from newest to oldest and stops at the first
    /// one that adds or removes a line break; edits on other lines are
    /// skipped. The returned delta is recorded by the caller as a new node,
    /// so the revert itself can be undone.
    ///
    /// # Errors
    ///
    /// `AtRoot` at the root, `LineUnchanged` if the node never touched
    /// `line` after its last line break change.
    pub fn undo_line(&self, line: usize, cursor: Position) -> Result<Delta, UndoError> {
        if self.current == ROOT {
            return Err(UndoError::AtRoot);
        }
        let mut delta = Delta::new(cursor);
        for edit in self.nodes[self.current].edits.iter().rev() {
            if edit.changes_line_count() {
                break;
            }
            if edit.pos().line == line {
                delta.push(edit.inverse());
            }
        }
        if delta.is_empty() {
            return Err(UndoError::LineUnchanged);
        }
        Ok(delta)
    }

    /// Build the replay from the current node to `target` through their
    /// common ancestor, and make `target` current.
    fn move_to(&mut self, target: NodeId) -> Replay {
        let from = self.current;
        let ancestors = self.path_to_root(target);
        let mut edits = Vec::new();
        let mut cursor = self.nodes[target].cursor_after;

        let mut node = from;
        while !ancestors.contains(&node) {
            let n = &self.nodes[node];
            edits.extend(n.edits.iter().rev().map(Edit::inverse));
            cursor = n.cursor_before;
            match n.parent {
                Some(parent) => node = parent,
                None => break,
            }
        }

        let down: Vec<NodeId> = ancestors.iter().take_while(|&&n| n != node).copied().collect();
        if !down.is_empty() {
            for id in down.iter().rev() {
                edits.extend(self.nodes[*id].edits.iter().cloned());
            }
            cursor = self.nodes[target].cursor_after;
        }

        tracing::trace!(target: "editor.undo", from, to = target, edits = edits.len(), "move");
        self.current = target;
        Replay {
            edits,
            cursor,
            target,
        }
    }

    /// `id`, its parent, ..., the root.
    fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut node = id;
        while let Some(parent) = self.nodes[node].parent {
            path.push(parent);
            node = parent;
        }
        path
    }
}

impl Default for UndoTree {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
