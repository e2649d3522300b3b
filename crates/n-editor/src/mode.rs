//! Modal state.
//!
//! Each buffer editor is always in exactly one [`Mode`]. The mode decides
//! how the next key is interpreted and how far the cursor may go:
//!
//! | Mode             | Cursor limit        | Input            |
//! |------------------|---------------------|------------------|
//! | Normal           | `0..len-1`          | commands         |
//! | CommandPending   | `0..len-1`          | rest of a command (count, register, prefix) |
//! | OperatorPending  | `0..len-1`          | motion or object for a held operator |
//! | Visual           | `0..len-1`          | motions and operators on the selection |
//! | Insert           | `0..len`            | literal text     |
//! | Replace          | `0..len`            | literal text, overwriting |
//!
//! [`ModeMachine`] owns the current mode and rejects transitions that make
//! no sense (e.g. entering Replace from Visual) with `InvalidComposition`.

use std::fmt;

use crate::error::{EditError, EditResult};

// ---------------------------------------------------------------------------
// VisualKind
// ---------------------------------------------------------------------------

/// The sub-mode of visual selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualKind {
    /// `v` — character-wise selection.
    Char,
    /// `V` — line-wise selection (always selects full lines).
    Line,
    /// `Ctrl-V` — block (column) selection.
    Block,
}

impl VisualKind {
    /// The key that enters (and leaves) this kind.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Char => "v",
            Self::Line => "V",
            Self::Block => "<C-v>",
        }
    }
}

impl fmt::Display for VisualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Mode::Visual(*self).display_name())
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// The current editing mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Normal,
    Insert,
    /// `R` — continuous overwrite until Esc.
    Replace,
    Visual(VisualKind),
    /// A count, register prefix or multi-key command is being held.
    CommandPending,
    /// An operator waits for its motion or text object.
    OperatorPending,
}

impl Mode {
    /// Human-readable name for a status line.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Insert => "INSERT",
            Self::Replace => "REPLACE",
            Self::Visual(VisualKind::Char) => "VISUAL",
            Self::Visual(VisualKind::Line) => "VISUAL LINE",
            Self::Visual(VisualKind::Block) => "VISUAL BLOCK",
            Self::CommandPending => "PENDING",
            Self::OperatorPending => "OP PENDING",
        }
    }

    /// True if the cursor can sit one past the last char.
    #[inline]
    #[must_use]
    pub const fn cursor_past_end(self) -> bool {
        matches!(self, Self::Insert | Self::Replace)
    }

    /// True if keys are literal text.
    #[inline]
    #[must_use]
    pub const fn is_input(self) -> bool {
        matches!(self, Self::Insert | Self::Replace)
    }

    #[inline]
    #[must_use]
    pub const fn is_visual(self) -> bool {
        matches!(self, Self::Visual(_))
    }

    /// The visual kind, if any.
    #[inline]
    #[must_use]
    pub const fn visual_kind(self) -> Option<VisualKind> {
        match self {
            Self::Visual(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ---------------------------------------------------------------------------
// ModeMachine
// ---------------------------------------------------------------------------

/// What happened to the composer or editor that may change the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// A count, register or prefix key is held.
    Hold,
    /// An operator is held, waiting for its target.
    HoldOperator,
    /// A command completed or was abandoned.
    Settle,
    EnterInsert,
    EnterReplace,
    /// `v`, `V` or `<C-v>`. The same kind again leaves visual mode.
    EnterVisual(VisualKind),
    Escape,
}

/// The result of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
}

impl Transition {
    /// True when this transition leaves Insert or Replace.
    #[must_use]
    pub const fn exits_input(self) -> bool {
        self.from.is_input() && !self.to.is_input()
    }

    /// True when this transition leaves Visual.
    #[must_use]
    pub const fn exits_visual(self) -> bool {
        self.from.is_visual() && !self.to.is_visual()
    }
}

/// The mode state of one buffer editor.
#[derive(Debug, Default, Clone)]
pub struct ModeMachine {
    mode: Mode,
}

impl ModeMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self { mode: Mode::Normal }
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Apply `event`. Invalid transitions leave the mode unchanged.
    pub fn transition(&mut self, event: ModeEvent) -> EditResult<Transition> {
        use Mode::{CommandPending, Insert, Normal, OperatorPending, Replace, Visual};

        let from = self.mode;
        let to = match (from, event) {
            (_, ModeEvent::Escape) => Normal,

            (Normal | CommandPending, ModeEvent::Hold) => CommandPending,
            (OperatorPending, ModeEvent::Hold) => OperatorPending,
            (Visual(kind), ModeEvent::Hold | ModeEvent::Settle) => Visual(kind),

            (Normal | CommandPending | OperatorPending, ModeEvent::HoldOperator) => OperatorPending,

            (Normal | CommandPending | OperatorPending, ModeEvent::Settle) => Normal,

            (Normal | CommandPending | OperatorPending | Visual(_), ModeEvent::EnterInsert) => Insert,
            (Normal | CommandPending, ModeEvent::EnterReplace) => Replace,

            (Normal | CommandPending, ModeEvent::EnterVisual(kind)) => Visual(kind),
            (Visual(current), ModeEvent::EnterVisual(kind)) if current == kind => Normal,
            (Visual(_), ModeEvent::EnterVisual(kind)) => Visual(kind),

            (from, event) => {
                return Err(EditError::InvalidComposition(format!(
                    "{event:?} in {}",
                    from.display_name()
                )));
            }
        };
        self.mode = to;
        if from != to {
            tracing::trace!(target: "editor.mode", %from, %to, "transition");
        }
        Ok(Transition { from, to })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(events: &[ModeEvent]) -> ModeMachine {
        let mut m = ModeMachine::new();
        for &e in events {
            m.transition(e).expect("valid transition");
        }
        m
    }

    // -- Mode queries -------------------------------------------------------

    #[test]
    fn display_names() {
        assert_eq!(Mode::Normal.to_string(), "NORMAL");
        assert_eq!(Mode::Visual(VisualKind::Block).to_string(), "VISUAL BLOCK");
        assert_eq!(VisualKind::Line.to_string(), "VISUAL LINE");
        assert_eq!(Mode::OperatorPending.display_name(), "OP PENDING");
    }

    #[test]
    fn input_modes_allow_past_end() {
        assert!(Mode::Insert.cursor_past_end());
        assert!(Mode::Replace.is_input());
        assert!(!Mode::Visual(VisualKind::Char).cursor_past_end());
        assert!(!Mode::OperatorPending.is_input());
        assert_eq!(Mode::Visual(VisualKind::Line).visual_kind(), Some(VisualKind::Line));
    }

    #[test]
    fn default_is_normal() {
        assert_eq!(ModeMachine::new().mode(), Mode::Normal);
    }

    // -- Transitions --------------------------------------------------------

    #[test]
    fn operator_then_motion_settles_to_normal() {
        let mut m = machine(&[ModeEvent::Hold, ModeEvent::HoldOperator]);
        assert_eq!(m.mode(), Mode::OperatorPending);
        m.transition(ModeEvent::Hold).expect("count after operator");
        assert_eq!(m.mode(), Mode::OperatorPending);
        let t = m.transition(ModeEvent::Settle).expect("valid");
        assert_eq!(t, Transition { from: Mode::OperatorPending, to: Mode::Normal });
    }

    #[test]
    fn change_operator_enters_insert() {
        let m = machine(&[ModeEvent::HoldOperator, ModeEvent::EnterInsert]);
        assert_eq!(m.mode(), Mode::Insert);
    }

    #[test]
    fn escape_from_insert_exits_input() {
        let mut m = machine(&[ModeEvent::EnterInsert]);
        let t = m.transition(ModeEvent::Escape).expect("valid");
        assert!(t.exits_input());
        assert_eq!(t.to, Mode::Normal);
    }

    #[test]
    fn visual_kinds_switch_and_toggle_off() {
        let mut m = machine(&[ModeEvent::EnterVisual(VisualKind::Char)]);
        m.transition(ModeEvent::EnterVisual(VisualKind::Line)).expect("switch");
        assert_eq!(m.mode(), Mode::Visual(VisualKind::Line));
        m.transition(ModeEvent::Settle).expect("motion in visual");
        assert_eq!(m.mode(), Mode::Visual(VisualKind::Line));
        let t = m.transition(ModeEvent::EnterVisual(VisualKind::Line)).expect("toggle");
        assert!(t.exits_visual());
        assert_eq!(m.mode(), Mode::Normal);
    }

    #[test]
    fn invalid_transitions_leave_mode_unchanged() {
        let mut m = machine(&[ModeEvent::EnterVisual(VisualKind::Block)]);
        assert!(matches!(
            m.transition(ModeEvent::EnterReplace),
            Err(EditError::InvalidComposition(_))
        ));
        assert_eq!(m.mode(), Mode::Visual(VisualKind::Block));

        let mut m = machine(&[ModeEvent::EnterInsert]);
        assert!(m.transition(ModeEvent::HoldOperator).is_err());
        assert!(m.transition(ModeEvent::Settle).is_err());
        assert_eq!(m.mode(), Mode::Insert);
    }
}
