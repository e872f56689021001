//! Run state machine
//!
//! - States are explicit and advance in one direction
//! - An empty map skips straight to close
//! - Every run ends in `Closed`, whatever happened before

use serde::Serialize;

use super::errors::{PitrError, PitrErrorCode, Phase, PitrResult};

/// Progress of one `process` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PitrState {
    Discovering,
    WindowResolved,
    HistoryResolved,
    Mapped { empty: bool },
    HistoryReapplied,
    Reduced,
    Closed,
}

impl PitrState {
    pub fn name(&self) -> &'static str {
        match self {
            PitrState::Discovering => "discovering",
            PitrState::WindowResolved => "window_resolved",
            PitrState::HistoryResolved => "history_resolved",
            PitrState::Mapped { .. } => "mapped",
            PitrState::HistoryReapplied => "history_reapplied",
            PitrState::Reduced => "reduced",
            PitrState::Closed => "closed",
        }
    }

    /// Whether `next` may follow this state
    pub fn can_transition_to(&self, next: &PitrState) -> bool {
        use PitrState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Discovering, WindowResolved) => true,
            (WindowResolved, HistoryResolved) => true,
            (HistoryResolved, Mapped { .. }) => true,
            (Mapped { empty: false }, HistoryReapplied) => true,
            (HistoryReapplied, Reduced) => true,
            _ => false,
        }
    }

    /// Moves to `next`, rejecting transitions the pipeline never makes.
    pub fn advance(&mut self, next: PitrState) -> PitrResult<()> {
        if !self.can_transition_to(&next) {
            return Err(PitrError::new(
                PitrErrorCode::Execution,
                Phase::Close,
                format!("forbidden transition: {} -> {}", self.name(), next.name()),
            ));
        }
        *self = next;
        Ok(())
    }
}
