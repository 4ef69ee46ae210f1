//! Phases of the run state machine.
//!
//! Timers and pending delays live inside the phase that owns them, so
//! leaving a phase drops them with it and a stale expiry cannot fire.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::question::OptionKey;
use crate::run::{RunOutcome, RunSummary};
use crate::timer::Countdown;

/// Public, data-free view of the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Loading,
    AwaitingSelection,
    Locked,
    Revealed,
    Finished,
    /// The question provider could not supply a question.
    Aborted,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "loading",
            Self::AwaitingSelection => "awaiting_selection",
            Self::Locked => "locked",
            Self::Revealed => "revealed",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// What the reveal delay leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AfterReveal {
    NextQuestion,
    Finish {
        outcome: RunOutcome,
        earnings: u32,
        correct_count: usize,
    },
}

#[derive(Debug, Clone)]
pub(super) enum Phase {
    Loading,
    AwaitingSelection {
        selection: Option<OptionKey>,
        /// `None` for untimed questions.
        countdown: Option<Countdown>,
    },
    Locked {
        selection: OptionKey,
        evaluate_in: Duration,
        /// Clock held while the answer is evaluated; resumed on a retry.
        frozen: Option<Countdown>,
    },
    Revealed {
        /// `None` when the timer ran out.
        selection: Option<OptionKey>,
        correct: bool,
        pending: Duration,
        then: AfterReveal,
    },
    Finished(Box<RunSummary>),
    Aborted,
}

impl Phase {
    pub(super) const fn kind(&self) -> PhaseKind {
        match self {
            Self::Loading => PhaseKind::Loading,
            Self::AwaitingSelection { .. } => PhaseKind::AwaitingSelection,
            Self::Locked { .. } => PhaseKind::Locked,
            Self::Revealed { .. } => PhaseKind::Revealed,
            Self::Finished(_) => PhaseKind::Finished,
            Self::Aborted => PhaseKind::Aborted,
        }
    }

    pub(super) const fn selection(&self) -> Option<OptionKey> {
        match self {
            Self::AwaitingSelection { selection, .. } | Self::Revealed { selection, .. } => {
                *selection
            }
            Self::Locked { selection, .. } => Some(*selection),
            _ => None,
        }
    }

    /// Thinking time left, running or frozen.
    pub(super) const fn countdown(&self) -> Option<&Countdown> {
        match self {
            Self::AwaitingSelection { countdown, .. } => countdown.as_ref(),
            Self::Locked { frozen, .. } => frozen.as_ref(),
            _ => None,
        }
    }

    pub(super) const fn is_over(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Aborted)
    }
}
