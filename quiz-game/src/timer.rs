//! Thinking-time policy and the per-question countdown.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    FINAL_BAND_SECONDS, MIDDLE_BAND_SECONDS, MIDDLE_BAND_UNTIL_QUESTION, UNTIMED_UNTIL_QUESTION,
};

/// Seconds allotted to the 1-indexed `question_number`; `None` is unlimited.
#[must_use]
pub const fn thinking_time(question_number: usize) -> Option<u32> {
    if question_number <= UNTIMED_UNTIL_QUESTION {
        None
    } else if question_number <= MIDDLE_BAND_UNTIL_QUESTION {
        Some(MIDDLE_BAND_SECONDS)
    } else {
        Some(FINAL_BAND_SECONDS)
    }
}

/// Remaining thinking time for the question in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    remaining: Duration,
}

impl Countdown {
    /// Fresh countdown for a question, or `None` when the question is untimed.
    #[must_use]
    pub fn for_question(question_number: usize) -> Option<Self> {
        thinking_time(question_number).map(|secs| Self {
            remaining: Duration::from_secs(u64::from(secs)),
        })
    }

    #[must_use]
    pub const fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whole seconds left, rounded up the way a visual countdown shows them.
    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        let millis = self.remaining.as_millis();
        u32::try_from(millis.div_ceil(1_000)).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Run the clock for up to `budget`, returning the time actually consumed.
    pub fn tick(&mut self, budget: Duration) -> Duration {
        let used = budget.min(self.remaining);
        self.remaining -= used;
        used
    }
}
