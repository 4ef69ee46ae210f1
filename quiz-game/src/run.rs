//! Run records and the end-of-run summary.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::DISPLAY_NAME_MAX_CHARS;
use crate::jokers::JokerFlags;
use crate::question::Category;

/// How questions are drawn for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMode {
    /// Every category mixed together.
    Random,
    /// Questions filtered to the run's initial category.
    Chosen,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("display name is empty")]
    EmptyDisplayName,
    #[error("display name is {len} characters; the limit is {max}")]
    DisplayNameTooLong { len: usize, max: usize },
    #[error("chosen category mode requires an initial category")]
    MissingCategory,
}

/// Validated request to open a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRun {
    pub user_id: String,
    pub display_name: String,
    pub category_mode: CategoryMode,
    pub initial_category: Option<Category>,
}

impl NewRun {
    /// Trim and validate the display name and category choice.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or over-long name, or for `chosen`
    /// mode without a category.
    pub fn new(
        user_id: impl Into<String>,
        display_name: &str,
        category_mode: CategoryMode,
        initial_category: Option<Category>,
    ) -> Result<Self, RunError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(RunError::EmptyDisplayName);
        }
        let len = display_name.chars().count();
        if len > DISPLAY_NAME_MAX_CHARS {
            return Err(RunError::DisplayNameTooLong {
                len,
                max: DISPLAY_NAME_MAX_CHARS,
            });
        }
        if category_mode == CategoryMode::Chosen && initial_category.is_none() {
            return Err(RunError::MissingCategory);
        }
        Ok(Self {
            user_id: user_id.into(),
            display_name: display_name.to_string(),
            category_mode,
            initial_category,
        })
    }
}

/// One playthrough. Created once at start and finalized exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub final_earnings: u32,
    #[serde(default)]
    pub correct_count: usize,
    #[serde(flatten)]
    pub jokers: JokerFlags,
    pub category_mode: CategoryMode,
    #[serde(default)]
    pub initial_category: Option<Category>,
}

impl Run {
    /// Open a run record from a validated request.
    #[must_use]
    pub fn open(id: impl Into<String>, request: NewRun, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            user_id: request.user_id,
            display_name: request.display_name,
            started_at,
            ended_at: None,
            final_earnings: 0,
            correct_count: 0,
            jokers: JokerFlags::default(),
            category_mode: request.category_mode,
            initial_category: request.initial_category,
        }
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Filter applied to question fetches at the start of the run.
    #[must_use]
    pub const fn category_filter(&self) -> Option<Category> {
        match self.category_mode {
            CategoryMode::Random => None,
            CategoryMode::Chosen => self.initial_category,
        }
    }

    /// Copy of this run with the completion fields set.
    #[must_use]
    pub fn finalized(
        &self,
        final_earnings: u32,
        correct_count: usize,
        jokers: JokerFlags,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ended_at: Some(ended_at),
            final_earnings,
            correct_count,
            jokers,
            ..self.clone()
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Player walked away with the banked amount.
    CashedOut,
    /// All fifteen questions answered correctly.
    Completed,
    /// Wrong answer; paid the safety floor.
    WrongAnswer,
    /// Thinking time ran out; paid the safety floor.
    TimedOut,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CashedOut => write!(f, "cashed_out"),
            Self::Completed => write!(f, "completed"),
            Self::WrongAnswer => write!(f, "wrong_answer"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Completion record handed to run persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCompletion {
    pub run_id: String,
    pub final_earnings: u32,
    pub correct_count: usize,
    #[serde(flatten)]
    pub jokers: JokerFlags,
}

/// Immutable result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: Run,
    pub outcome: RunOutcome,
}

impl RunSummary {
    #[must_use]
    pub const fn final_earnings(&self) -> u32 {
        self.run.final_earnings
    }

    #[must_use]
    pub const fn correct_count(&self) -> usize {
        self.run.correct_count
    }

    #[must_use]
    pub fn completion(&self) -> RunCompletion {
        RunCompletion {
            run_id: self.run.id.clone(),
            final_earnings: self.run.final_earnings,
            correct_count: self.run.correct_count,
            jokers: self.run.jokers,
        }
    }
}

/// Fold the final metrics and joker usage into the finished run record.
#[must_use]
pub fn build_summary(
    run: &Run,
    outcome: RunOutcome,
    final_earnings: u32,
    correct_count: usize,
    jokers: JokerFlags,
    ended_at: DateTime<Utc>,
) -> RunSummary {
    RunSummary {
        run: run.finalized(final_earnings, correct_count, jokers, ended_at),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jokers::JokerKind;
    use chrono::TimeZone;

    fn sample_run() -> Run {
        let request = NewRun::new("user-1", "  Quiz Fan ", CategoryMode::Random, None).unwrap();
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Run::open("run-1", request, started)
    }

    #[test]
    fn new_run_validates_display_name() {
        assert_eq!(
            NewRun::new("u", "   ", CategoryMode::Random, None),
            Err(RunError::EmptyDisplayName)
        );
        let long = "x".repeat(25);
        assert_eq!(
            NewRun::new("u", &long, CategoryMode::Random, None),
            Err(RunError::DisplayNameTooLong { len: 25, max: 24 })
        );
        assert_eq!(
            NewRun::new("u", "Ok", CategoryMode::Chosen, None),
            Err(RunError::MissingCategory)
        );
        let chosen =
            NewRun::new("u", "Ok", CategoryMode::Chosen, Some(Category::History)).unwrap();
        assert_eq!(chosen.initial_category, Some(Category::History));
    }

    #[test]
    fn open_run_trims_name_and_is_unfinished() {
        let run = sample_run();
        assert_eq!(run.display_name, "Quiz Fan");
        assert!(!run.is_finished());
        assert_eq!(run.category_filter(), None);
    }

    #[test]
    fn summary_copies_metrics_and_flags() {
        let run = sample_run();
        let mut flags = JokerFlags::default();
        flags.consume(JokerKind::Audience);
        let ended = Utc.with_ymd_and_hms(2026, 3, 1, 12, 5, 0).unwrap();

        let summary = build_summary(&run, RunOutcome::CashedOut, 30, 4, flags, ended);
        assert_eq!(summary.final_earnings(), 30);
        assert_eq!(summary.correct_count(), 4);
        assert_eq!(summary.run.ended_at, Some(ended));
        assert!(summary.run.jokers.is_used(JokerKind::Audience));
        assert!(!run.is_finished());

        let completion = summary.completion();
        assert_eq!(completion.run_id, "run-1");
        assert_eq!(completion.final_earnings, 30);

        let json = serde_json::to_value(&summary.run).unwrap();
        assert_eq!(json["used_audience"], true);
        assert_eq!(json["category_mode"], "random");
    }
}
