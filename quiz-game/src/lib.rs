//! Quiz Game Engine
//!
//! Platform-agnostic core for a fifteen-question prize-ladder quiz: the run
//! state machine, scoring and safety nets, the six jokers, and the records a
//! run leaves behind. Question content, hint text and storage are supplied
//! by the caller through the traits below.

pub mod bank;
pub mod config;
pub mod constants;
pub mod jokers;
pub mod question;
pub mod rewards;
pub mod rng;
pub mod run;
pub mod session;
pub mod step;
pub mod store;
pub mod timer;

use std::collections::HashSet;
use thiserror::Error;

// Re-export commonly used types
pub use bank::{BankError, BankProvider, QuestionBank, target_difficulty};
pub use config::{ConfigError, SessionConfig};
pub use jokers::{
    Advisory, AudiencePoll, ExpertPersona, HiddenOptions, JokerFlags, JokerKind, audience_poll,
    expert_recommendation, fifty_fifty,
};
pub use question::{Category, OptionKey, OptionSet, Question, QuestionError};
pub use rewards::{earned_so_far, reward_at, safety_floor, top_reward};
pub use rng::{JokerRng, RandomSource, ScriptedRandom, SeededStream};
pub use run::{CategoryMode, NewRun, Run, RunCompletion, RunError, RunOutcome, RunSummary};
pub use session::{
    AuthorityRequest, JokerRequest, OptionView, PhaseKind, QuestionView, QuizError, QuizSession,
    SessionSnapshot,
};
pub use step::{StepEvent, StepKind};
pub use store::{
    AdminSummary, FlushReport, LeaderboardEntry, MemoryStore, PersistOp, StoreError, apply_ops,
};
pub use timer::{Countdown, thinking_time};

/// Source of questions for a run.
pub trait QuestionProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch one question for the 1-indexed `question_number`.
    ///
    /// Must not return an id in `exclude` while an alternative exists.
    /// `Ok(None)` means nothing is left to play.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails.
    fn fetch_question(
        &mut self,
        question_number: usize,
        category: Option<Category>,
        exclude: &HashSet<String>,
    ) -> Result<Option<Question>, Self::Error>;
}

/// Free-text advice for the authority joker.
pub trait HintTextProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if no text could be produced; the session then shows
    /// a fallback.
    fn fetch_hint_text(&self, question: &Question, difficulty: u8) -> Result<String, Self::Error>;
}

/// Durable record of runs and their steps.
pub trait RunStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a run record.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be stored.
    fn start_run(&self, request: NewRun) -> Result<Run, Self::Error>;

    /// Append one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the step cannot be stored.
    fn record_step(&self, step: &StepEvent) -> Result<(), Self::Error>;

    /// Finalize a run.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or already finished runs.
    fn finish_run(&self, completion: &RunCompletion) -> Result<(), Self::Error>;

    /// Best finished result per player, highest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn admin_summary(&self, recent: usize) -> Result<AdminSummary, Self::Error>;
}

#[derive(Debug, Error)]
pub enum EngineError<E: std::error::Error + 'static> {
    #[error("run store failed")]
    Store(#[source] E),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

/// Main engine binding a run store to new sessions
pub struct QuizEngine<S>
where
    S: RunStore,
{
    store: S,
    config: SessionConfig,
}

impl<S> QuizEngine<S>
where
    S: RunStore,
{
    /// Create a new engine with the provided store and session timing
    pub const fn new(store: S, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a run in the store and start playing it. If question 1 cannot
    /// be loaded the stored run stays open and is never finished; admin
    /// aggregates only count finished runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be opened or question 1 cannot be
    /// loaded.
    pub fn start_session<P: QuestionProvider>(
        &self,
        request: NewRun,
        provider: P,
        seed: u64,
    ) -> Result<QuizSession<P>, EngineError<S::Error>> {
        let run = self.store.start_run(request).map_err(EngineError::Store)?;
        Ok(QuizSession::start(
            run,
            provider,
            seed,
            self.config.clone(),
        )?)
    }

    /// Write everything the session has queued. Failures are logged, never
    /// surfaced to play.
    pub fn persist<P, R>(&self, session: &mut QuizSession<P, R>) -> FlushReport
    where
        P: QuestionProvider,
        R: RandomSource,
    {
        apply_ops(&self.store, session.drain_persistence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::fixtures::question;
    use std::time::Duration;

    fn bank() -> QuestionBank {
        let questions = (1..=15)
            .map(|n| {
                let mut q = question(&format!("q{n}"), OptionKey::B);
                q.difficulty = u8::try_from(n).unwrap().min(12);
                q
            })
            .collect();
        QuestionBank::from_questions(questions).unwrap()
    }

    #[test]
    fn engine_opens_plays_and_persists_a_run() {
        let engine = QuizEngine::new(MemoryStore::new(), SessionConfig::instant());
        let request = NewRun::new("user-7", "Grace", CategoryMode::Random, None).unwrap();
        let mut session = engine
            .start_session(request, BankProvider::seeded(bank(), 3), 11)
            .unwrap();
        assert_eq!(session.run().id, "run-1");

        for _ in 0..2 {
            let answer = session.question().unwrap().correct_option;
            assert!(session.select_option(answer));
            assert!(session.commit());
            session.advance(Duration::ZERO).unwrap();
        }
        assert!(session.use_hint());
        assert!(session.cash_out());

        let report = engine.persist(&mut session);
        assert_eq!(report, FlushReport { applied: 4, failed: 0 });
        assert_eq!(engine.persist(&mut session), FlushReport::default());

        let stored = engine.store().run("run-1").unwrap().unwrap();
        assert_eq!(stored.final_earnings, 10);
        assert_eq!(stored.correct_count, 2);
        assert!(stored.jokers.is_used(JokerKind::Hint));

        let board = engine.store().leaderboard(5).unwrap();
        assert_eq!(board[0].display_name, "Grace");
        assert_eq!(board[0].best_earnings, 10);
    }

    #[test]
    fn empty_bank_surfaces_exhaustion() {
        let engine = QuizEngine::new(MemoryStore::new(), SessionConfig::default());
        let request = NewRun::new("user-1", "Empty", CategoryMode::Random, None).unwrap();
        let result = engine.start_session(request, BankProvider::seeded(QuestionBank::empty(), 0), 1);
        assert!(matches!(
            result,
            Err(EngineError::Quiz(QuizError::QuestionExhausted { question_number: 1 }))
        ));
        let admin = engine.store().admin_summary(5).unwrap();
        assert_eq!(admin.total_runs, 0);
        assert_eq!(admin.open_runs, 1);
        assert_eq!(admin.total_players, 0);
        assert!(engine.store().leaderboard(5).unwrap().is_empty());
    }
}
