//! The run state machine.
//!
//! A [`QuizSession`] owns everything mutable about one run: the slot in play,
//! the phase (with its countdown or pending delay), the joker flags and the
//! per-question board. Time is virtual and only moves through
//! [`QuizSession::advance`]. Actions in the wrong state are no-ops that return
//! `false`/`None`; only question loading can fail.
//!
//! Persistence is never performed here. Each state-changing action appends a
//! [`PersistOp`] which the caller drains and writes fire-and-forget.
mod phase;
mod snapshot;

pub use phase::PhaseKind;
pub use snapshot::{OptionView, QuestionView, SessionSnapshot};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, SessionConfig};
use crate::constants::{SECOND_CHANCE_ARMED_TEXT, SECOND_CHANCE_RETRY_TEXT, TOTAL_QUESTIONS};
use crate::jokers::{
    self, Advisory, AudiencePoll, ExpertPersona, HiddenOptions, JokerFlags, JokerKind,
};
use crate::question::{Category, OptionKey, Question, QuestionError};
use crate::rewards::{earned_so_far, is_final_slot, reward_at, safety_floor, top_reward};
use crate::rng::{JokerRng, RandomSource, SeededStream};
use crate::run::{Run, RunOutcome, RunSummary, build_summary};
use crate::step::{StepEvent, StepKind};
use crate::store::PersistOp;
use crate::timer::Countdown;
use crate::{HintTextProvider, QuestionProvider};
use phase::{AfterReveal, Phase};

/// Failures that end a run without a result.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("no unused question is available for question {question_number}")]
    QuestionExhausted { question_number: usize },
    #[error("question provider failed for question {question_number}")]
    QuestionProvider {
        question_number: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("question {question_id} cannot be played")]
    InvalidQuestion {
        question_id: String,
        #[source]
        source: QuestionError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A synchronous joker invocation. Authority goes through
/// [`QuizSession::begin_authority`] or [`QuizSession::use_authority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "joker", rename_all = "snake_case")]
pub enum JokerRequest {
    Expert { persona: ExpertPersona },
    Hint,
    SecondChance,
    FiftyFifty,
    Audience,
}

impl JokerRequest {
    #[must_use]
    pub const fn kind(self) -> JokerKind {
        match self {
            Self::Expert { .. } => JokerKind::Expert,
            Self::Hint => JokerKind::Hint,
            Self::SecondChance => JokerKind::SecondChance,
            Self::FiftyFifty => JokerKind::FiftyFifty,
            Self::Audience => JokerKind::Audience,
        }
    }
}

/// Ticket handed out when the authority joker starts its external call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityRequest {
    pub ticket: u64,
    pub question_number: usize,
    pub difficulty: u8,
    pub question: Question,
}

#[derive(Debug, Clone)]
struct PendingAuthority {
    ticket: u64,
    slot: usize,
    question: Question,
}

/// Per-question effects; reset whenever a new question loads.
#[derive(Debug, Clone, Default)]
struct Board {
    hidden: HiddenOptions,
    second_chance_armed: bool,
    advisory: Option<Advisory>,
    audience: Option<AudiencePoll>,
}

/// One run in progress.
#[derive(Debug)]
pub struct QuizSession<P, R = SeededStream> {
    config: SessionConfig,
    run: Run,
    provider: P,
    rng: JokerRng<R>,
    slot: usize,
    phase: Phase,
    question: Option<Question>,
    board: Board,
    jokers: JokerFlags,
    used_ids: HashSet<String>,
    category_filter: Option<Category>,
    authority: Option<PendingAuthority>,
    next_ticket: u64,
    outbox: Vec<PersistOp>,
    clock: Duration,
}

impl<P: QuestionProvider> QuizSession<P> {
    /// Start a run with joker streams derived from `seed` and load question 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the first question
    /// cannot be loaded.
    pub fn start(
        run: Run,
        provider: P,
        seed: u64,
        config: SessionConfig,
    ) -> Result<Self, QuizError> {
        Self::with_rng(run, provider, JokerRng::from_seed(seed), config)
    }
}

impl<P: QuestionProvider, R: RandomSource> QuizSession<P, R> {
    /// Start a run with caller-supplied joker streams.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the first question
    /// cannot be loaded.
    pub fn with_rng(
        run: Run,
        provider: P,
        rng: JokerRng<R>,
        config: SessionConfig,
    ) -> Result<Self, QuizError> {
        config.validate()?;
        let category_filter = run.category_filter();
        let mut session = Self {
            config,
            run,
            provider,
            rng,
            slot: 0,
            phase: Phase::Loading,
            question: None,
            board: Board::default(),
            jokers: JokerFlags::default(),
            used_ids: HashSet::new(),
            category_filter,
            authority: None,
            next_ticket: 1,
            outbox: Vec::new(),
            clock: Duration::ZERO,
        };
        log::debug!(
            "{} started for {} (filter {:?})",
            session.run.id,
            session.run.display_name,
            session.category_filter
        );
        session.load_question()?;
        Ok(session)
    }

    // Accessors ------------------------------------------------------------

    #[must_use]
    pub const fn run(&self) -> &Run {
        &self.run
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn phase(&self) -> PhaseKind {
        self.phase.kind()
    }

    /// Zero-based index of the question in play.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    #[must_use]
    pub const fn question_number(&self) -> usize {
        self.slot + 1
    }

    #[must_use]
    pub const fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    #[must_use]
    pub const fn selection(&self) -> Option<OptionKey> {
        self.phase.selection()
    }

    #[must_use]
    pub const fn jokers(&self) -> JokerFlags {
        self.jokers
    }

    #[must_use]
    pub fn hidden_options(&self) -> &[OptionKey] {
        &self.board.hidden
    }

    #[must_use]
    pub const fn second_chance_armed(&self) -> bool {
        self.board.second_chance_armed
    }

    #[must_use]
    pub const fn advisory(&self) -> Option<&Advisory> {
        self.board.advisory.as_ref()
    }

    #[must_use]
    pub const fn audience(&self) -> Option<&AudiencePoll> {
        self.board.audience.as_ref()
    }

    #[must_use]
    pub const fn category_filter(&self) -> Option<Category> {
        self.category_filter
    }

    /// Thinking time left, `None` when the question is untimed or not in play.
    #[must_use]
    pub fn time_left(&self) -> Option<Duration> {
        self.phase.countdown().map(Countdown::remaining)
    }

    /// Ticket of the authority call in flight.
    #[must_use]
    pub fn pending_authority(&self) -> Option<u64> {
        self.authority.as_ref().map(|pending| pending.ticket)
    }

    #[must_use]
    pub fn summary(&self) -> Option<&RunSummary> {
        match &self.phase {
            Phase::Finished(summary) => Some(summary.as_ref()),
            _ => None,
        }
    }

    /// Finished or aborted.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.phase.is_over()
    }

    /// Virtual time fed through `advance`.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.clock
    }

    pub const fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Hand over every write queued since the last drain, oldest first.
    pub fn drain_persistence(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.outbox)
    }

    // Player actions --------------------------------------------------------

    /// Pick (or change) the pending answer. Options hidden by 50/50 are refused.
    pub fn select_option(&mut self, key: OptionKey) -> bool {
        if self.board.hidden.contains(&key) {
            return false;
        }
        let Phase::AwaitingSelection { selection, .. } = &mut self.phase else {
            return false;
        };
        *selection = Some(key);
        true
    }

    /// Lock the selection in. Evaluation happens after the lock delay.
    pub fn commit(&mut self) -> bool {
        let Phase::AwaitingSelection {
            selection: Some(selection),
            countdown,
        } = self.phase
        else {
            return false;
        };
        log::debug!("{} Q{} locked {selection}", self.run.id, self.slot + 1);
        self.phase = Phase::Locked {
            selection,
            evaluate_in: self.config.lock_delay(),
            frozen: countdown,
        };
        true
    }

    /// Walk away with the banked amount. Refused while an answer is locked or
    /// being revealed.
    pub fn cash_out(&mut self) -> bool {
        if !matches!(
            self.phase,
            Phase::Loading | Phase::AwaitingSelection { .. }
        ) {
            return false;
        }
        self.finish(RunOutcome::CashedOut, earned_so_far(self.slot), self.slot);
        true
    }

    /// Move virtual time forward, firing every timer and delay that falls
    /// inside `elapsed`. Leftover time carries into the following phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the next question cannot be loaded; the session is
    /// then aborted.
    pub fn advance(&mut self, elapsed: Duration) -> Result<(), QuizError> {
        if self.is_over() {
            return Ok(());
        }
        self.clock = self.clock.saturating_add(elapsed);
        let mut budget = elapsed;
        loop {
            let paused = self.timer_paused();
            match &mut self.phase {
                Phase::AwaitingSelection {
                    countdown: Some(countdown),
                    ..
                } if !paused => {
                    budget -= countdown.tick(budget);
                    if !countdown.is_expired() {
                        return Ok(());
                    }
                    self.expire();
                }
                Phase::Locked { evaluate_in, .. } => {
                    if budget < *evaluate_in {
                        *evaluate_in -= budget;
                        return Ok(());
                    }
                    budget -= *evaluate_in;
                    self.evaluate();
                }
                Phase::Revealed { pending, .. } => {
                    if budget < *pending {
                        *pending -= budget;
                        return Ok(());
                    }
                    budget -= *pending;
                    self.after_reveal()?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Skip the remaining reveal (or timeout) delay.
    ///
    /// # Errors
    ///
    /// Returns an error if the next question cannot be loaded.
    pub fn advance_after_reveal(&mut self) -> Result<bool, QuizError> {
        if !matches!(self.phase, Phase::Revealed { .. }) {
            return Ok(false);
        }
        self.after_reveal()?;
        Ok(true)
    }

    /// Close the advisory panel; a paused countdown resumes.
    pub fn dismiss_advisory(&mut self) -> bool {
        self.board.advisory.take().is_some()
    }

    /// Change the category used for the following questions.
    pub fn switch_category(&mut self, target: Category) -> bool {
        if !matches!(
            self.phase,
            Phase::Loading | Phase::AwaitingSelection { .. }
        ) || self.category_filter == Some(target)
        {
            return false;
        }
        log::debug!(
            "{} switching category {:?} -> {target}",
            self.run.id,
            self.category_filter
        );
        self.category_filter = Some(target);
        self.record(
            StepKind::CategorySwitch {
                category_switch_to: target,
            },
            earned_so_far(self.slot),
        );
        true
    }

    // Jokers ----------------------------------------------------------------

    pub fn use_joker(&mut self, request: JokerRequest) -> bool {
        match request {
            JokerRequest::Expert { persona } => self.use_expert(persona),
            JokerRequest::Hint => self.use_hint(),
            JokerRequest::SecondChance => self.use_second_chance(),
            JokerRequest::FiftyFifty => self.use_fifty_fifty(),
            JokerRequest::Audience => self.use_audience(),
        }
    }

    pub fn use_expert(&mut self, persona: ExpertPersona) -> bool {
        if !self.joker_ready(JokerKind::Expert) {
            return false;
        }
        let Some(question) = self.question.as_ref() else {
            return false;
        };
        let recommended = jokers::expert_recommendation(self.rng.expert(), question);
        self.board.advisory = Some(jokers::expert_advice(persona, question, recommended));
        self.spend_joker(JokerKind::Expert, None, None)
    }

    pub fn use_hint(&mut self) -> bool {
        if !self.joker_ready(JokerKind::Hint) {
            return false;
        }
        let Some(question) = self.question.as_ref() else {
            return false;
        };
        self.board.advisory = Some(jokers::hint_advisory(question));
        self.spend_joker(JokerKind::Hint, None, None)
    }

    /// Arm one free retry for the current question only.
    pub fn use_second_chance(&mut self) -> bool {
        if !self.joker_ready(JokerKind::SecondChance) || self.question.is_none() {
            return false;
        }
        self.board.second_chance_armed = true;
        self.board.advisory = Some(Advisory::new("Second Chance", SECOND_CHANCE_ARMED_TEXT));
        self.spend_joker(JokerKind::SecondChance, None, None)
    }

    /// Hide two wrong options. A selection on a hidden option is cleared.
    pub fn use_fifty_fifty(&mut self) -> bool {
        if !self.joker_ready(JokerKind::FiftyFifty) {
            return false;
        }
        let Some(question) = self.question.as_ref() else {
            return false;
        };
        let hidden = jokers::fifty_fifty(self.rng.fifty_fifty(), question);
        if let Phase::AwaitingSelection { selection, .. } = &mut self.phase
            && selection.is_some_and(|key| hidden.contains(&key))
        {
            *selection = None;
        }
        self.board.hidden.clone_from(&hidden);
        self.spend_joker(JokerKind::FiftyFifty, None, Some(hidden))
    }

    pub fn use_audience(&mut self) -> bool {
        if !self.joker_ready(JokerKind::Audience) {
            return false;
        }
        let Some(question) = self.question.as_ref() else {
            return false;
        };
        let poll = jokers::audience_poll(self.rng.audience(), question);
        self.board.audience = Some(poll);
        self.spend_joker(JokerKind::Audience, Some(poll), None)
    }

    /// Start the authority call. The joker is not spent until the reply
    /// arrives; no second request can start meanwhile.
    pub fn begin_authority(&mut self) -> Option<AuthorityRequest> {
        if !self.joker_ready(JokerKind::Authority) || self.authority.is_some() {
            return None;
        }
        let question = self.question.clone()?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.authority = Some(PendingAuthority {
            ticket,
            slot: self.slot,
            question: question.clone(),
        });
        log::debug!("{} authority ticket {ticket} issued", self.run.id);
        Some(AuthorityRequest {
            ticket,
            question_number: self.slot + 1,
            difficulty: question.difficulty,
            question,
        })
    }

    /// Apply the authority reply. A failed call falls back to fixed text and
    /// still spends the joker. Replies for a stale ticket, a finished run or
    /// a run whose final verdict is already revealed are dropped. The step is recorded against the question the request
    /// was made for; the panel only opens if that question is still in play.
    pub fn complete_authority<E: fmt::Display>(
        &mut self,
        ticket: u64,
        reply: Result<String, E>,
    ) -> bool {
        let Some(pending) = self.authority.take_if(|pending| pending.ticket == ticket) else {
            log::debug!("{} dropping authority reply for ticket {ticket}", self.run.id);
            return false;
        };
        if let Err(err) = &reply {
            log::warn!("{} authority provider failed: {err}", self.run.id);
        }
        if !self.jokers.consume(JokerKind::Authority) {
            return false;
        }
        let advisory = jokers::authority_advisory(reply);
        if self.slot == pending.slot && matches!(self.phase, Phase::AwaitingSelection { .. }) {
            self.board.advisory = Some(advisory);
        }
        let step = step_event(
            &self.run.id,
            pending.slot,
            &pending.question,
            StepKind::Joker {
                used_joker: JokerKind::Authority,
                audience_result: None,
                hidden_options: None,
            },
            earned_so_far(pending.slot),
        );
        self.emit(step);
        true
    }

    /// Run the authority joker against a blocking provider.
    pub fn use_authority<H: HintTextProvider>(&mut self, provider: &H) -> bool {
        let Some(request) = self.begin_authority() else {
            return false;
        };
        let reply = provider.fetch_hint_text(&request.question, request.difficulty);
        self.complete_authority(request.ticket, reply)
    }

    // Internals -------------------------------------------------------------

    fn timer_paused(&self) -> bool {
        self.config.pause_timer_on_advisory && self.board.advisory.is_some()
    }

    fn joker_ready(&self, kind: JokerKind) -> bool {
        !self.jokers.is_used(kind) && matches!(self.phase, Phase::AwaitingSelection { .. })
    }

    fn spend_joker(
        &mut self,
        kind: JokerKind,
        audience_result: Option<AudiencePoll>,
        hidden_options: Option<HiddenOptions>,
    ) -> bool {
        if !self.jokers.consume(kind) {
            return false;
        }
        self.record(
            StepKind::Joker {
                used_joker: kind,
                audience_result,
                hidden_options,
            },
            earned_so_far(self.slot),
        );
        true
    }

    fn load_question(&mut self) -> Result<(), QuizError> {
        let question_number = self.slot + 1;
        let fetched =
            self.provider
                .fetch_question(question_number, self.category_filter, &self.used_ids);
        let question = match fetched {
            Ok(Some(question)) => question,
            Ok(None) => return Err(self.abort(QuizError::QuestionExhausted { question_number })),
            Err(err) => {
                return Err(self.abort(QuizError::QuestionProvider {
                    question_number,
                    source: Box::new(err),
                }));
            }
        };
        if let Err(source) = question.validate() {
            return Err(self.abort(QuizError::InvalidQuestion {
                question_id: question.id,
                source,
            }));
        }
        if !self.used_ids.insert(question.id.clone()) {
            log::warn!(
                "{} provider repeated question {} for Q{question_number}",
                self.run.id,
                question.id
            );
        }
        log::debug!(
            "{} Q{question_number} loaded {} ({}, difficulty {})",
            self.run.id,
            question.id,
            question.category,
            question.difficulty
        );
        self.board = Board::default();
        self.phase = Phase::AwaitingSelection {
            selection: None,
            countdown: Countdown::for_question(question_number),
        };
        self.question = Some(question);
        Ok(())
    }

    fn evaluate(&mut self) {
        let Phase::Locked {
            selection, frozen, ..
        } = self.phase
        else {
            return;
        };
        let Some(correct) = self.question.as_ref().map(|q| q.is_correct(selection)) else {
            return;
        };

        if correct {
            self.board.second_chance_armed = false;
            self.record(
                StepKind::Answer {
                    selected_option: Some(selection),
                    is_correct: true,
                },
                reward_at(self.slot),
            );
            let then = if is_final_slot(self.slot) {
                AfterReveal::Finish {
                    outcome: RunOutcome::Completed,
                    earnings: top_reward(),
                    correct_count: TOTAL_QUESTIONS,
                }
            } else {
                AfterReveal::NextQuestion
            };
            if matches!(then, AfterReveal::Finish { .. }) {
                self.cancel_authority();
            }
            self.phase = Phase::Revealed {
                selection: Some(selection),
                correct: true,
                pending: self.config.reveal_delay(),
                then,
            };
            return;
        }

        if self.board.second_chance_armed {
            log::debug!(
                "{} Q{} second chance absorbs {selection}",
                self.run.id,
                self.slot + 1
            );
            self.board.second_chance_armed = false;
            self.board.advisory = Some(Advisory::new("Second Chance", SECOND_CHANCE_RETRY_TEXT));
            self.phase = Phase::AwaitingSelection {
                selection: None,
                countdown: frozen,
            };
            return;
        }

        let floor = safety_floor(self.slot);
        self.record(
            StepKind::Answer {
                selected_option: Some(selection),
                is_correct: false,
            },
            floor,
        );
        self.cancel_authority();
        self.phase = Phase::Revealed {
            selection: Some(selection),
            correct: false,
            pending: self.config.reveal_delay(),
            then: AfterReveal::Finish {
                outcome: RunOutcome::WrongAnswer,
                earnings: floor,
                correct_count: self.slot,
            },
        };
    }

    fn expire(&mut self) {
        log::debug!("{} Q{} timed out", self.run.id, self.slot + 1);
        let floor = safety_floor(self.slot);
        self.record(
            StepKind::Answer {
                selected_option: None,
                is_correct: false,
            },
            floor,
        );
        self.board.advisory = None;
        self.cancel_authority();
        self.phase = Phase::Revealed {
            selection: None,
            correct: false,
            pending: self.config.timeout_delay(),
            then: AfterReveal::Finish {
                outcome: RunOutcome::TimedOut,
                earnings: floor,
                correct_count: self.slot,
            },
        };
    }

    /// Drop an in-flight authority call once the run's outcome is settled.
    fn cancel_authority(&mut self) {
        if let Some(pending) = self.authority.take() {
            log::debug!(
                "{} authority ticket {} cancelled, outcome settled",
                self.run.id,
                pending.ticket
            );
        }
    }

    fn after_reveal(&mut self) -> Result<(), QuizError> {
        let Phase::Revealed { then, .. } = self.phase else {
            return Ok(());
        };
        match then {
            AfterReveal::NextQuestion => {
                self.slot += 1;
                self.question = None;
                self.phase = Phase::Loading;
                self.load_question()
            }
            AfterReveal::Finish {
                outcome,
                earnings,
                correct_count,
            } => {
                self.finish(outcome, earnings, correct_count);
                Ok(())
            }
        }
    }

    fn finish(&mut self, outcome: RunOutcome, final_earnings: u32, correct_count: usize) {
        if self.is_over() {
            return;
        }
        let offset = TimeDelta::from_std(self.clock).unwrap_or_else(|_| TimeDelta::zero());
        let ended_at = self
            .run
            .started_at
            .checked_add_signed(offset)
            .unwrap_or(self.run.started_at);
        let summary = build_summary(
            &self.run,
            outcome,
            final_earnings,
            correct_count,
            self.jokers,
            ended_at,
        );
        log::info!(
            "{} finished ({outcome}): {final_earnings} after {correct_count} correct, {} jokers",
            self.run.id,
            self.jokers.used_count()
        );
        self.outbox.push(PersistOp::FinishRun(summary.completion()));
        self.run = summary.run.clone();
        self.board = Board::default();
        self.authority = None;
        self.question = None;
        self.phase = Phase::Finished(Box::new(summary));
    }

    fn abort(&mut self, err: QuizError) -> QuizError {
        log::info!("{} aborted at Q{}: {err}", self.run.id, self.slot + 1);
        self.board = Board::default();
        self.authority = None;
        self.question = None;
        self.phase = Phase::Aborted;
        err
    }

    fn record(&mut self, kind: StepKind, earnings_after: u32) {
        let Some(question) = self.question.as_ref() else {
            return;
        };
        let step = step_event(&self.run.id, self.slot, question, kind, earnings_after);
        self.emit(step);
    }

    fn emit(&mut self, step: StepEvent) {
        log::debug!(
            "{} Q{} step {:?} (earnings {})",
            step.run_id,
            step.question_number,
            step.kind,
            step.earnings_after
        );
        self.outbox.push(PersistOp::RecordStep(step));
    }
}

fn step_event(
    run_id: &str,
    slot: usize,
    question: &Question,
    kind: StepKind,
    earnings_after: u32,
) -> StepEvent {
    StepEvent {
        run_id: run_id.to_string(),
        question_number: slot + 1,
        question_id: question.id.clone(),
        category: question.category,
        difficulty: question.difficulty,
        earnings_after,
        kind,
    }
}
