//! Async play-through of a single run.
//!
//! Gameplay never waits on storage: every operation a session queues is sent
//! to a [`PersistenceWriter`] task and the run moves on. The authority joker
//! goes through an [`AuthorityLine`] with real (simulated) latency, so its
//! two-phase begin/complete flow is exercised the way a UI would drive it.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use quiz_game::{
    AuthorityRequest, BankProvider, CategoryMode, FlushReport, JokerFlags, MemoryStore, NewRun,
    OptionKey, PersistOp, PhaseKind, QuestionBank, QuizSession, RunOutcome, RunStore,
    SessionConfig, StepEvent, apply_ops,
};
use quiz_game::Category;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::policy::{Action, Choice, JokerPlay, PlayerPolicy, Strategy, TurnContext};

type Session = QuizSession<BankProvider<ChaCha20Rng>>;

#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("authority line dropped for question {question_number}")]
    Dropped { question_number: usize },
}

/// Remote source of authority advice.
#[async_trait]
pub trait AuthorityLine: Send + Sync {
    async fn advise(&self, request: &AuthorityRequest) -> Result<String, AuthorityError>;
}

/// Answers after a fixed delay and fails a seeded share of calls.
#[derive(Debug, Clone)]
pub struct SimulatedAuthority {
    latency: Duration,
    failure_pct: u8,
    seed: u64,
}

impl SimulatedAuthority {
    #[must_use]
    pub fn new(latency: Duration, failure_pct: u8, seed: u64) -> Self {
        Self {
            latency,
            failure_pct: failure_pct.min(100),
            seed,
        }
    }
}

#[async_trait]
impl AuthorityLine for SimulatedAuthority {
    async fn advise(&self, request: &AuthorityRequest) -> Result<String, AuthorityError> {
        tokio::time::sleep(self.latency).await;
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed ^ request.ticket);
        if rng.gen_range(0..100) < u32::from(self.failure_pct) {
            return Err(AuthorityError::Dropped {
                question_number: request.question_number,
            });
        }
        let answer = request.question.correct_option;
        Ok(format!(
            "Our records point to {}: {}.",
            answer,
            request.question.option_text(answer)
        ))
    }
}

/// Background task applying persistence operations to a shared store.
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<PersistOp>,
    handle: JoinHandle<FlushReport>,
}

impl PersistenceWriter {
    #[must_use]
    pub fn spawn(store: Arc<MemoryStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PersistOp>();
        let handle = tokio::spawn(async move {
            let mut total = FlushReport::default();
            while let Some(op) = rx.recv().await {
                let report = apply_ops(store.as_ref(), [op]);
                total.applied += report.applied;
                total.failed += report.failed;
            }
            total
        });
        Self { tx, handle }
    }

    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<PersistOp> {
        self.tx.clone()
    }

    /// Close the channel and wait for every queued write.
    pub async fn shutdown(self) -> Result<FlushReport> {
        drop(self.tx);
        self.handle.await.context("persistence writer panicked")
    }
}

/// Everything a run needs besides its strategy and seed.
#[derive(Clone)]
pub struct PlayContext {
    pub bank: Arc<QuestionBank>,
    pub config: SessionConfig,
    pub store: Arc<MemoryStore>,
    pub persist: mpsc::UnboundedSender<PersistOp>,
    pub authority: Arc<dyn AuthorityLine>,
}

/// How a run is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSetup {
    pub strategy: Strategy,
    pub category_mode: CategoryMode,
    pub initial_category: Option<Category>,
}

impl RunSetup {
    #[must_use]
    pub const fn random(strategy: Strategy) -> Self {
        Self {
            strategy,
            category_mode: CategoryMode::Random,
            initial_category: None,
        }
    }

    #[must_use]
    pub const fn chosen(strategy: Strategy, category: Category) -> Self {
        Self {
            strategy,
            category_mode: CategoryMode::Chosen,
            initial_category: Some(category),
        }
    }
}

/// What one automated run produced.
#[derive(Debug, Clone)]
pub struct PlaySummary {
    pub run_id: String,
    pub seed: u64,
    pub strategy: Strategy,
    pub outcome: RunOutcome,
    pub final_earnings: u32,
    pub correct_count: usize,
    pub jokers: JokerFlags,
    /// Every operation the session queued, in order.
    pub ops: Vec<PersistOp>,
    /// Earned-so-far amounts observed before each action; never decreasing.
    pub earned_trace: Vec<u32>,
    pub questions_seen: usize,
    pub elapsed: Duration,
}

impl PlaySummary {
    pub fn steps(&self) -> impl Iterator<Item = &StepEvent> {
        self.ops.iter().filter_map(|op| match op {
            PersistOp::RecordStep(step) => Some(step),
            PersistOp::FinishRun(_) => None,
        })
    }

    #[must_use]
    pub fn finish_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, PersistOp::FinishRun(_)))
            .count()
    }
}

/// Play one run to completion.
pub async fn play_run(ctx: &PlayContext, setup: RunSetup, seed: u64) -> Result<PlaySummary> {
    let request = NewRun::new(
        format!("bot-{seed}"),
        &format!("Bot {}", setup.strategy),
        setup.category_mode,
        setup.initial_category,
    )?;
    let run = ctx.store.start_run(request)?;
    let provider = BankProvider::seeded(ctx.bank.as_ref().clone(), seed);
    let mut session: Session = QuizSession::start(run, provider, seed, ctx.config.clone())?;
    let mut policy = setup.strategy.create_policy(seed);
    let mut ops = Vec::new();
    let mut earned_trace = Vec::new();
    let mut questions_seen = 0;

    while !session.is_over() {
        earned_trace.push(session.snapshot().earned_so_far);
        questions_seen += 1;
        play_question(ctx, &mut session, policy.as_mut()).await?;
        forward(ctx, &mut session, &mut ops);
    }
    forward(ctx, &mut session, &mut ops);

    let Some(summary) = session.summary() else {
        bail!("run {} ended without a summary", session.run().id);
    };
    log::debug!(
        "{} finished via {} with {}",
        summary.run.id,
        summary.outcome,
        summary.final_earnings()
    );
    Ok(PlaySummary {
        run_id: summary.run.id.clone(),
        seed,
        strategy: setup.strategy,
        outcome: summary.outcome,
        final_earnings: summary.final_earnings(),
        correct_count: summary.correct_count(),
        jokers: summary.run.jokers,
        ops,
        earned_trace,
        questions_seen,
        elapsed: session.elapsed(),
    })
}

fn forward(ctx: &PlayContext, session: &mut Session, ops: &mut Vec<PersistOp>) {
    for op in session.drain_persistence() {
        ops.push(op.clone());
        if ctx.persist.send(op).is_err() {
            log::warn!("persistence writer is gone; dropping op");
        }
    }
}

async fn play_question(
    ctx: &PlayContext,
    session: &mut Session,
    policy: &mut (dyn PlayerPolicy + Send),
) -> Result<()> {
    let slot = session.slot();
    let Some(question) = session.question().cloned() else {
        bail!("no question in play at Q{}", slot + 1);
    };
    let turn_ctx = TurnContext {
        question_number: slot + 1,
        question: &question,
        jokers: session.jokers(),
        timed: session.time_left().is_some(),
    };
    let turn = policy.plan_turn(&turn_ctx);
    log::debug!("{} Q{} {:?}", policy.name(), slot + 1, turn);

    for play in turn.plays {
        match play {
            JokerPlay::Use(request) => {
                session.use_joker(request);
            }
            JokerPlay::Authority => {
                if let Some(request) = session.begin_authority() {
                    let reply = ctx.authority.advise(&request).await;
                    session.complete_authority(request.ticket, reply);
                }
            }
            JokerPlay::SwitchCategory(target) => {
                session.switch_category(target);
            }
        }
        session.dismiss_advisory();
    }

    match turn.action {
        Action::CashOut => {
            if !session.cash_out() {
                bail!("cash-out refused at Q{}", slot + 1);
            }
        }
        Action::Expire => {
            let Some(left) = session.time_left() else {
                bail!("Q{} is untimed and cannot expire", slot + 1);
            };
            session.advance(left)?;
            settle(session)?;
        }
        Action::Answer(choice) => {
            let mut choice = choice;
            loop {
                lock_in(session, choice)?;
                if session.is_over() || session.slot() != slot {
                    break;
                }
                // Second chance put the question back in play.
                let retry_ctx = TurnContext {
                    jokers: session.jokers(),
                    ..turn_ctx
                };
                choice = policy.retry(&retry_ctx);
            }
        }
    }
    Ok(())
}

fn lock_in(session: &mut Session, choice: Choice) -> Result<()> {
    let key = resolve(session, choice)?;
    if !session.select_option(key) || !session.commit() {
        bail!("could not lock in {key} (phase {})", session.phase());
    }
    session.advance(session.config().lock_delay())?;
    settle(session)
}

/// Drive scheduled transitions until the session wants input again.
fn settle(session: &mut Session) -> Result<()> {
    loop {
        match session.phase() {
            PhaseKind::Revealed => {
                session.advance_after_reveal()?;
            }
            PhaseKind::Locked => {
                session.advance(session.config().lock_delay())?;
            }
            PhaseKind::AwaitingSelection | PhaseKind::Finished | PhaseKind::Aborted => {
                return Ok(());
            }
            PhaseKind::Loading => bail!("session stuck loading"),
        }
    }
}

fn resolve(session: &Session, choice: Choice) -> Result<OptionKey> {
    let Some(question) = session.question() else {
        bail!("no question to answer");
    };
    match choice {
        Choice::Correct => Ok(question.correct_option),
        Choice::Wrong => question
            .wrong_options()
            .into_iter()
            .find(|key| !session.hidden_options().contains(key))
            .context("no visible wrong option"),
    }
}
