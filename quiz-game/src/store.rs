//! Run persistence: the session outbox, an in-memory store, and the
//! leaderboard/admin read models.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::RunStore;
use crate::run::{NewRun, Run, RunCompletion};
use crate::step::StepEvent;

/// A write the session wants performed. Sessions never talk to a store
/// directly; callers drain these and apply them fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PersistOp {
    RecordStep(StepEvent),
    FinishRun(RunCompletion),
}

impl PersistOp {
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::RecordStep(step) => &step.run_id,
            Self::FinishRun(completion) => &completion.run_id,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown run {0}")]
    UnknownRun(String),
    #[error("run {0} is already finished")]
    AlreadyFinished(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Best result per player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    pub best_earnings: u32,
    pub runs_count: usize,
}

/// Aggregate view for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminSummary {
    /// Finished runs only.
    pub total_runs: usize,
    /// Runs opened but never finished (in progress or aborted).
    pub open_runs: usize,
    pub total_players: usize,
    pub avg_earnings: f64,
    pub top_earnings: u32,
    pub recent_runs: Vec<Run>,
    pub recent_steps: Vec<StepEvent>,
    pub category_switches: Vec<StepEvent>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    runs: Vec<Run>,
    index: HashMap<String, usize>,
    steps: Vec<StepEvent>,
}

/// Thread-safe store keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Copy of a run record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        let state = self.lock()?;
        Ok(state.index.get(run_id).map(|&idx| state.runs[idx].clone()))
    }

    /// Every recorded step of one run, in write order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn steps_for(&self, run_id: &str) -> Result<Vec<StepEvent>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .steps
            .iter()
            .filter(|step| step.run_id == run_id)
            .cloned()
            .collect())
    }

    /// Open a run with an explicit start time.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn start_run_at(
        &self,
        request: NewRun,
        started_at: DateTime<Utc>,
    ) -> Result<Run, StoreError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let run = Run::open(format!("run-{}", state.next_id), request, started_at);
        let idx = state.runs.len();
        state.index.insert(run.id.clone(), idx);
        state.runs.push(run.clone());
        log::debug!("opened {} for {}", run.id, run.user_id);
        Ok(run)
    }

    /// Finalize a run with an explicit end time.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown or already finished run.
    pub fn finish_run_at(
        &self,
        completion: &RunCompletion,
        ended_at: DateTime<Utc>,
    ) -> Result<Run, StoreError> {
        let mut state = self.lock()?;
        let idx = *state
            .index
            .get(&completion.run_id)
            .ok_or_else(|| StoreError::UnknownRun(completion.run_id.clone()))?;
        let run = &mut state.runs[idx];
        if run.is_finished() {
            return Err(StoreError::AlreadyFinished(completion.run_id.clone()));
        }
        *run = run.finalized(
            completion.final_earnings,
            completion.correct_count,
            completion.jokers,
            ended_at,
        );
        Ok(run.clone())
    }
}

impl RunStore for MemoryStore {
    type Error = StoreError;

    fn start_run(&self, request: NewRun) -> Result<Run, Self::Error> {
        self.start_run_at(request, Utc::now())
    }

    fn record_step(&self, step: &StepEvent) -> Result<(), Self::Error> {
        let mut state = self.lock()?;
        if !state.index.contains_key(&step.run_id) {
            return Err(StoreError::UnknownRun(step.run_id.clone()));
        }
        state.steps.push(step.clone());
        Ok(())
    }

    fn finish_run(&self, completion: &RunCompletion) -> Result<(), Self::Error> {
        self.finish_run_at(completion, Utc::now()).map(|_| ())
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, Self::Error> {
        let state = self.lock()?;
        let mut by_user: HashMap<&str, LeaderboardEntry> = HashMap::new();
        for run in state.runs.iter().filter(|run| run.is_finished()) {
            let entry = by_user
                .entry(run.user_id.as_str())
                .or_insert_with(|| LeaderboardEntry {
                    user_id: run.user_id.clone(),
                    display_name: run.display_name.clone(),
                    best_earnings: 0,
                    runs_count: 0,
                });
            entry.runs_count += 1;
            if run.final_earnings >= entry.best_earnings {
                entry.best_earnings = run.final_earnings;
                entry.display_name.clone_from(&run.display_name);
            }
        }
        let mut entries: Vec<LeaderboardEntry> = by_user.into_values().collect();
        entries.sort_by(|a, b| {
            b.best_earnings
                .cmp(&a.best_earnings)
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    fn admin_summary(&self, recent: usize) -> Result<AdminSummary, Self::Error> {
        let state = self.lock()?;
        let finished: Vec<&Run> = state.runs.iter().filter(|run| run.is_finished()).collect();
        let earnings_total: u64 = finished
            .iter()
            .map(|run| u64::from(run.final_earnings))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let avg_earnings = if finished.is_empty() {
            0.0
        } else {
            earnings_total as f64 / finished.len() as f64
        };
        let top_earnings = finished
            .iter()
            .map(|run| run.final_earnings)
            .max()
            .unwrap_or(0);
        let mut players: Vec<&str> = finished.iter().map(|run| run.user_id.as_str()).collect();
        players.sort_unstable();
        players.dedup();

        Ok(AdminSummary {
            total_runs: finished.len(),
            open_runs: state.runs.len() - finished.len(),
            total_players: players.len(),
            avg_earnings,
            top_earnings,
            recent_runs: state.runs.iter().rev().take(recent).cloned().collect(),
            recent_steps: state.steps.iter().rev().take(recent).cloned().collect(),
            category_switches: state
                .steps
                .iter()
                .filter(|step| step.is_category_switch())
                .cloned()
                .collect(),
        })
    }
}

/// Outcome of flushing an outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlushReport {
    pub applied: usize,
    pub failed: usize,
}

/// Apply operations in order. Failures are logged and skipped; the game
/// never waits on or retries a write.
pub fn apply_ops<S: RunStore>(store: &S, ops: impl IntoIterator<Item = PersistOp>) -> FlushReport {
    let mut report = FlushReport::default();
    for op in ops {
        let result = match &op {
            PersistOp::RecordStep(step) => store.record_step(step),
            PersistOp::FinishRun(completion) => store.finish_run(completion),
        };
        match result {
            Ok(()) => report.applied += 1,
            Err(err) => {
                log::warn!("persistence write for {} failed: {err}", op.run_id());
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jokers::{JokerFlags, JokerKind};
    use crate::question::Category;
    use crate::run::CategoryMode;
    use crate::step::StepKind;

    fn request(user: &str, name: &str) -> NewRun {
        NewRun::new(user, name, CategoryMode::Random, None).unwrap()
    }

    fn completion(run_id: &str, earnings: u32) -> RunCompletion {
        RunCompletion {
            run_id: run_id.to_string(),
            final_earnings: earnings,
            correct_count: 3,
            jokers: JokerFlags::default(),
        }
    }

    fn switch_step(run_id: &str) -> StepEvent {
        StepEvent {
            run_id: run_id.to_string(),
            question_number: 2,
            question_id: "q2".to_string(),
            category: Category::Sports,
            difficulty: 2,
            earnings_after: 5,
            kind: StepKind::CategorySwitch {
                category_switch_to: Category::History,
            },
        }
    }

    #[test]
    fn runs_finish_exactly_once() {
        let store = MemoryStore::new();
        let run = store.start_run(request("u1", "Ada")).unwrap();
        assert_eq!(run.id, "run-1");
        store.finish_run(&completion(&run.id, 30)).unwrap();
        assert_eq!(
            store.finish_run(&completion(&run.id, 50)),
            Err(StoreError::AlreadyFinished("run-1".to_string()))
        );
        assert_eq!(
            store.finish_run(&completion("run-9", 50)),
            Err(StoreError::UnknownRun("run-9".to_string()))
        );
        assert_eq!(store.run("run-1").unwrap().unwrap().final_earnings, 30);
    }

    #[test]
    fn leaderboard_keeps_best_per_player() {
        let store = MemoryStore::new();
        for (user, name, earnings) in [
            ("u1", "Ada", 30),
            ("u1", "Ada", 400),
            ("u2", "Bob", 400),
            ("u3", "Cy", 5),
        ] {
            let run = store.start_run(request(user, name)).unwrap();
            store.finish_run(&completion(&run.id, earnings)).unwrap();
        }
        store.start_run(request("u4", "Unfinished")).unwrap();

        let board = store.leaderboard(10).unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, ["Ada", "Bob", "Cy"]);
        assert_eq!(board[0].runs_count, 2);
        assert_eq!(store.leaderboard(1).unwrap().len(), 1);
    }

    #[test]
    fn admin_summary_aggregates_finished_runs() {
        let store = MemoryStore::new();
        let first = store.start_run(request("u1", "Ada")).unwrap();
        let second = store.start_run(request("u2", "Bob")).unwrap();
        let abandoned = store.start_run(request("u3", "Cy")).unwrap();
        store.record_step(&switch_step(&first.id)).unwrap();
        store.finish_run(&completion(&first.id, 100)).unwrap();
        store.finish_run(&completion(&second.id, 50)).unwrap();

        let summary = store.admin_summary(5).unwrap();
        assert_eq!(summary.total_runs, 2);
        assert_eq!(summary.open_runs, 1);
        assert_eq!(summary.total_players, 2);
        assert!((summary.avg_earnings - 75.0).abs() < f64::EPSILON);
        assert_eq!(summary.top_earnings, 100);
        assert_eq!(summary.recent_runs[0].id, abandoned.id);
        assert_eq!(summary.recent_runs[1].id, second.id);
        assert_eq!(summary.category_switches.len(), 1);
    }

    #[test]
    fn apply_ops_logs_and_continues() {
        let store = MemoryStore::new();
        let run = store.start_run(request("u1", "Ada")).unwrap();
        let mut flags = JokerFlags::default();
        flags.consume(JokerKind::Hint);
        let ops = vec![
            PersistOp::RecordStep(switch_step("run-404")),
            PersistOp::RecordStep(switch_step(&run.id)),
            PersistOp::FinishRun(RunCompletion {
                jokers: flags,
                ..completion(&run.id, 20)
            }),
        ];
        let report = apply_ops(&store, ops);
        assert_eq!(report, FlushReport { applied: 2, failed: 1 });
        assert_eq!(store.steps_for(&run.id).unwrap().len(), 1);
        assert!(store.run(&run.id).unwrap().unwrap().jokers.is_used(JokerKind::Hint));
    }
}
