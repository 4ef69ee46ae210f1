use anyhow::Result;
use colored::Colorize;
use quiz_game::{AdminSummary, FlushReport, LeaderboardEntry, RunStore};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::common::scenario::TestScenario;
use crate::logic::runner::{PersistenceWriter, PlayContext, PlaySummary, RunSetup, play_run};

/// Check applied to every finished run of a plan.
pub type Expectation = fn(&PlaySummary) -> Result<()>;

/// A strategy plus the expectations its runs must meet.
#[derive(Debug, Clone)]
pub struct PlayPlan {
    pub setup: RunSetup,
    pub expectations: Vec<Expectation>,
}

impl PlayPlan {
    #[must_use]
    pub const fn new(setup: RunSetup) -> Self {
        Self {
            setup,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

/// Store-side view gathered once every write has landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub persistence: FlushReport,
    pub runs_checked: usize,
    pub mismatches: Vec<String>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub admin: AdminSummary,
}

impl AuditReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.persistence.failed == 0 && self.mismatches.is_empty()
    }
}

#[derive(Debug, Clone)]
struct AuditEntry {
    run_id: String,
    final_earnings: u32,
    correct_count: usize,
    steps: usize,
}

pub struct LogicTester {
    ctx: PlayContext,
    writer: PersistenceWriter,
    audit: Vec<AuditEntry>,
    verbose: bool,
}

impl LogicTester {
    #[must_use]
    pub const fn new(ctx: PlayContext, writer: PersistenceWriter, verbose: bool) -> Self {
        Self {
            ctx,
            writer,
            audit: Vec::new(),
            verbose,
        }
    }

    pub async fn run_scenario(
        &mut self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (strategy: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.plan.setup.strategy,
                    seed
                );
            }
            let result = self.run_single_scenario(scenario, seed, iterations).await;
            results.push(result);
        }

        results
    }

    async fn run_single_scenario(
        &mut self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let summary = match play_run(&self.ctx, scenario.plan.setup, iteration_seed).await {
                Ok(summary) => summary,
                Err(err) => {
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}): run failed: {err:#}",
                        i + 1
                    ));
                    continue;
                }
            };
            self.audit.push(AuditEntry {
                run_id: summary.run_id.clone(),
                final_earnings: summary.final_earnings,
                correct_count: summary.correct_count,
                steps: summary.steps().count(),
            });

            if let Some(err) = evaluate_expectations(&scenario.plan, &summary) {
                failures.push(format!(
                    "Iteration {} ({}, seed {}, strategy {}, outcome {}, earnings {}, correct {}): {}",
                    i + 1,
                    summary.run_id,
                    summary.seed,
                    summary.strategy,
                    summary.outcome,
                    summary.final_earnings,
                    summary.correct_count,
                    err
                ));
                if self.verbose {
                    println!(
                        "  ❌ Iteration {}/{} failed: {}",
                        i + 1,
                        iterations,
                        err.red()
                    );
                }
            } else {
                successes += 1;
                let duration = start_time.elapsed();
                performance_data.push(duration);
                if self.verbose {
                    println!(
                        "  ✅ Iteration {}/{} passed ({duration:?}) outcome:{} earnings:{} questions:{} game time:{:?}",
                        i + 1,
                        iterations,
                        summary.outcome,
                        summary.final_earnings,
                        summary.questions_seen,
                        summary.elapsed
                    );
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    /// Wait for the writer to drain, then compare the store with what the
    /// runs reported.
    pub async fn finish(self, leaderboard_size: usize) -> Result<AuditReport> {
        let Self {
            ctx, writer, audit, ..
        } = self;
        let store = ctx.store.clone();
        drop(ctx);
        let persistence = writer.shutdown().await?;

        let mut mismatches = Vec::new();
        for entry in &audit {
            match store.run(&entry.run_id)? {
                Some(run) if run.is_finished() => {
                    if run.final_earnings != entry.final_earnings
                        || run.correct_count != entry.correct_count
                    {
                        mismatches.push(format!(
                            "{}: stored {}/{} but played {}/{}",
                            entry.run_id,
                            run.final_earnings,
                            run.correct_count,
                            entry.final_earnings,
                            entry.correct_count
                        ));
                    }
                }
                Some(_) => mismatches.push(format!("{} was never finished", entry.run_id)),
                None => mismatches.push(format!("{} is missing from the store", entry.run_id)),
            }
            let stored_steps = store.steps_for(&entry.run_id)?.len();
            if stored_steps != entry.steps {
                mismatches.push(format!(
                    "{}: {} steps stored, {} emitted",
                    entry.run_id, stored_steps, entry.steps
                ));
            }
        }

        Ok(AuditReport {
            persistence,
            runs_checked: audit.len(),
            mismatches,
            leaderboard: store.leaderboard(leaderboard_size)?,
            admin: store.admin_summary(leaderboard_size)?,
        })
    }
}

fn evaluate_expectations(plan: &PlayPlan, summary: &PlaySummary) -> Option<String> {
    for expectation in &plan.expectations {
        if let Err(err) = expectation(summary) {
            return Some(err.to_string());
        }
    }
    None
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_micros().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u128::deserialize(deserializer)?;
        Ok(Duration::from_micros(u64::try_from(micros).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let micros: Vec<u128> = durations.iter().map(Duration::as_micros).collect();
        micros.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = Vec::<u128>::deserialize(deserializer)?;
        Ok(micros
            .into_iter()
            .map(|m| Duration::from_micros(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scenario::get_scenario;
    use crate::common::util::load_bank;
    use crate::logic::runner::SimulatedAuthority;
    use quiz_game::{MemoryStore, SessionConfig};
    use std::sync::Arc;

    fn tester() -> LogicTester {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::spawn(Arc::clone(&store));
        let ctx = PlayContext {
            bank: Arc::new(load_bank(None).unwrap()),
            config: SessionConfig::instant(),
            store,
            persist: writer.sender(),
            authority: Arc::new(SimulatedAuthority::new(Duration::ZERO, 50, 1)),
        };
        LogicTester::new(ctx, writer, false)
    }

    #[tokio::test]
    async fn scenarios_pass_and_audit_matches_store() {
        let mut tester = tester();
        let mut results = Vec::new();
        for key in ["cash-out", "joker-sweep", "random-invariants"] {
            let scenario = get_scenario(key).unwrap();
            results.extend(tester.run_scenario(&scenario, &[1, 2], 3).await);
        }
        assert_eq!(results.len(), 6);
        for result in &results {
            assert!(result.passed, "{}: {:?}", result.scenario_name, result.failures);
            assert_eq!(result.successful_iterations, 3);
        }

        let audit = tester.finish(5).await.unwrap();
        assert!(audit.passed(), "{:?}", audit.mismatches);
        assert_eq!(audit.runs_checked, 18);
        assert_eq!(audit.admin.total_runs, 18);
        assert!(audit.leaderboard.len() <= 5);
    }

    #[tokio::test]
    async fn failing_expectation_is_reported() {
        fn never(_: &PlaySummary) -> Result<()> {
            anyhow::bail!("never satisfied")
        }
        let mut scenario = get_scenario("perfect").unwrap();
        scenario.plan = scenario.plan.with_expectation(never);

        let mut tester = tester();
        let results = tester.run_scenario(&scenario, &[4], 2).await;
        assert!(!results[0].passed);
        assert_eq!(results[0].failures.len(), 2);
        assert!(results[0].failures[0].contains("never satisfied"));
    }

    #[test]
    fn durations_serialize_as_micros() {
        let result = ScenarioResult {
            scenario_name: "x".to_string(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_micros(1_500),
            performance_data: vec![Duration::from_micros(1_500)],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 1_500);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.performance_data, result.performance_data);
    }
}
