use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use super::{AuditReport, ScenarioResult};

#[derive(Serialize)]
struct JsonReport<'a> {
    results: &'a [ScenarioResult],
    audit: &'a AuditReport,
}

fn success_rate(results: &[ScenarioResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    #[allow(clippy::cast_precision_loss)]
    let rate = (passed as f64 / results.len() as f64) * 100.0;
    rate
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    audit: &AuditReport,
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Quiz Run Test Results".bright_cyan().bold())?;
    writeln!(out, "{}", "========================".cyan())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "Total scenarios: {total_tests}")?;
    writeln!(out, "Passed: {}", passed_tests.to_string().green())?;
    writeln!(out, "Failed: {}", failed_tests.to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", "🗄️  Persistence Audit".bright_yellow().bold())?;
    writeln!(out, "{}", "====================".yellow())?;
    writeln!(
        out,
        "Writes applied: {} failed: {}",
        audit.persistence.applied, audit.persistence.failed
    )?;
    writeln!(out, "Runs checked: {}", audit.runs_checked)?;
    for mismatch in &audit.mismatches {
        writeln!(out, "   • {}", mismatch.red())?;
    }
    writeln!(
        out,
        "Runs: {} (open {}) | Players: {} | Avg earnings: {:.1} | Top: {} | Switches: {}",
        audit.admin.total_runs,
        audit.admin.open_runs,
        audit.admin.total_players,
        audit.admin.avg_earnings,
        audit.admin.top_earnings,
        audit.admin.category_switches.len()
    )?;

    if !audit.leaderboard.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "🏆 Leaderboard".bright_green().bold())?;
        for (rank, entry) in audit.leaderboard.iter().enumerate() {
            writeln!(
                out,
                "  {:>2}. {:24} {:>5} ({} runs)",
                rank + 1,
                entry.display_name,
                entry.best_earnings,
                entry.runs_count
            )?;
        }
    }
    Ok(())
}

pub fn generate_json_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    audit: &AuditReport,
) -> Result<()> {
    let json_output = serde_json::to_string_pretty(&JsonReport { results, audit })?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    audit: &AuditReport,
) -> Result<()> {
    writeln!(out, "# Quiz Run Test Results\n")?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenarios**: {total_tests}")?;
    writeln!(out, "- **Passed**: {passed_tests}")?;
    writeln!(out, "- **Failed**: {}", total_tests - passed_tests)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(out, "### {} {} (seed {})\n", status, result.scenario_name, result.seed)?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;
        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "## Persistence\n")?;
    writeln!(
        out,
        "- **Writes**: {} applied, {} failed",
        audit.persistence.applied, audit.persistence.failed
    )?;
    writeln!(out, "- **Runs checked**: {}", audit.runs_checked)?;
    for mismatch in &audit.mismatches {
        writeln!(out, "  - {mismatch}")?;
    }

    writeln!(out, "\n## Leaderboard\n")?;
    writeln!(out, "| Rank | Player | Best | Runs |")?;
    writeln!(out, "|------|--------|------|------|")?;
    for (rank, entry) in audit.leaderboard.iter().enumerate() {
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            rank + 1,
            entry.display_name,
            entry.best_earnings,
            entry.runs_count
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_game::{AdminSummary, FlushReport, LeaderboardEntry};

    fn result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Perfect Run".to_string(),
            seed: 9,
            passed,
            iterations_run: 2,
            successful_iterations: usize::from(passed) * 2,
            failures: if passed {
                Vec::new()
            } else {
                vec!["Iteration 1: boom".to_string()]
            },
            average_duration: Duration::from_millis(3),
            performance_data: vec![Duration::from_millis(3)],
        }
    }

    fn audit() -> AuditReport {
        AuditReport {
            persistence: FlushReport {
                applied: 32,
                failed: 0,
            },
            runs_checked: 2,
            mismatches: Vec::new(),
            leaderboard: vec![LeaderboardEntry {
                user_id: "bot-9".to_string(),
                display_name: "Bot Perfect".to_string(),
                best_earnings: 1_000,
                runs_count: 2,
            }],
            admin: AdminSummary {
                total_runs: 2,
                open_runs: 0,
                total_players: 1,
                avg_earnings: 1_000.0,
                top_earnings: 1_000,
                recent_runs: Vec::new(),
                recent_steps: Vec::new(),
                category_switches: Vec::new(),
            },
        }
    }

    #[test]
    fn markdown_lists_results_and_leaderboard() {
        let mut buf = Vec::new();
        generate_markdown_report(&mut buf, &[result(true), result(false)], &audit()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("- **Success rate**: 50.0%"));
        assert!(text.contains("  - Iteration 1: boom"));
        assert!(text.contains("| 1 | Bot Perfect | 1000 | 2 |"));
    }

    #[test]
    fn json_wraps_results_and_audit() {
        let mut buf = Vec::new();
        generate_json_report(&mut buf, &[result(true)], &audit()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["results"][0]["seed"], 9);
        assert_eq!(value["audit"]["persistence"]["applied"], 32);
        assert_eq!(value["audit"]["leaderboard"][0]["best_earnings"], 1_000);
    }

    #[test]
    fn console_report_mentions_audit() {
        let mut buf = Vec::new();
        generate_console_report(&mut buf, &[result(true)], &audit(), Duration::from_secs(1))
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Runs checked: 2"));
        assert!(text.contains("Bot Perfect"));
    }
}
