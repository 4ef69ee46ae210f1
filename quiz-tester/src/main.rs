mod common;
mod logic;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use quiz_game::MemoryStore;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::scenario::{all_scenario_keys, get_scenario, list_scenarios};
use common::{load_bank, load_config, split_csv};
use logic::{
    AuditReport, LogicTester, PersistenceWriter, PlayContext, ScenarioResult, SimulatedAuthority,
    resolve_seed_inputs,
};

#[derive(Debug, Parser)]
#[command(name = "quiz-tester", version)]
#[command(about = "Automated play-throughs and audit checks for the quiz run engine")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated integers or `phrase:<text>`)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 5)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Question bank JSON (defaults to the bundled bank)
    #[arg(long)]
    questions: Option<PathBuf>,

    /// Session timing JSON (defaults to zero delays)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Percentage of authority calls that fail
    #[arg(long, default_value_t = 10)]
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    hint_failure_pct: u8,

    /// Simulated authority latency in milliseconds
    #[arg(long, default_value_t = 2)]
    authority_latency_ms: u64,

    /// Leaderboard rows to show
    #[arg(long, default_value_t = 10)]
    leaderboard: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let seeds: Vec<u64> = seed_infos.iter().map(|s| s.seed).collect();
    if args.verbose {
        let labels: Vec<&str> = seed_infos.iter().map(|s| s.label.as_str()).collect();
        println!("🌱 Seeds: {}", labels.join(", "));
    }

    let bank = load_bank(args.questions.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    log::info!(
        "{} questions loaded; delays {}/{}/{} ms",
        bank.len(),
        config.lock_delay_ms,
        config.reveal_delay_ms,
        config.timeout_delay_ms
    );

    let store = Arc::new(MemoryStore::new());
    let writer = PersistenceWriter::spawn(Arc::clone(&store));
    let ctx = PlayContext {
        bank: Arc::new(bank),
        config,
        store,
        persist: writer.sender(),
        authority: Arc::new(SimulatedAuthority::new(
            Duration::from_millis(args.authority_latency_ms),
            args.hint_failure_pct,
            seeds.first().copied().unwrap_or_default(),
        )),
    };
    let mut tester = LogicTester::new(ctx, writer, args.verbose);

    let results = run_scenarios(&mut tester, &scenarios, &seeds, args.iterations).await;
    let audit = tester.finish(args.leaderboard).await?;

    write_reports(&args, &results, &audit, start_time)?;

    if results.iter().any(|r| !r.passed) || !audit.passed() {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎯 Quiz Run Tester".bright_cyan().bold());
    println!("{}", "==================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for key in all_scenario_keys() {
            if !scenarios.contains(&key) {
                scenarios.push(key);
            }
        }
    }
    scenarios
}

async fn run_scenarios(
    tester: &mut LogicTester,
    scenarios: &[String],
    seeds: &[u64],
    iterations: usize,
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Play-Throughs".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let mut results = Vec::new();
    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            results.extend(tester.run_scenario(&scenario, seeds, iterations).await);
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }
    results
}

fn write_reports(
    args: &Args,
    results: &[ScenarioResult],
    audit: &AuditReport,
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results, audit)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Quiz Run Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results, audit)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    audit,
                    start_time.elapsed(),
                )?;
            }
        }
    }

    if args.report != "json" {
        let duration = start_time.elapsed();
        writeln!(&mut output_target)?;
        writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_game::{AdminSummary, FlushReport};

    fn base_args() -> Args {
        Args {
            scenarios: "perfect".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: "json".to_string(),
            output: None,
            questions: None,
            config: None,
            hint_failure_pct: 0,
            authority_latency_ms: 0,
            leaderboard: 3,
            verbose: false,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "quiz-tester-main-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn empty_audit() -> AuditReport {
        AuditReport {
            persistence: FlushReport::default(),
            runs_checked: 0,
            mismatches: Vec::new(),
            leaderboard: Vec::new(),
            admin: AdminSummary {
                total_runs: 0,
                open_runs: 0,
                total_players: 0,
                avg_earnings: 0.0,
                top_earnings: 0,
                recent_runs: Vec::new(),
                recent_steps: Vec::new(),
                category_switches: Vec::new(),
            },
        }
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::parse_from(["quiz-tester"]);
        assert_eq!(args.scenarios, "all");
        assert_eq!(args.report, "console");
        assert_eq!(args.hint_failure_pct, 10);
        assert!(Args::try_parse_from(["quiz-tester", "--hint-failure-pct", "101"]).is_err());
    }

    #[test]
    fn expand_all_keeps_explicit_order_without_duplicates() {
        let scenarios = expand_scenarios("timeout,all");
        assert_eq!(scenarios[0], "timeout");
        assert_eq!(
            scenarios.iter().filter(|s| s.as_str() == "timeout").count(),
            1
        );
        assert_eq!(scenarios.len(), all_scenario_keys().len());
    }

    #[test]
    fn list_scenarios_writes_to_file() {
        let mut args = base_args();
        args.list_scenarios = true;
        let path = temp_path("list");
        args.output = Some(path.clone());
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("joker-sweep"));
    }

    #[test]
    fn empty_markdown_report_says_so() {
        let mut args = base_args();
        args.report = "markdown".to_string();
        let path = temp_path("md");
        args.output = Some(path.clone());
        write_reports(&args, &[], &empty_audit(), Instant::now()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("_No scenarios executed._"));
        assert!(content.contains("Total time"));
    }

    #[tokio::test]
    async fn json_report_round_trips_a_real_run() {
        let args = base_args();
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::spawn(Arc::clone(&store));
        let ctx = PlayContext {
            bank: Arc::new(load_bank(None).unwrap()),
            config: load_config(None).unwrap(),
            store,
            persist: writer.sender(),
            authority: Arc::new(SimulatedAuthority::new(Duration::ZERO, 0, 1)),
        };
        let mut tester = LogicTester::new(ctx, writer, false);
        let results =
            run_scenarios(&mut tester, &expand_scenarios(&args.scenarios), &[1], 1).await;
        let audit = tester.finish(args.leaderboard).await.unwrap();

        let path = temp_path("json");
        let mut args = args;
        args.output = Some(path.clone());
        write_reports(&args, &results, &audit, Instant::now()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["results"][0]["passed"], true);
        assert_eq!(value["audit"]["admin"]["top_earnings"], 1_000);
    }
}
