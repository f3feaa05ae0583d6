mod backends;
mod scenarios;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use scenarios::{ALL_SCENARIOS, run_scenario};

#[derive(Debug, Parser)]
#[command(name = "pitchday-tester", version = "0.1.0")]
#[command(about = "Automated QA testing for the Pitchday kernel - determinism, clamping, fallback")]
struct Args {
    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Date key to generate against (defaults to today)
    #[arg(long)]
    date_key: Option<String>,

    /// Number of iterations per scenario
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ScenarioResult {
    scenario_name: String,
    passed: bool,
    iterations_run: usize,
    failures: Vec<String>,
    average_duration: Duration,
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
    let date_key = resolve_date_key(&args);
    let scenario_names = expand_scenarios(&args.scenarios);
    log::info!("running {} scenarios against {date_key}", scenario_names.len());

    let mut results = Vec::new();
    for name in &scenario_names {
        results.push(run_one(name, &date_key, &args).await);
    }

    write_report(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

async fn run_one(name: &str, date_key: &str, args: &Args) -> ScenarioResult {
    let mut failures = Vec::new();
    let mut total = Duration::ZERO;

    for iteration in 0..args.iterations {
        let iter_start = Instant::now();
        let outcome = run_scenario(name, date_key).await;
        total += iter_start.elapsed();
        if let Err(e) = outcome {
            failures.push(format!("iteration {iteration}: {e:#}"));
        } else if args.verbose {
            println!("   {name} iteration {iteration} ok");
        }
    }

    let passed = failures.is_empty();
    let average_duration = total / args.iterations.max(1) as u32;
    if passed {
        println!("✅ {} - {average_duration:?}", name.green());
    } else {
        eprintln!("❌ {} - {}", name.red(), failures.join("; "));
    }

    ScenarioResult {
        scenario_name: name.to_string(),
        passed,
        iterations_run: args.iterations,
        failures,
        average_duration,
    }
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target, "Available scenarios:")?;
    for name in ALL_SCENARIOS {
        writeln!(output_target, "  {name}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎤 Pitchday Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn resolve_date_key(args: &Args) -> String {
    args.date_key
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string())
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut names = split_csv(scenarios_arg);
    if names.contains(&"all".to_string()) {
        names.retain(|s| s != "all");
        for name in ALL_SCENARIOS {
            if !names.contains(&name.to_string()) {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn write_report(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    if args.report == "json" {
        serde_json::to_writer_pretty(&mut output_target, results)?;
        writeln!(&mut output_target)?;
    } else {
        let passed = results.iter().filter(|r| r.passed).count();
        writeln!(&mut output_target)?;
        writeln!(
            &mut output_target,
            "{passed}/{} scenarios passed",
            results.len()
        )?;
        for result in results.iter().filter(|r| !r.passed) {
            for failure in &result.failures {
                writeln!(&mut output_target, "  {}: {failure}", result.scenario_name)?;
            }
        }
    }

    writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
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

    fn base_args() -> Args {
        Args {
            scenarios: "all".to_string(),
            list_scenarios: false,
            date_key: Some("2025-06-01".to_string()),
            iterations: 1,
            report: "console".to_string(),
            verbose: false,
            output: None,
        }
    }

    #[test]
    fn expands_all_scenarios_keyword() {
        let expanded = expand_scenarios("all");
        assert_eq!(expanded.len(), ALL_SCENARIOS.len());
        assert!(expanded.contains(&"determinism".to_string()));
    }

    #[test]
    fn expand_scenarios_without_all_preserves_order() {
        let expanded = expand_scenarios("clamping, fallback");
        assert_eq!(
            expanded,
            vec!["clamping".to_string(), "fallback".to_string()]
        );
    }

    #[test]
    fn expand_scenarios_merges_all_without_duplicates() {
        let expanded = expand_scenarios("bankroll,all");
        assert_eq!(expanded.len(), ALL_SCENARIOS.len());
        assert_eq!(expanded[0], "bankroll");
    }

    #[test]
    fn resolve_date_key_prefers_explicit_value() {
        let args = base_args();
        assert_eq!(resolve_date_key(&args), "2025-06-01");
    }

    #[test]
    fn resolve_date_key_falls_back_to_today() {
        let args = Args {
            date_key: None,
            ..base_args()
        };
        let key = resolve_date_key(&args);
        assert_eq!(key.len(), 10);
        assert_eq!(key.matches('-').count(), 2);
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = std::env::temp_dir().join("pitchday-scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("single-flight"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        let args = base_args();
        assert!(!maybe_list_scenarios(&args).unwrap());
    }

    #[test]
    fn write_report_emits_json_output() {
        let temp = std::env::temp_dir().join("pitchday-report.json");
        let args = Args {
            report: "json".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        let results = vec![ScenarioResult {
            scenario_name: "determinism".to_string(),
            passed: true,
            iterations_run: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(3),
        }];
        write_report(&args, &results, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("scenario_name"));
        assert!(content.contains("determinism"));
    }

    #[test]
    fn write_report_console_lists_failures() {
        let temp = std::env::temp_dir().join("pitchday-report.txt");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        let results = vec![ScenarioResult {
            scenario_name: "clamping".to_string(),
            passed: false,
            iterations_run: 1,
            failures: vec!["iteration 0: units escaped bounds".to_string()],
            average_duration: Duration::from_millis(3),
        }];
        write_report(&args, &results, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("0/1 scenarios passed"));
        assert!(content.contains("units escaped bounds"));
    }

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(
            split_csv(" a, ,b,"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
