//! SDBench - Sequential Diagnosis Benchmark CLI
//!
//! The `sdbench` command runs diagnostic agents against clinical cases and
//! compares the results.
//!
//! ## Commands
//!
//! - `validate`: Check a case file and list rejected records
//! - `run`: Run one agent over a case file, or the built-in demo cases
//! - `compare`: Summarise several results files side by side
//!
//! The `completion` agent talks to an OpenAI-compatible endpoint; set
//! `SDBENCH_API_KEY` (or `OPENAI_API_KEY`) and optionally `SDBENCH_API_BASE`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use sdbench_core::agents::{
    ChatCompletionsClient, ChatConfig, CompletionAgent, ProtocolAgent, RandomAgent,
};
use sdbench_core::domain::{load_cases_jsonl, BenchmarkResult, CaseFile, CaseFilter};
use sdbench_core::ports::{AgentFactory, DiagnosticAgent, NamedFactory};
use sdbench_core::{
    compare_results, read_results_json, reference_services, render_comparison_md,
    synthetic_cases, write_report_md, write_results_csv, write_results_json, write_transcripts,
    BenchConfig, BenchmarkRunner,
};

#[derive(Parser)]
#[command(name = "sdbench")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sequential Diagnosis Benchmark (SDBench)", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Benchmark configuration file (TOML)
    #[arg(short, long, global = true, env = "SDBENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSONL case file
    Validate {
        /// Path to the case file
        cases: PathBuf,
    },

    /// Run an agent over a case file
    Run {
        /// Path to the case file
        #[arg(required_unless_present = "demo", conflicts_with = "demo")]
        cases: Option<PathBuf>,

        /// Use the built-in synthetic demo cases instead of a file
        #[arg(long)]
        demo: bool,

        /// Agent to evaluate
        #[arg(short, long, value_enum, default_value = "protocol")]
        agent: AgentKind,

        /// Seed for the random agent
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Model id for the completion agent
        #[arg(long, env = "SDBENCH_MODEL", required_if_eq("agent", "completion"))]
        model: Option<String>,

        /// Override max_turns_per_case
        #[arg(long)]
        max_turns: Option<u32>,

        /// Override max_concurrent_encounters
        #[arg(long)]
        concurrency: Option<usize>,

        /// Evaluate at most this many cases
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only held-out test cases
        #[arg(long)]
        test_only: bool,

        /// Only cases published in this year or later
        #[arg(long)]
        since: Option<i32>,

        /// Write results JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a markdown report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write one transcript per case into this directory
        #[arg(long)]
        transcripts: Option<PathBuf>,
    },

    /// Compare results files from different agents
    Compare {
        /// Results files written by `sdbench run --output`
        #[arg(required = true)]
        results: Vec<PathBuf>,

        /// Also write one summary row per agent to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AgentKind {
    Random,
    Protocol,
    Conservative,
    Aggressive,
    Completion,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    sdbench_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate { cases } => cmd_validate(&cases),
        Commands::Run {
            cases,
            demo,
            agent,
            seed,
            model,
            max_turns,
            concurrency,
            limit,
            test_only,
            since,
            output,
            report,
            transcripts,
        } => {
            let config = build_config(cli.config.as_deref(), max_turns, concurrency)?;
            let filter = CaseFilter {
                test_only,
                min_publication_year: since,
                limit,
            };
            let outputs = RunOutputs {
                results: output,
                report,
                transcripts,
            };
            let source = match cases {
                Some(path) if !demo => CaseSource::File(path),
                _ => CaseSource::Demo,
            };
            let factory = agent_factory(agent, seed, model.as_deref())?;
            cmd_run(&source, config, filter, factory, &outputs).await
        }
        Commands::Compare { results, csv } => cmd_compare(&results, csv.as_deref()),
    }
}

/// Defaults, then the TOML file, then `SDBENCH_*` variables, then flags.
fn build_config(
    path: Option<&Path>,
    max_turns: Option<u32>,
    concurrency: Option<usize>,
) -> Result<BenchConfig> {
    let base = match path {
        Some(p) => BenchConfig::load(p).with_context(|| format!("load config {:?}", p))?,
        None => BenchConfig::default(),
    };
    let mut config = base
        .with_env_overrides()
        .context("apply SDBENCH_* overrides")?;
    if let Some(n) = max_turns {
        config.max_turns_per_case = n;
    }
    if let Some(n) = concurrency {
        config.max_concurrent_encounters = n;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn agent_factory(
    kind: AgentKind,
    seed: u64,
    model: Option<&str>,
) -> Result<Arc<dyn AgentFactory>> {
    let factory: Arc<dyn AgentFactory> = match kind {
        AgentKind::Random => {
            Arc::new(move || -> Box<dyn DiagnosticAgent> { Box::new(RandomAgent::new(seed)) })
        }
        AgentKind::Protocol => {
            Arc::new(|| -> Box<dyn DiagnosticAgent> { Box::new(ProtocolAgent::default()) })
        }
        AgentKind::Conservative => {
            Arc::new(|| -> Box<dyn DiagnosticAgent> { Box::new(ProtocolAgent::conservative()) })
        }
        AgentKind::Aggressive => {
            Arc::new(|| -> Box<dyn DiagnosticAgent> { Box::new(ProtocolAgent::aggressive()) })
        }
        AgentKind::Completion => {
            let model = model.context("--model is required for the completion agent")?;
            let config = ChatConfig::from_env(model)?;
            let client = Arc::new(ChatCompletionsClient::new(config)?);
            let name = format!("completion:{model}");
            let agent_name = name.clone();
            Arc::new(NamedFactory::new(
                name,
                move || -> Box<dyn DiagnosticAgent> {
                    Box::new(CompletionAgent::new(agent_name.clone(), Arc::clone(&client)))
                },
            ))
        }
    };
    Ok(factory)
}

fn cmd_validate(path: &Path) -> Result<()> {
    let report = load_cases_jsonl(path).with_context(|| format!("read cases {:?}", path))?;

    println!("Cases: {}", report.cases.len());
    let test_cases = report.cases.iter().filter(|c| c.is_test_case).count();
    println!("  test cases: {}", test_cases);
    if report.is_clean() {
        println!("\n✓ All records valid");
        return Ok(());
    }

    println!("Rejected: {}", report.rejected.len());
    for r in &report.rejected {
        println!("  ✗ line {}: {}", r.line, r.reason);
    }
    bail!("{} invalid record(s) in {:?}", report.rejected.len(), path)
}

enum CaseSource {
    File(PathBuf),
    Demo,
}

impl CaseSource {
    fn load(&self) -> Result<Vec<CaseFile>> {
        match self {
            CaseSource::Demo => Ok(synthetic_cases()),
            CaseSource::File(path) => {
                let loaded =
                    load_cases_jsonl(path).with_context(|| format!("read cases {:?}", path))?;
                for r in &loaded.rejected {
                    warn!(line = r.line, reason = %r.reason, "skipping invalid case record");
                }
                Ok(loaded.cases)
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            CaseSource::File(path) => format!("{:?}", path),
            CaseSource::Demo => "the demo set".to_string(),
        }
    }
}

struct RunOutputs {
    results: Option<PathBuf>,
    report: Option<PathBuf>,
    transcripts: Option<PathBuf>,
}

async fn cmd_run(
    source: &CaseSource,
    config: BenchConfig,
    filter: CaseFilter,
    factory: Arc<dyn AgentFactory>,
    outputs: &RunOutputs,
) -> Result<()> {
    let cases = filter.apply(source.load()?);
    if cases.is_empty() {
        bail!("no cases to run in {}", source.describe());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            on_signal.cancel();
        }
    });

    info!(cases = cases.len(), agent = %factory.agent_name(), "starting benchmark");
    let runner = BenchmarkRunner::new(config, reference_services()).with_cancellation(cancel);
    let result = runner.run(factory, Arc::from(cases)).await;

    print_summary(&result);

    if let Some(p) = &outputs.results {
        write_results_json(p, &result)?;
        println!("Results written to {}", p.display());
    }
    if let Some(p) = &outputs.report {
        write_report_md(p, &result)?;
        println!("Report written to {}", p.display());
    }
    if let Some(dir) = &outputs.transcripts {
        let written = write_transcripts(dir, &result.encounters)?;
        println!("{} transcript(s) written to {}", written.len(), dir.display());
    }

    if result.cancelled {
        bail!("run cancelled after {} case(s)", result.total_cases);
    }
    Ok(())
}

fn print_summary(result: &BenchmarkResult) {
    println!("\nAgent: {}", result.agent_name);
    println!("Run:   {}", result.run_id);
    println!(
        "Accuracy: {:.2}% ({}/{})",
        result.diagnostic_accuracy * 100.0,
        result.correct_cases,
        result.total_cases
    );
    println!("Average cost: ${:.2}", result.average_cost);
    for e in &result.encounters {
        let mark = if e.is_correct(result.threshold) {
            "✓"
        } else {
            "✗"
        };
        let score = e
            .score()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} score={} cost=${:.2} turns={} ({})",
            mark,
            e.case_id,
            score,
            e.cumulative_cost,
            e.turn_count,
            e.outcome.label()
        );
    }
}

fn cmd_compare(paths: &[PathBuf], csv: Option<&Path>) -> Result<()> {
    let mut results = Vec::with_capacity(paths.len());
    for p in paths {
        results.push(read_results_json(p)?.result);
    }

    let digests: std::collections::BTreeSet<&str> =
        results.iter().map(|r| r.dataset_digest.as_str()).collect();
    if digests.len() > 1 {
        warn!("results were produced on different case sets; comparison may be misleading");
    }

    let cmp = compare_results(&results);
    println!("{}", render_comparison_md(&cmp));
    if let Some(p) = csv {
        write_results_csv(p, &results)?;
        println!("CSV written to {}", p.display());
    }
    Ok(())
}
