//! Limitbook CLI — scenario runs, randomized traffic, and level lookups.
//!
//! Commands:
//! - `run` — execute a TOML scenario and write `report.json` + `fills.csv`
//! - `fuzz` — run seeded random scenarios in parallel and check invariants
//! - `level` — show the price level a tick falls into

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use limitbook_core::engine::{discretize, MAX_TICK, MIN_TICK};
use limitbook_sim::{run_batch, run_scenario, save_artifacts, Scenario, SimReport, StepStatus};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "limitbook",
    about = "Limitbook CLI — limit orders resting on an AMM pool"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a scenario file.
    Run {
        /// Path to a TOML scenario.
        #[arg(long)]
        scenario: PathBuf,

        /// Directory for report.json and fills.csv. Nothing is written without it.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Generate and run seeded random scenarios.
    Fuzz {
        /// Master seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of scenarios.
        #[arg(long, default_value_t = 16)]
        runs: u64,

        /// Steps per scenario.
        #[arg(long, default_value_t = 200)]
        steps: usize,

        /// Write all outcomes as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the price level containing a tick.
    Level {
        #[arg(long, allow_hyphen_values = true)]
        tick: i32,

        #[arg(long)]
        spacing: i32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { scenario, output_dir } => run_scenario_cmd(scenario, output_dir),
        Commands::Fuzz {
            seed,
            runs,
            steps,
            output,
        } => run_fuzz(seed, runs, steps, output),
        Commands::Level { tick, spacing } => run_level(tick, spacing),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn run_scenario_cmd(path: PathBuf, output_dir: Option<PathBuf>) -> Result<()> {
    let scenario = Scenario::from_file(&path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;
    info!(path = %path.display(), steps = scenario.steps.len(), "scenario loaded");
    let report = run_scenario(&scenario)?;

    print_summary(&report);

    if let Some(dir) = output_dir {
        let report_path = save_artifacts(&report, &dir)?;
        println!("Report saved to: {}", report_path.display());
    }

    if !report.is_clean() {
        bail!("invariant violations detected");
    }
    Ok(())
}

fn print_summary(report: &SimReport) {
    println!("Scenario {}", report.scenario_hash);
    println!(
        "  steps: {} applied, {} rejected",
        report.applied(),
        report.rejected()
    );
    for step in report.steps.iter().filter(|s| s.status == StepStatus::Rejected) {
        println!("    #{} {} ({}): {}", step.index, step.action, step.account, step.detail);
    }
    if report.failed_sweeps() > 0 {
        println!("  failed sweeps: {}", report.failed_sweeps());
        for step in &report.steps {
            if let Some(err) = &step.sweep_error {
                println!("    #{} {}: {}", step.index, step.detail, err);
            }
        }
    }
    println!("  fills: {}", report.fills.len());
    for fill in &report.fills {
        println!(
            "    sweep {} level {} {}: {} in, {} out",
            fill.sweep, fill.level, fill.direction, fill.amount_in, fill.amount_out
        );
    }
    for (pool, level) in &report.last_levels {
        println!("  {pool}: last level {level}");
    }
    for (step, violation) in report.violations() {
        println!("  VIOLATION after step {step}: {violation}");
    }
}

fn run_fuzz(seed: u64, runs: u64, steps: usize, output: Option<PathBuf>) -> Result<()> {
    info!(seed, runs, steps, "starting fuzz batch");
    let outcomes = run_batch(seed, runs, steps)?;

    let mut dirty = 0;
    for o in &outcomes {
        println!(
            "run {:>4}  seed {:>20}  applied {:>5}  rejected {:>5}  fills {:>4}  violations {}",
            o.run,
            o.seed,
            o.applied,
            o.rejected,
            o.fills,
            o.violations.len()
        );
        for v in &o.violations {
            println!("    {v}");
        }
        if !o.violations.is_empty() {
            dirty += 1;
        }
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcomes).context("failed to serialize outcomes")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Outcomes saved to: {}", path.display());
    }

    if dirty > 0 {
        bail!("{dirty} of {runs} runs violated invariants");
    }
    Ok(())
}

fn run_level(tick: i32, spacing: i32) -> Result<()> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        bail!("tick {tick} outside [{MIN_TICK}, {MAX_TICK}]");
    }
    if spacing <= 0 {
        bail!("spacing must be positive, got {spacing}");
    }
    let level = discretize(tick, spacing);
    let end = i64::from(level) + i64::from(spacing);
    println!("tick {tick} -> level {level} (covers [{level}, {end}))");
    Ok(())
}
