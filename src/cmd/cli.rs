//! Harness entry point for `harness = false` test targets.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::process::ExitCode;

use crate::{
    list_scenarios, run_suites, Config, HarnessOptions, HarnessRun, Reporter, RunOrder,
    SuiteRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "kaleido")]
#[command(about = "combinatorial scenario-variation harness for storage-copy tools")]
pub struct HarnessCli {
    /// Path to config file. Missing configs are treated as "defaults".
    #[arg(long, default_value = "kaleido.toml")]
    pub config: PathBuf,

    /// Log level.
    #[arg(long, default_value = "info")]
    pub log: String,

    /// Machine-readable output to stdout (JSON).
    #[arg(long)]
    pub json: bool,

    /// Substring filter over suite/scenario names.
    #[arg(long)]
    pub filter: Option<String>,

    /// List matching scenarios without running them.
    #[arg(long)]
    pub list: bool,

    /// Reporter format.
    #[arg(long)]
    pub reporter: Option<Reporter>,

    /// Dispatch order for pending variations.
    #[arg(long)]
    pub order: Option<RunOrder>,

    /// Seed for shuffled dispatch (reproducible orders).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after the first failing scenario.
    #[arg(long)]
    pub fail_fast: bool,

    /// Artifacts directory override.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Positional name patterns (as forwarded by `cargo test <pattern>`);
    /// the first acts as a filter when `--filter` is not given.
    pub patterns: Vec<String>,
}

/// Parses harness arguments, runs the registered suites, and reports. Meant
/// to be called from a `harness = false` test target's `main`.
pub fn harness_main(registry: SuiteRegistry) -> ExitCode {
    let cli = HarnessCli::parse();

    if let Err(err) = init_tracing(&cli.log) {
        // Tracing is best-effort; if it fails, we still continue.
        eprintln!("warning: failed to init tracing: {err:#}");
    }

    let config = Config::load_optional(&cli.config);

    match run_harness(&cli, &config, &registry) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;
    Ok(())
}

fn run_harness(cli: &HarnessCli, config: &Config, registry: &SuiteRegistry) -> anyhow::Result<ExitCode> {
    let filter = cli.filter.clone().or_else(|| cli.patterns.first().cloned());

    if cli.list {
        let names = list_scenarios(registry, filter.as_deref());
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&names)?);
        } else {
            for name in names {
                println!("{name}");
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let opts = HarnessOptions {
        filter,
        reporter: cli.reporter,
        order: cli.order,
        seed: cli.seed,
        fail_fast: cli.fail_fast,
        artifacts_dir: cli.artifacts.clone(),
    };

    let run = run_suites(config, registry, &opts)?;
    print_run(cli, config, &run)?;

    if run.report.all_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_run(cli: &HarnessCli, config: &Config, run: &HarnessRun) -> anyhow::Result<()> {
    let reporter = cli.reporter.unwrap_or(config.reporter);
    if cli.json || matches!(reporter, Reporter::Json) {
        println!("{}", serde_json::to_string_pretty(&run.report)?);
        return Ok(());
    }

    println!("{}", run.report.pretty());
    println!("report={}", run.report_path.display());
    if matches!(reporter, Reporter::Junit) {
        println!("junit={}", run.artifacts_dir.join("junit.xml").display());
    }
    Ok(())
}
