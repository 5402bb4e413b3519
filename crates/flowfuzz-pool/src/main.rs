//! Fuzz the DFX curve pool on a chain preset.
//!
//! `flowfuzz-pool run ethereum` runs one sequence of 30 flows with seed 44;
//! exit status 1 means a sequence failed and its reproduction record was
//! printed. `flowfuzz-pool replay <record.json> <chain>` re-runs a record.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flowfuzz_core::{run_campaign, run_campaign_isolated, CampaignConfig, FailurePolicy};
use flowfuzz_explore::{replay, ReproductionRecord};
use flowfuzz_pool::{dfx_plan, pool_factory, ChainConfig, PoolHarness};
use tracing_subscriber::EnvFilter;

const SEED: u64 = 44;

#[derive(Parser, Debug)]
#[command(name = "flowfuzz-pool", version, about = "Stateful fuzzing of a two-asset curve pool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a campaign against a chain preset
    Run(RunArgs),
    /// Replay a reproduction record
    Replay(ReplayArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Chain {
    Ethereum,
    Polygon,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Policy {
    FailFast,
    Aggregate,
}

#[derive(Args, Debug)]
struct PoolArgs {
    #[arg(value_enum)]
    chain: Chain,

    /// Use the pre-fix pool (deposits round down, no surcharge)
    #[arg(long, default_value_t = false)]
    vulnerable: bool,

    /// Override the extra base units approved per deposit
    #[arg(long)]
    add: Option<u128>,
}

impl PoolArgs {
    fn chain_config(&self) -> ChainConfig {
        let mut chain = match self.chain {
            Chain::Ethereum => ChainConfig::ethereum(),
            Chain::Polygon => ChainConfig::polygon(),
        };
        if self.vulnerable {
            chain = chain.vulnerable();
        }
        if let Some(add) = self.add {
            chain = chain.with_add(add);
        }
        chain
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    pool: PoolArgs,

    /// Campaign config JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    sequences: Option<u32>,

    /// Flows per sequence
    #[arg(long)]
    flows: Option<u64>,

    #[arg(long, value_enum)]
    policy: Option<Policy>,

    /// Wall-clock budget in seconds
    #[arg(long)]
    time_limit: Option<u64>,

    /// Run sequences in parallel with per-sequence streams
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Write the full campaign report here as JSON
    #[arg(long)]
    report_out: Option<PathBuf>,

    /// Write the first reproduction record here as JSON
    #[arg(long)]
    record_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Reproduction record JSON
    record: PathBuf,

    #[command(flatten)]
    pool: PoolArgs,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn campaign_config(args: &RunArgs) -> Result<CampaignConfig> {
    let mut config = match &args.config {
        Some(path) => CampaignConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CampaignConfig {
            seed: SEED,
            sequences_count: 1,
            flows_count: 30,
            ..CampaignConfig::default()
        },
    };
    if let Some(n) = args.sequences {
        config.sequences_count = n;
    }
    if let Some(n) = args.flows {
        config.flows_count = n;
    }
    if let Some(policy) = args.policy {
        config.failure_policy = match policy {
            Policy::FailFast => FailurePolicy::FailFast,
            Policy::Aggregate => FailurePolicy::Aggregate,
        };
    }
    if args.time_limit.is_some() {
        config.time_limit_secs = args.time_limit;
    }
    config.validate().context("invalid campaign config")?;
    Ok(config)
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let chain = args.pool.chain_config();
    let config = campaign_config(&args)?;
    let plan = dfx_plan().context("building fuzz plan")?;
    let factory = pool_factory(chain);

    let report = if args.parallel {
        run_campaign_isolated(&plan, &factory, &config)?
    } else {
        run_campaign(&plan, &factory, &config)?
    };

    if let Some(path) = &args.report_out {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if report.is_success() {
        println!(
            "ok: {} sequence(s), {} flows, {} checks (seed {})",
            report.sequences.len(),
            report.total_flows,
            report.total_checks,
            report.seed
        );
        return Ok(ExitCode::SUCCESS);
    }

    for record in &report.failures {
        println!("{}", record.render());
    }
    if let Some(first) = report.first_failure() {
        let json = first.to_json()?;
        match &args.record_out {
            Some(path) => std::fs::write(path, json)
                .with_context(|| format!("writing {}", path.display()))?,
            None => println!("{json}"),
        }
    }
    Ok(ExitCode::FAILURE)
}

fn replay_record(args: ReplayArgs) -> Result<ExitCode> {
    let json = std::fs::read_to_string(&args.record)
        .with_context(|| format!("reading {}", args.record.display()))?;
    let record = ReproductionRecord::from_json(&json).context("parsing reproduction record")?;
    let plan = dfx_plan().context("building fuzz plan")?;
    let mut sut = PoolHarness::fork(args.pool.chain_config()).context("forking pool")?;

    let outcome = replay(&record, &plan, &mut sut)?;
    match &outcome.failure {
        Some(failure) => {
            println!("reproduced at step {}: {failure}", outcome.trace.len());
            Ok(ExitCode::FAILURE)
        }
        None => {
            println!("replayed {} flows without failure", outcome.trace.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => run(args),
        Command::Replay(args) => replay_record(args),
    }
}
