//! stakepool CLI: replays operation scripts against a simulated pool and
//! inspects saved pool images.

mod script;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use stakepool_pool::{init_logging, LogFormat, PoolConfig};
use stakepool_rewards::PoolImage;
use stakepool_types::AccountId;

use crate::script::{Script, Simulation};

#[derive(Parser)]
#[command(name = "stakepool", about = "Staking pool simulator")]
struct Cli {
    /// Path to a TOML pool configuration file. CLI flags and env vars
    /// override the file's logging settings.
    #[arg(long, env = "STAKEPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "STAKEPOOL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "STAKEPOOL_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay a script and print one JSON line per step, then a summary.
    Run {
        /// Script file (TOML).
        #[arg(long)]
        script: PathBuf,

        /// Abort on the first failing step.
        #[arg(long)]
        strict: bool,

        /// Write the final pool image to this path.
        #[arg(long)]
        dump_image: Option<PathBuf>,
    },
    /// Print a saved pool image as JSON.
    Inspect {
        image: PathBuf,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PoolConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PoolConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    let format: LogFormat = config.log_format()?;
    init_logging(format, &config.log_level)?;

    match cli.command {
        Command::Run {
            script,
            strict,
            dump_image,
        } => run(&config, &script, strict, dump_image.as_deref()),
        Command::Inspect { image } => inspect(&image),
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn run(
    config: &PoolConfig,
    script_path: &Path,
    strict: bool,
    dump_image: Option<&Path>,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(script_path)
        .with_context(|| format!("failed to read script {}", script_path.display()))?;
    let script = Script::from_toml_str(&text)?;
    tracing::info!(
        script = %script_path.display(),
        steps = script.steps.len(),
        "replaying script"
    );

    let mut sim = Simulation::new(config, &script)?;
    for outcome in sim.run(&script.steps, strict)? {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    println!("{}", serde_json::to_string_pretty(&sim.report()?)?);

    if let Some(path) = dump_image {
        let bytes = sim.image()?.to_bytes()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write image {}", path.display()))?;
        tracing::info!(path = %path.display(), "pool image saved");
    }
    Ok(())
}

#[derive(Serialize)]
struct ImageSummary<'a> {
    participants: usize,
    total_supply: u128,
    reward_pool_remaining: u128,
    rate_scale: u128,
    poisoned: Option<&'a str>,
    accounts: Vec<(&'a AccountId, u128, u128)>,
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    let image = PoolImage::from_bytes(&bytes)?;
    let summary = ImageSummary {
        participants: image.ledger.accounts.len(),
        total_supply: image.ledger.pool.total_staked_supply,
        reward_pool_remaining: image.ledger.pool.reward_pool_remaining,
        rate_scale: image.rate_scale,
        poisoned: image.poisoned.as_deref(),
        accounts: image
            .ledger
            .accounts
            .iter()
            .map(|(id, account)| (id, account.staked_balance, account.pending_reward))
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
