//! Module for the CLI.

use crate::{FillRunner, HashRunner, TestExecutor};
use anyhow::{anyhow, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use eft_filler::DEFAULT_CHAIN_ID;
use eft_forks::ForkSchedule;
use eft_t8n::GethTransitionTool;
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{
    filter::{Directive, LevelFilter},
    EnvFilter,
};

/// The log targets of the workspace crates.
const LOG_TARGETS: [&str; 7] = ["cli", "chain", "env", "header", "requests", "witness", "t8n"];

/// Main CLI
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count)]
    pub v: u8,
    /// The subcommand to run.
    #[clap(subcommand)]
    pub subcommand: EftSubcommand,
}

/// Subcommands for the CLI.
#[derive(Debug, Clone, Subcommand)]
pub enum EftSubcommand {
    /// Fill test descriptions into fixtures.
    Fill(FillArgs),
    /// Hash filled fixtures.
    Hash(HashArgs),
}

/// The fixture formats to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FixtureFormat {
    /// Replay fixtures only.
    Blockchain,
    /// Engine API fixtures only.
    Engine,
    /// Both formats.
    #[default]
    All,
}

impl FixtureFormat {
    /// Returns `true` if replay fixtures are generated.
    pub const fn blockchain(&self) -> bool {
        matches!(self, Self::Blockchain | Self::All)
    }

    /// Returns `true` if engine fixtures are generated.
    pub const fn engine(&self) -> bool {
        matches!(self, Self::Engine | Self::All)
    }
}

/// Configuration for the `fill` subcommand.
#[derive(Debug, Clone, Args)]
pub struct FillArgs {
    /// The test description file, or a directory searched for `*.json` files.
    #[clap(long, short = 'i', help = "Test description file or directory")]
    pub input: PathBuf,
    /// The fixture output directory.
    #[clap(long, short = 'o', help = "Fixture output directory")]
    pub output: PathBuf,
    /// The fork, or transition fork, to fill for.
    #[clap(long, short = 'f', env = "EFT_FORK", help = "Fork or transition fork to fill for")]
    pub fork: ForkSchedule,
    /// The transition tool binary.
    #[clap(long, env = "EFT_EVM_BIN", default_value = "evm", help = "Transition tool binary")]
    pub evm_bin: PathBuf,
    /// The fixture formats to generate.
    #[clap(long, value_enum, default_value_t = FixtureFormat::All)]
    pub format: FixtureFormat,
    /// The chain id of the transactions.
    #[clap(long, default_value_t = DEFAULT_CHAIN_ID)]
    pub chain_id: u64,
    /// EIPs enabled on top of the fork.
    #[clap(long = "eip", help = "Enable an EIP on top of the fork")]
    pub eips: Vec<u32>,
    /// The number of tests filled concurrently.
    #[clap(long, short = 'j', default_value_t = 8, help = "Number of tests filled concurrently")]
    pub jobs: usize,
    /// The directory transition tool calls are dumped into.
    #[clap(long, env = "EFT_DEBUG_DIR", help = "Dump transition tool calls into this directory")]
    pub debug_dir: Option<PathBuf>,
    /// Collect per-transaction execution traces.
    #[clap(long, help = "Collect execution traces")]
    pub trace: bool,
    /// Fill a single test.
    #[clap(long, short = 't', help = "Fill specific test by name")]
    pub test: Option<String>,
}

/// Configuration for the `hash` subcommand.
#[derive(Debug, Clone, Args)]
pub struct HashArgs {
    /// The fixture directory.
    #[clap(long, short = 'i', help = "Fixture file or directory")]
    pub input: PathBuf,
    /// The file the hashes are written to. Defaults to stdout.
    #[clap(long, short = 'o', help = "Output file, defaults to stdout")]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Installs the global log subscriber. `RUST_LOG` takes precedence over the verbosity flag.
    pub fn init_telemetry(self) -> Result<Self> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => verbosity_filter(self.v)?,
        };
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))?;
        Ok(self)
    }

    /// Parse the CLI arguments and run the command
    pub async fn run(&self) -> Result<()> {
        match &self.subcommand {
            EftSubcommand::Fill(args) => {
                let tool = GethTransitionTool::new(args.evm_bin.clone()).with_trace(args.trace);
                FillRunner::new(args.clone(), Arc::new(tool)).exec().await
            }
            EftSubcommand::Hash(args) => HashRunner::new(args.clone()).exec().await,
        }
    }
}

/// Returns the log filter of verbosity level `v`. The targets of the filler log at the chosen
/// level, other crates never below warnings.
pub fn verbosity_filter(v: u8) -> Result<EnvFilter> {
    let level = match v {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let mut filter = EnvFilter::default().add_directive(level.min(LevelFilter::WARN).into());
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}={level}").parse::<Directive>()?);
    }
    Ok(filter)
}
