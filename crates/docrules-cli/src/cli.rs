use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "docrules")]
#[command(about = "Check, evaluate and test document write policies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.docrules/config.toml)
    #[arg(short, long, global = true, env = "DOCRULES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, env = "DOCRULES_FORMAT")]
    pub format: Option<OutputFormat>,

    /// Log level filter (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "DOCRULES_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a policy definition and list its rules
    Check(CheckArgs),
    /// Evaluate a single write request
    Eval(EvalArgs),
    /// Run a scenario suite against a policy
    Test(TestArgs),
    /// Re-run a scenario suite whenever the policy file changes
    Watch(WatchArgs),
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Policy definition (.json or .toml)
    pub policy: PathBuf,
}

#[derive(clap::Args)]
pub struct EvalArgs {
    /// Policy definition (.json or .toml)
    #[arg(long)]
    pub policy: PathBuf,
    /// Write request as JSON
    #[arg(long)]
    pub request: PathBuf,
    /// Auth context as JSON (unauthenticated if omitted)
    #[arg(long)]
    pub auth: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct TestArgs {
    /// Policy definition (.json or .toml)
    #[arg(long)]
    pub policy: PathBuf,
    /// Scenario suite (.json or .toml)
    pub suite: PathBuf,
}

#[derive(clap::Args)]
pub struct WatchArgs {
    /// Policy definition (.json or .toml)
    #[arg(long)]
    pub policy: PathBuf,
    /// Scenario suite (.json or .toml)
    pub suite: PathBuf,
    /// Quiet period before a reload, in milliseconds
    #[arg(long, env = "DOCRULES_DEBOUNCE_MS")]
    pub debounce_ms: Option<u64>,
}
