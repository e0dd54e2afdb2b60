use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::llm::LlmProvider;
use crate::report::OutputFormat;

/// Command line interface definition for git-efficiency.
#[derive(Parser, Debug)]
#[command(name = "git-efficiency")]
#[command(about = "Score contributor efficiency from git history and AI code review")]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "efficiency.toml")]
    pub config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate contributors over a time window
    Evaluate(EvaluateArgs),
    /// List configured repositories and their weights
    Repos,
    /// List configured contributors and their email addresses
    Employees,
    /// Validate configuration, repositories and AI credentials
    Check,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EvaluateArgs {
    /// Named period (weekly, monthly, quarterly, or one from the config)
    #[arg(short, long, conflicts_with = "days")]
    pub period: Option<String>,

    /// Window length in days, ending now
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// AI backend (overrides config and GIT_EFFICIENCY_AI_BACKEND)
    #[arg(long)]
    pub backend: Option<LlmProvider>,

    /// Model name (overrides config and GIT_EFFICIENCY_AI_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Score without AI verdicts
    #[arg(long, conflicts_with_all = ["backend", "model"])]
    pub no_ai: bool,

    /// Stop issuing AI requests after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Verdict cache directory (overrides config)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// JSON file with review participation and merge conflict signals per contributor
    #[arg(long, value_name = "FILE")]
    pub signals: Option<PathBuf>,
}
