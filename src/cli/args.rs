//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    advance::AdvanceArgs,
    check::CheckArgs,
    gate::GateCommands,
    init::InitArgs,
    locks::{LocksArgs, RelockArgs, UnlockArgs},
    tasks::TasksArgs,
    validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "stagegate")]
#[command(author, version, about = "Production gate engine for project pipelines")]
#[command(long_about = "Evaluates the gates that guard each stage of a production pipeline, \
applies locks and creates follow-up tasks when a gate first passes, and records stage advancement.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root (default: auto-detect by finding .stagegate/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a workspace with the default gate set
    Init(InitArgs),

    /// Inspect configured gates
    #[command(subcommand)]
    Gate(GateCommands),

    /// Evaluate a project's stage gates and apply first-pass effects
    Check(CheckArgs),

    /// Advance a project to the next stage when its gates allow it
    Advance(AdvanceArgs),

    /// Show lock flags and the lock audit trail of a project
    Locks(LocksArgs),

    /// Release a lock under a change order
    Unlock(UnlockArgs),

    /// Re-apply a released lock
    Relock(RelockArgs),

    /// List tasks generated from gate templates
    Tasks(TasksArgs),

    /// Validate gate configuration and project files
    Validate(ValidateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables and summaries
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
}

impl OutputFormat {
    /// Resolve `auto` against the configured default format
    pub fn or_config(self, configured: Option<&str>) -> Self {
        if self != OutputFormat::Auto {
            return self;
        }
        match configured.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("yaml") => OutputFormat::Yaml,
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Auto,
        }
    }
}
