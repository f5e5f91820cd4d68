//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    analyze::AnalyzeArgs, check::CheckArgs, completions::CompletionsArgs, mc::McArgs,
};
use crate::core::param::EvalMode;

#[derive(Parser)]
#[command(name = "pbt")]
#[command(author, version, about = "Power Budget Toolkit")]
#[command(
    long_about = "A toolkit for steady-state power-budget analysis of DC distribution trees described as plain-text netlists, with Monte Carlo parameter sampling."
)]
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

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate the power budget of every source in a netlist
    Analyze(AnalyzeArgs),

    /// Monte Carlo analysis over the netlist's sampled parameters
    Mc(McArgs),

    /// Check budgets against source ratings (exits non-zero on overload)
    Check(CheckArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (human-readable summary)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
}

/// Evaluation mode selector shared by the analysis commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeArg {
    /// Every parameter at its nominal value
    #[default]
    Nominal,
    /// One sampled value per parameter per pass
    #[value(alias = "mc")]
    MonteCarlo,
}

impl From<ModeArg> for EvalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Nominal => EvalMode::Nominal,
            ModeArg::MonteCarlo => EvalMode::MonteCarlo,
        }
    }
}
