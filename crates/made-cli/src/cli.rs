use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the MADE runner
#[derive(Debug, Parser)]
#[command(name = "made")]
#[command(about = "Multi-agent software development through chained role-play phases", long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a phase chain for a task
    Run(RunArgs),

    /// List registered phases
    Phases,

    /// Write a default configuration file
    InitConfig {
        /// Destination (defaults to ~/.made/config.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Options for a single run
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Configuration file (defaults to ~/.made/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// What to build (overrides config)
    #[arg(short, long)]
    pub task: Option<String>,

    /// Longer task description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Require a graphical interface
    #[arg(long)]
    pub gui: bool,

    /// Comma-separated phase chain (overrides config)
    #[arg(short, long, value_delimiter = ',')]
    pub phases: Vec<String>,

    /// Directory for generated projects
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Write per-phase transcripts as JSON
    #[arg(long)]
    pub transcripts: bool,

    /// Project name used for the output directory
    #[arg(short, long)]
    pub name: Option<String>,

    /// Use a scripted offline provider instead of the configured model
    #[arg(long)]
    pub dry_run: bool,
}
