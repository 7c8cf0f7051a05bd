//! MADE CLI - run multi-agent phase chains from the command line

use anyhow::Result;
use clap::Parser as _;
use made_cli::handlers;
use made_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    handlers::init_logging();

    match cli.command {
        Commands::Run(args) => handlers::handle_run(args).await?,
        Commands::Phases => handlers::handle_phases()?,
        Commands::InitConfig { path, force } => handlers::handle_init_config(path, force)?,
    }

    Ok(())
}
