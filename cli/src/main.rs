//! Operator CLI for the comment monitor.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use comment_pilot_backend::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    // `run` installs its own subscriber with the reply log file layer.
    if !matches!(cli.command, cli::Commands::Run { .. }) {
        logging::init_console_logging();
    }

    commands::run(cli).await
}
