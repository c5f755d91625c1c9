pub mod customers;
pub mod note;
pub mod run;
pub mod stats;

use std::path::Path;

use anyhow::Result;
use comment_pilot_backend::config::{self, MonitorConfig};
use comment_pilot_shared::customer_store::CustomerStore;

use crate::cli::{Cli, Commands};

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config } => run::run(&config).await,
        Commands::Stats { config } => stats::run(&config),
        Commands::Customers { filter, config } => customers::run(&config, filter),
        Commands::Note {
            user_id,
            text,
            config,
        } => note::run(&config, &user_id, &text),
    }
}

/// Customer store named by the config at `config_path`. Read-only commands do
/// not need feed credentials, so the config is not validated here.
fn open_store(config_path: &Path) -> Result<CustomerStore> {
    config::warn_if_missing(config_path);
    let config = MonitorConfig::load(config_path)?;
    CustomerStore::open(config.storage.customer_db)
}
