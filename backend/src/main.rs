use std::{env, path::PathBuf};

use anyhow::Result;
use comment_pilot_backend::config::DEFAULT_CONFIG_PATH;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::var("COMMENT_PILOT_CONFIG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    comment_pilot_backend::run_daemon(&config_path).await
}
