use std::path::Path;

use anyhow::Result;

pub async fn run(config_path: &Path) -> Result<()> {
    comment_pilot_backend::run_daemon(config_path).await
}
