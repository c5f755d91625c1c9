//! Comment monitor daemon: polls tracked Xiaohongshu notes, classifies new
//! comments, answers within a daily budget and records every answered
//! commenter in the customer store.

pub mod config;
pub mod feed;
pub mod logging;
pub mod monitor;

use std::path::Path;

use anyhow::{Context, Result};
use comment_pilot_shared::{
    classifier::CommentClassifier, customer_store::CustomerStore, reply_gate::ReplyGate,
    reply_strategy::ReplyStrategy,
};

use crate::{
    config::MonitorConfig,
    feed::XhsFeedClient,
    monitor::{spawn_ctrl_c_listener, CommentMonitor, MonitorSettings},
};

/// Load configuration from `config_path`, then poll until Ctrl-C.
pub async fn run_daemon(config_path: &Path) -> Result<()> {
    let config = MonitorConfig::load(config_path)?;
    let _log_guard = logging::init_daemon_logging(&config.storage.log_dir)?;

    crate::config::warn_if_missing(config_path);
    config.validate().context("invalid monitor configuration")?;

    let catalog = config.load_templates()?;
    let classifier = CommentClassifier::new(config.keyword_table()?);
    let store = CustomerStore::open(&config.storage.customer_db)?;
    tracing::info!(
        "customer store {} holds {} customers",
        config.storage.customer_db.display(),
        store.all().len()
    );

    let feed = XhsFeedClient::from_config(&config.xiaohongshu)?;
    let gate = ReplyGate::new(config.reply.max_replies_per_day)
        .reply_to_sub_comments(config.reply.reply_to_sub_comments);
    let mut monitor = CommentMonitor::new(
        feed,
        MonitorSettings::from_config(&config),
        ReplyStrategy::with_classifier(classifier, catalog),
        store,
        gate,
    );

    monitor.run(spawn_ctrl_c_listener()).await
}
