use std::{
    collections::BTreeMap,
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use comment_pilot_shared::{
    classifier::{Category, KeywordTable},
    reply_strategy::TemplateCatalog,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";
const DEFAULT_API_BASE: &str = "https://edith.xiaohongshu.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 \
                                  Safari/537.36";

/// Startup problems that keep the poll loop from starting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no tracked note ids configured (xiaohongshu.note_ids or COMMENT_PILOT_NOTE_IDS)")]
    NoTrackedPosts,
    #[error("missing feed credentials (xiaohongshu.cookies or COMMENT_PILOT_COOKIES)")]
    MissingCredentials,
    #[error("poll interval must be at least one second")]
    ZeroPollInterval,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub xiaohongshu: FeedConfig,
    pub reply: ReplyConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub note_ids: Vec<String>,
    pub cookies: String,
    pub user_agent: String,
    #[serde(rename = "monitor_interval")]
    pub poll_interval_seconds: u64,
    pub api_base: String,
    pub timeout_seconds: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            note_ids: Vec::new(),
            cookies: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            poll_interval_seconds: 300,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    #[serde(rename = "auto_reply")]
    pub auto_reply_enabled: bool,
    /// One process-wide budget; `max_reply_per_note` is accepted for old
    /// config files.
    #[serde(alias = "max_reply_per_note")]
    pub max_replies_per_day: u32,
    #[serde(rename = "reply_delay")]
    pub reply_delay_seconds: u64,
    pub reply_to_sub_comments: bool,
    pub templates_file: Option<PathBuf>,
    /// Per-category keyword lists replacing the built-in ones, e.g.
    /// `{"price": ["报价", "多少钱"]}`.
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            auto_reply_enabled: true,
            max_replies_per_day: 20,
            reply_delay_seconds: 5,
            reply_to_sub_comments: false,
            templates_file: None,
            keywords: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub customer_db: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            customer_db: PathBuf::from("./data/customers.json"),
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl MonitorConfig {
    /// Read `path` and apply `COMMENT_PILOT_*` environment overrides. A missing
    /// file yields defaults so read-only commands still work; callers decide
    /// whether to warn about it.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str::<Self>(&raw)
                .with_context(|| format!("invalid config JSON: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Overlay values produced by `lookup`, keyed by environment variable
    /// name. Blank or unparsable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = lookup("COMMENT_PILOT_NOTE_IDS") {
            self.xiaohongshu.note_ids = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup("COMMENT_PILOT_COOKIES") {
            self.xiaohongshu.cookies = value;
        }
        if let Some(value) = lookup("COMMENT_PILOT_USER_AGENT") {
            self.xiaohongshu.user_agent = value;
        }
        if let Some(value) = lookup("COMMENT_PILOT_API_BASE") {
            self.xiaohongshu.api_base = value.trim_end_matches('/').to_string();
        }
        if let Some(value) =
            lookup("COMMENT_PILOT_POLL_INTERVAL_SECONDS").and_then(|v| v.parse::<u64>().ok())
        {
            self.xiaohongshu.poll_interval_seconds = value;
        }
        if let Some(value) =
            lookup("COMMENT_PILOT_REPLY_DELAY_SECONDS").and_then(|v| v.parse::<u64>().ok())
        {
            self.reply.reply_delay_seconds = value;
        }
        if let Some(value) =
            lookup("COMMENT_PILOT_MAX_REPLIES_PER_DAY").and_then(|v| v.parse::<u32>().ok())
        {
            self.reply.max_replies_per_day = value;
        }
        if let Some(value) = lookup("COMMENT_PILOT_AUTO_REPLY") {
            self.reply.auto_reply_enabled = parse_bool_env(&value);
        }
        if let Some(value) = lookup("COMMENT_PILOT_CUSTOMER_DB") {
            self.storage.customer_db = PathBuf::from(value);
        }
        if let Some(value) = lookup("COMMENT_PILOT_LOG_DIR") {
            self.storage.log_dir = PathBuf::from(value);
        }
    }

    /// Checks required before entering the poll loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .xiaohongshu
            .note_ids
            .iter()
            .all(|id| id.trim().is_empty())
        {
            return Err(ConfigError::NoTrackedPosts);
        }
        if self.xiaohongshu.cookies.trim().is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        if self.xiaohongshu.poll_interval_seconds == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Template catalog from `reply.templates_file`, or the built-in one.
    pub fn load_templates(&self) -> Result<TemplateCatalog> {
        match &self.reply.templates_file {
            Some(path) => TemplateCatalog::load(path),
            None => Ok(TemplateCatalog::builtin()),
        }
    }

    /// Built-in keyword table with `reply.keywords` overrides applied.
    pub fn keyword_table(&self) -> Result<KeywordTable> {
        let mut table = KeywordTable::builtin();
        for (name, keywords) in &self.reply.keywords {
            let category = name
                .parse::<Category>()
                .with_context(|| format!("invalid reply.keywords entry `{name}`"))?;
            if category == Category::Default {
                anyhow::bail!("reply.keywords cannot set keywords for `default`");
            }
            table.set_keywords(category, keywords);
        }
        Ok(table)
    }
}

/// Log a warning when `path` does not exist, since [`MonitorConfig::load`]
/// then silently falls back to defaults. Returns whether it was missing.
pub fn warn_if_missing(path: &Path) -> bool {
    let missing = !path.exists();
    if missing {
        tracing::warn!(
            "config file {} not found; using defaults and COMMENT_PILOT_* overrides",
            path.display()
        );
    }
    missing
}

fn parse_bool_env(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}
