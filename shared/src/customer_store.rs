//! Durable per-user relationship records.
//!
//! Records live in one JSON document keyed by `user_id`. Every write reloads
//! the document under an exclusive lock file, applies the change and renames a
//! temp file over the target, so the daemon and one-off CLI commands can share
//! the file.

use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use fs2::FileExt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Most recent interactions kept per customer.
pub const HISTORY_CAPACITY: usize = 50;

/// Lifecycle tier. Variant order is the promotion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    /// No recorded interaction yet.
    New,
    /// At least one interaction.
    Contacted,
    /// Three or more interactions.
    Active,
    /// Five or more interactions.
    Vip,
}

impl CustomerStatus {
    /// Step function of the interaction count. Monotone, so a record whose
    /// count only grows can never be demoted.
    pub fn from_interaction_count(count: u32) -> Self {
        match count {
            5.. => CustomerStatus::Vip,
            3..=4 => CustomerStatus::Active,
            1..=2 => CustomerStatus::Contacted,
            0 => CustomerStatus::New,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CustomerStatus::New => "new",
            CustomerStatus::Contacted => "contacted",
            CustomerStatus::Active => "active",
            CustomerStatus::Vip => "vip",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "new" => Ok(CustomerStatus::New),
            "contacted" => Ok(CustomerStatus::Contacted),
            "active" => Ok(CustomerStatus::Active),
            "vip" => Ok(CustomerStatus::Vip),
            other => anyhow::bail!("unknown customer status `{other}`"),
        }
    }
}

/// One answered comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub post_id: String,
    pub comment_text: String,
    pub reply_text: String,
}

/// Operator-written note attached to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualNote {
    pub created_at: DateTime<Utc>,
    pub note: String,
}

/// Ring of the most recent [`HISTORY_CAPACITY`] interactions, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionHistory {
    entries: VecDeque<Interaction>,
}

impl InteractionHistory {
    /// Append, evicting the oldest entry once the ring is full.
    pub fn push(&mut self, interaction: Interaction) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(interaction);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Interaction> {
        self.entries.back()
    }
}

impl FromIterator<Interaction> for InteractionHistory {
    fn from_iter<I: IntoIterator<Item = Interaction>>(iter: I) -> Self {
        let mut history = Self::default();
        for interaction in iter {
            history.push(interaction);
        }
        history
    }
}

impl Serialize for InteractionHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

impl<'de> Deserialize<'de> for InteractionHistory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<Interaction>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

/// Relationship record for one user.
///
/// `interaction_count` and `status` only change together through
/// [`CustomerStore::record_interaction`], so the status always matches the
/// count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub user_id: String,
    pub user_name: String,
    pub first_contact_at: DateTime<Utc>,
    pub last_contact_at: DateTime<Utc>,
    interaction_count: u32,
    status: CustomerStatus,
    #[serde(default)]
    interaction_history: InteractionHistory,
    #[serde(default)]
    manual_notes: Vec<ManualNote>,
}

impl CustomerRecord {
    fn new(user_id: &str, user_name: &str, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            first_contact_at: at,
            last_contact_at: at,
            interaction_count: 0,
            status: CustomerStatus::New,
            interaction_history: InteractionHistory::default(),
            manual_notes: Vec::new(),
        }
    }

    fn register(&mut self, user_name: &str, interaction: Interaction) {
        if !user_name.trim().is_empty() {
            self.user_name = user_name.to_string();
        }
        self.last_contact_at = interaction.timestamp;
        self.interaction_count = self.interaction_count.saturating_add(1);
        self.status = CustomerStatus::from_interaction_count(self.interaction_count);
        self.interaction_history.push(interaction);
    }

    pub fn interaction_count(&self) -> u32 {
        self.interaction_count
    }

    pub fn status(&self) -> CustomerStatus {
        self.status
    }

    pub fn interaction_history(&self) -> &InteractionHistory {
        &self.interaction_history
    }

    pub fn manual_notes(&self) -> &[ManualNote] {
        &self.manual_notes
    }
}

/// Headcount per lifecycle tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub total: usize,
    pub vip: usize,
    pub active: usize,
    pub new: usize,
    /// Derived as `total - vip - active - new`.
    pub contacted: usize,
}

/// Reply counters derived from the stored interactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplyStats {
    /// Every reply ever recorded.
    pub total_replies: u64,
    /// Retained interactions whose local date is the requested day.
    pub today_replies: u64,
}

pub struct CustomerStore {
    path: Option<PathBuf>,
    customers: BTreeMap<String, CustomerRecord>,
}

impl CustomerStore {
    /// Open the store at `path`. A missing file is an empty store; a file that
    /// does not parse is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let customers = load_customers(&path)?;
        tracing::debug!("loaded {} customer records from {}", customers.len(), path.display());
        Ok(Self {
            path: Some(path),
            customers,
        })
    }

    /// Store without a backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            customers: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record_interaction(
        &mut self,
        user_id: &str,
        user_name: &str,
        post_id: &str,
        comment_text: &str,
        reply_text: &str,
    ) -> Result<CustomerRecord> {
        self.record_interaction_at(user_id, user_name, post_id, comment_text, reply_text, Utc::now())
    }

    /// Record one posted reply at `at`. Creates the record on first contact.
    pub fn record_interaction_at(
        &mut self,
        user_id: &str,
        user_name: &str,
        post_id: &str,
        comment_text: &str,
        reply_text: &str,
        at: DateTime<Utc>,
    ) -> Result<CustomerRecord> {
        let interaction = Interaction {
            timestamp: at,
            post_id: post_id.to_string(),
            comment_text: comment_text.to_string(),
            reply_text: reply_text.to_string(),
        };
        self.update(|customers| {
            let record = customers
                .entry(user_id.to_string())
                .or_insert_with(|| CustomerRecord::new(user_id, user_name, at));
            record.register(user_name, interaction);
            record.clone()
        })
    }

    pub fn user_history(&self, user_id: &str) -> Option<&CustomerRecord> {
        self.customers.get(user_id)
    }

    pub fn by_status(&self, status: CustomerStatus) -> BTreeMap<&str, &CustomerRecord> {
        self.customers
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(user_id, record)| (user_id.as_str(), record))
            .collect()
    }

    pub fn vip(&self) -> BTreeMap<&str, &CustomerRecord> {
        self.by_status(CustomerStatus::Vip)
    }

    pub fn active(&self) -> BTreeMap<&str, &CustomerRecord> {
        self.by_status(CustomerStatus::Active)
    }

    pub fn new_customers(&self) -> BTreeMap<&str, &CustomerRecord> {
        self.by_status(CustomerStatus::New)
    }

    pub fn all(&self) -> &BTreeMap<String, CustomerRecord> {
        &self.customers
    }

    /// Append an operator note. Returns `false` without writing when the user
    /// has no record yet.
    pub fn add_manual_note(&mut self, user_id: &str, note: &str) -> Result<bool> {
        let note = ManualNote {
            created_at: Utc::now(),
            note: note.to_string(),
        };
        self.update(|customers| match customers.get_mut(user_id) {
            Some(record) => {
                record.manual_notes.push(note);
                true
            },
            None => false,
        })
    }

    pub fn export_summary(&self) -> CustomerSummary {
        let total = self.customers.len();
        let vip = self.vip().len();
        let active = self.active().len();
        let new = self.new_customers().len();
        CustomerSummary {
            total,
            vip,
            active,
            new,
            contacted: total - vip - active - new,
        }
    }

    pub fn reply_stats(&self, today: NaiveDate) -> ReplyStats {
        let mut stats = ReplyStats::default();
        for record in self.customers.values() {
            stats.total_replies += u64::from(record.interaction_count);
            stats.today_replies += record
                .interaction_history
                .iter()
                .filter(|item| item.timestamp.with_timezone(&Local).date_naive() == today)
                .count() as u64;
        }
        stats
    }

    fn update<T>(
        &mut self,
        apply: impl FnOnce(&mut BTreeMap<String, CustomerRecord>) -> T,
    ) -> Result<T> {
        let Some(path) = self.path.clone() else {
            return Ok(apply(&mut self.customers));
        };

        let _lock = acquire_lock(&path)?;
        let mut customers = load_customers(&path)?;
        let output = apply(&mut customers);
        write_customers(&path, &customers)?;
        self.customers = customers;
        Ok(output)
    }
}

fn load_customers(path: &Path) -> Result<BTreeMap<String, CustomerRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read customer db {}", path.display()))
        },
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }

    let mut customers: BTreeMap<String, CustomerRecord> = serde_json::from_slice(&bytes)
        .with_context(|| format!("customer db is not valid JSON: {}", path.display()))?;
    for record in customers.values_mut() {
        record.status = CustomerStatus::from_interaction_count(record.interaction_count);
    }
    Ok(customers)
}

fn write_customers(path: &Path, customers: &BTreeMap<String, CustomerRecord>) -> Result<()> {
    let data = serde_json::to_vec_pretty(customers).context("failed to encode customer db")?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace customer db {}", path.display()))
}

fn acquire_lock(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create customer db dir {}", parent.display()))?;
    }
    let lock_path = path.with_extension("lock");
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("failed to lock {}", lock_path.display()))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, TimeZone, Utc};

    use super::{CustomerStatus, CustomerStore, CustomerSummary, HISTORY_CAPACITY};

    #[test]
    fn status_thresholds() {
        assert_eq!(CustomerStatus::from_interaction_count(0), CustomerStatus::New);
        assert_eq!(CustomerStatus::from_interaction_count(1), CustomerStatus::Contacted);
        assert_eq!(CustomerStatus::from_interaction_count(2), CustomerStatus::Contacted);
        assert_eq!(CustomerStatus::from_interaction_count(3), CustomerStatus::Active);
        assert_eq!(CustomerStatus::from_interaction_count(4), CustomerStatus::Active);
        assert_eq!(CustomerStatus::from_interaction_count(5), CustomerStatus::Vip);
        assert_eq!(CustomerStatus::from_interaction_count(500), CustomerStatus::Vip);
    }

    #[test]
    fn status_never_moves_backward() {
        let mut store = CustomerStore::in_memory();
        let mut previous = CustomerStatus::New;
        for index in 0..12 {
            let record = store
                .record_interaction("u1", "Ada", "note-1", &format!("comment {index}"), "thanks")
                .unwrap();
            assert!(record.status() >= previous);
            assert_eq!(record.interaction_count(), index + 1);
            previous = record.status();
        }
        assert_eq!(previous, CustomerStatus::Vip);
    }

    #[test]
    fn first_interaction_creates_contacted_record() {
        let mut store = CustomerStore::in_memory();
        assert!(store.user_history("u1").is_none());

        let record = store
            .record_interaction("u1", "Ada", "note-1", "多少钱", "私信")
            .unwrap();
        assert_eq!(record.status(), CustomerStatus::Contacted);
        assert_eq!(record.interaction_count(), 1);
        assert_eq!(record.first_contact_at, record.last_contact_at);
        assert_eq!(record.interaction_history().len(), 1);
        assert_eq!(store.user_history("u1"), Some(&record));
    }

    #[test]
    fn history_is_a_bounded_fifo_ring() {
        let mut store = CustomerStore::in_memory();
        let total = HISTORY_CAPACITY + 7;
        for index in 0..total {
            store
                .record_interaction("u1", "Ada", "note-1", &format!("c{index}"), "r")
                .unwrap();
        }

        let record = store.user_history("u1").unwrap();
        let history = record.interaction_history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(record.interaction_count() as usize, total);
        assert_eq!(history.iter().next().unwrap().comment_text, "c7");
        assert_eq!(history.latest().unwrap().comment_text, format!("c{}", total - 1));
    }

    #[test]
    fn manual_note_requires_existing_record() {
        let mut store = CustomerStore::in_memory();
        assert!(!store.add_manual_note("ghost", "call back").unwrap());
        assert!(store.user_history("ghost").is_none());

        store
            .record_interaction("u1", "Ada", "note-1", "hi", "hello")
            .unwrap();
        assert!(store.add_manual_note("u1", "call back").unwrap());
        assert!(store.add_manual_note("u1", "sent sample").unwrap());
        let notes = store.user_history("u1").unwrap().manual_notes();
        assert_eq!(
            notes.iter().map(|item| item.note.as_str()).collect::<Vec<_>>(),
            vec!["call back", "sent sample"]
        );
    }

    #[test]
    fn summary_derives_contacted() {
        let mut store = CustomerStore::in_memory();
        for (user, count) in [("a", 1), ("b", 2), ("c", 3), ("d", 5), ("e", 6)] {
            for _ in 0..count {
                store.record_interaction(user, user, "n", "c", "r").unwrap();
            }
        }

        assert_eq!(store.export_summary(), CustomerSummary {
            total: 5,
            vip: 2,
            active: 1,
            new: 0,
            contacted: 2,
        });
        assert_eq!(store.vip().keys().copied().collect::<Vec<_>>(), vec!["d", "e"]);
        assert_eq!(store.active().keys().copied().collect::<Vec<_>>(), vec!["c"]);
        assert!(store.new_customers().is_empty());
        assert_eq!(store.by_status(CustomerStatus::Contacted).len(), 2);
    }

    #[test]
    fn reply_stats_split_today_from_total() {
        let mut store = CustomerStore::in_memory();
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        store
            .record_interaction_at("u1", "Ada", "n", "c", "r", yesterday)
            .unwrap();
        store
            .record_interaction_at("u1", "Ada", "n", "c", "r", now)
            .unwrap();
        store
            .record_interaction_at("u2", "Bob", "n", "c", "r", now)
            .unwrap();

        let stats = store.reply_stats(now.with_timezone(&Local).date_naive());
        assert_eq!(stats.total_replies, 3);
        assert_eq!(stats.today_replies, 2);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("customers.json");
        let at = Utc.with_ymd_and_hms(2026, 5, 4, 10, 30, 0).unwrap();

        let mut store = CustomerStore::open(&path).unwrap();
        for _ in 0..3 {
            store
                .record_interaction_at("u1", "Ada", "note-1", "好用吗", "好用", at)
                .unwrap();
        }
        assert!(store.add_manual_note("u1", "prefers evenings").unwrap());

        let reopened = CustomerStore::open(&path).unwrap();
        let record = reopened.user_history("u1").unwrap();
        assert_eq!(record.status(), CustomerStatus::Active);
        assert_eq!(record.interaction_count(), 3);
        assert_eq!(record.first_contact_at, at);
        assert_eq!(record.manual_notes().len(), 1);
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[test]
    fn writes_merge_changes_made_by_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.json");

        let mut daemon = CustomerStore::open(&path).unwrap();
        daemon.record_interaction("u1", "Ada", "n", "c", "r").unwrap();

        let mut operator = CustomerStore::open(&path).unwrap();
        assert!(operator.add_manual_note("u1", "vip candidate").unwrap());

        daemon.record_interaction("u2", "Bob", "n", "c", "r").unwrap();
        let record = daemon.user_history("u1").unwrap();
        assert_eq!(record.manual_notes().len(), 1);
        assert_eq!(daemon.all().len(), 2);
    }

    #[test]
    fn failed_write_leaves_memory_matching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.json");
        let mut store = CustomerStore::open(&path).unwrap();
        store.record_interaction("u1", "Ada", "n", "c", "r").unwrap();

        // A directory where the temp file goes makes the next write fail.
        std::fs::create_dir(path.with_extension("tmp")).unwrap();
        assert!(store.record_interaction("u1", "Ada", "n", "c2", "r2").is_err());
        assert!(store.record_interaction("u2", "Bob", "n", "c", "r").is_err());

        assert_eq!(store.user_history("u1").unwrap().interaction_count(), 1);
        assert!(store.user_history("u2").is_none());
        let reopened = CustomerStore::open(&path).unwrap();
        assert_eq!(reopened.user_history("u1").unwrap().interaction_count(), 1);
        assert!(reopened.user_history("u2").is_none());
    }

    #[test]
    fn malformed_db_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(CustomerStore::open(&path).is_err());
    }
}
