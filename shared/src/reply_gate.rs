//! Dedupe set and daily reply budget.
//!
//! The gate owns a [`ReplyLedger`] that holds the process state (seen comment
//! ids, today's counter, reset date). [`MemoryReplyLedger`] is the only
//! backing shipped; running several instances against one account would need
//! a shared, transactional ledger instead.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::Comment;

/// Backing state for [`ReplyGate`].
pub trait ReplyLedger: Send {
    /// Insert `comment_id`; `false` when it was already present.
    fn mark_seen(&mut self, comment_id: &str) -> bool;

    fn is_seen(&self, comment_id: &str) -> bool;

    /// Move the counter to `today`, zeroing it when the date changed.
    /// Returns `true` only when a reset happened.
    fn roll_day(&mut self, today: NaiveDate) -> bool;

    fn replies_today(&self) -> u32;

    fn record_reply(&mut self);

    fn total_replies(&self) -> u64;
}

/// Process-lifetime ledger.
#[derive(Debug, Default)]
pub struct MemoryReplyLedger {
    seen: HashSet<String>,
    last_reset: Option<NaiveDate>,
    replies_today: u32,
    total_replies: u64,
}

impl ReplyLedger for MemoryReplyLedger {
    fn mark_seen(&mut self, comment_id: &str) -> bool {
        self.seen.insert(comment_id.to_string())
    }

    fn is_seen(&self, comment_id: &str) -> bool {
        self.seen.contains(comment_id)
    }

    fn roll_day(&mut self, today: NaiveDate) -> bool {
        match self.last_reset {
            Some(date) if date == today => false,
            Some(_) => {
                self.last_reset = Some(today);
                self.replies_today = 0;
                true
            },
            None => {
                self.last_reset = Some(today);
                false
            },
        }
    }

    fn replies_today(&self) -> u32 {
        self.replies_today
    }

    fn record_reply(&mut self) {
        self.replies_today = self.replies_today.saturating_add(1);
        self.total_replies += 1;
    }

    fn total_replies(&self) -> u64 {
        self.total_replies
    }
}

/// Outcome of [`ReplyGate::should_reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Nested replies are not answered under the current policy.
    SubComment,
    /// Today's budget is spent.
    BudgetExhausted { limit: u32 },
}

impl GateDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

pub struct ReplyGate<L = MemoryReplyLedger> {
    ledger: L,
    max_replies_per_day: u32,
    reply_to_sub_comments: bool,
}

impl ReplyGate<MemoryReplyLedger> {
    pub fn new(max_replies_per_day: u32) -> Self {
        Self::with_ledger(MemoryReplyLedger::default(), max_replies_per_day)
    }
}

impl<L: ReplyLedger> ReplyGate<L> {
    pub fn with_ledger(ledger: L, max_replies_per_day: u32) -> Self {
        Self {
            ledger,
            max_replies_per_day,
            reply_to_sub_comments: false,
        }
    }

    /// Policy switch for nested replies. Off by default.
    pub fn reply_to_sub_comments(mut self, enabled: bool) -> Self {
        self.reply_to_sub_comments = enabled;
        self
    }

    /// Mark `comment_id` processed. `false` means it was seen before and must
    /// be skipped without further evaluation.
    pub fn first_sighting(&mut self, comment_id: &str) -> bool {
        self.ledger.mark_seen(comment_id)
    }

    /// Decide whether `comment` may be answered on `today`. The budget is
    /// checked before any reply is sent, never after.
    pub fn should_reply(&mut self, comment: &Comment, today: NaiveDate) -> GateDecision {
        if comment.is_sub_comment && !self.reply_to_sub_comments {
            return GateDecision::SubComment;
        }

        self.roll_day(today);
        if self.ledger.replies_today() >= self.max_replies_per_day {
            tracing::warn!(
                "daily reply budget reached ({}/{}), skipping comment {}",
                self.ledger.replies_today(),
                self.max_replies_per_day,
                comment.comment_id
            );
            return GateDecision::BudgetExhausted {
                limit: self.max_replies_per_day,
            };
        }

        GateDecision::Allow
    }

    /// Count a reply that was actually posted.
    pub fn record_reply(&mut self, today: NaiveDate) {
        self.roll_day(today);
        self.ledger.record_reply();
    }

    pub fn replies_today(&self) -> u32 {
        self.ledger.replies_today()
    }

    pub fn total_replies(&self) -> u64 {
        self.ledger.total_replies()
    }

    pub fn max_replies_per_day(&self) -> u32 {
        self.max_replies_per_day
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if self.ledger.roll_day(today) {
            tracing::info!("new day {today}, daily reply counter reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{GateDecision, MemoryReplyLedger, ReplyGate, ReplyLedger};
    use crate::Comment;

    fn comment(id: &str, nested: bool) -> Comment {
        Comment {
            comment_id: id.to_string(),
            post_id: "note-1".to_string(),
            user_id: "u1".to_string(),
            user_name: "Ada".to_string(),
            content: "多少钱".to_string(),
            create_time: None,
            like_count: 0,
            is_sub_comment: nested,
            parent_comment_id: nested.then(|| "root".to_string()),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    #[test]
    fn second_sighting_is_rejected() {
        let mut gate = ReplyGate::new(10);
        assert!(gate.first_sighting("c1"));
        assert!(!gate.first_sighting("c1"));
        assert!(gate.first_sighting("c2"));
        assert!(gate.ledger().is_seen("c1"));
    }

    #[test]
    fn sub_comments_are_refused_by_default() {
        let mut gate = ReplyGate::new(10);
        assert_eq!(gate.should_reply(&comment("c1", true), day(1)), GateDecision::SubComment);
        assert!(gate.should_reply(&comment("c2", false), day(1)).is_allowed());

        let mut permissive = ReplyGate::new(10).reply_to_sub_comments(true);
        assert!(permissive
            .should_reply(&comment("c1", true), day(1))
            .is_allowed());
    }

    #[test]
    fn budget_allows_exactly_max_per_day() {
        let mut gate = ReplyGate::new(3);
        let mut allowed = 0;
        for index in 0..7 {
            let candidate = comment(&format!("c{index}"), false);
            if gate.should_reply(&candidate, day(1)).is_allowed() {
                gate.record_reply(day(1));
                allowed += 1;
            }
        }
        assert_eq!(allowed, 3);
        assert_eq!(
            gate.should_reply(&comment("late", false), day(1)),
            GateDecision::BudgetExhausted { limit: 3 }
        );
    }

    #[test]
    fn new_day_resets_counter_once() {
        let mut ledger = MemoryReplyLedger::default();
        assert!(!ledger.roll_day(day(1)));
        ledger.record_reply();
        ledger.record_reply();
        assert!(ledger.roll_day(day(2)));
        assert!(!ledger.roll_day(day(2)));
        assert_eq!(ledger.replies_today(), 0);
        assert_eq!(ledger.total_replies(), 2);

        let mut gate = ReplyGate::new(1);
        assert!(gate.should_reply(&comment("a", false), day(1)).is_allowed());
        gate.record_reply(day(1));
        assert!(!gate.should_reply(&comment("b", false), day(1)).is_allowed());
        assert!(gate.should_reply(&comment("b", false), day(2)).is_allowed());
        gate.record_reply(day(2));
        assert_eq!(gate.replies_today(), 1);
        assert_eq!(gate.total_replies(), 2);
    }

    #[test]
    fn zero_budget_never_allows() {
        let mut gate = ReplyGate::new(0);
        assert_eq!(
            gate.should_reply(&comment("c1", false), day(1)),
            GateDecision::BudgetExhausted { limit: 0 }
        );
        assert_eq!(gate.max_replies_per_day(), 0);
    }
}
