use std::{future::Future, io, time::Duration};

use anyhow::Result;
use chrono::Local;
use comment_pilot_shared::{
    classifier::Category,
    customer_store::CustomerStore,
    reply_gate::{GateDecision, MemoryReplyLedger, ReplyGate, ReplyLedger},
    reply_strategy::ReplyStrategy,
    text_preview, Comment,
};
use tokio::sync::watch;

use crate::{config::MonitorConfig, feed::CommentFeed, logging::REPLY_LOG_TARGET};

const LOG_PREVIEW_CHARS: usize = 30;

/// Loop parameters taken from [`MonitorConfig`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub tracked_post_ids: Vec<String>,
    pub poll_interval: Duration,
    pub reply_delay: Duration,
    pub auto_reply_enabled: bool,
}

impl MonitorSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            tracked_post_ids: config
                .xiaohongshu
                .note_ids
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            poll_interval: Duration::from_secs(config.xiaohongshu.poll_interval_seconds),
            reply_delay: Duration::from_secs(config.reply.reply_delay_seconds),
            auto_reply_enabled: config.reply.auto_reply_enabled,
        }
    }
}

/// Counters for one pass over the tracked posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub new_comments: usize,
    pub duplicates: usize,
    pub gated: usize,
    pub monitor_only: usize,
    pub replied: usize,
    pub failed: usize,
    pub fetch_failures: usize,
}

/// Single worker that polls, decides and replies, one comment at a time.
///
/// Comments are marked processed on first sight, before any reply attempt.
/// A reply that then fails is dropped for good: the comment is never
/// re-evaluated in this process.
pub struct CommentMonitor<F, L = MemoryReplyLedger> {
    feed: F,
    settings: MonitorSettings,
    strategy: ReplyStrategy,
    store: CustomerStore,
    gate: ReplyGate<L>,
}

impl<F: CommentFeed, L: ReplyLedger> CommentMonitor<F, L> {
    pub fn new(
        feed: F,
        settings: MonitorSettings,
        strategy: ReplyStrategy,
        store: CustomerStore,
        gate: ReplyGate<L>,
    ) -> Self {
        Self {
            feed,
            settings,
            strategy,
            store,
            gate,
        }
    }

    pub fn store(&self) -> &CustomerStore {
        &self.store
    }

    pub fn gate(&self) -> &ReplyGate<L> {
        &self.gate
    }

    /// Poll until `shutdown` flips to `true` (or its sender goes away). The
    /// signal is honoured between posts and while idling, never mid-post.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            "monitoring {} notes every {}s (auto reply: {}, daily budget: {}, reply delay: {}s)",
            self.settings.tracked_post_ids.len(),
            self.settings.poll_interval.as_secs(),
            if self.settings.auto_reply_enabled { "on" } else { "monitor only" },
            self.gate.max_replies_per_day(),
            self.settings.reply_delay.as_secs()
        );

        loop {
            let report = self.poll_once(&shutdown).await;
            if report.new_comments > 0 || report.fetch_failures > 0 {
                tracing::info!(
                    "poll finished: new={} replied={} failed={} gated={} monitor_only={} \
                     fetch_failures={}",
                    report.new_comments,
                    report.replied,
                    report.failed,
                    report.gated,
                    report.monitor_only,
                    report.fetch_failures
                );
            }

            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {},
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },
            }
        }

        tracing::info!(
            "monitor stopped after {} replies ({} today)",
            self.gate.total_replies(),
            self.gate.replies_today()
        );
        Ok(())
    }

    /// One pass over every tracked post. Stops early, between posts, once
    /// `shutdown` is set.
    pub async fn poll_once(&mut self, shutdown: &watch::Receiver<bool>) -> PollReport {
        let mut report = PollReport::default();
        let post_ids = self.settings.tracked_post_ids.clone();
        for post_id in &post_ids {
            self.process_post(post_id, &mut report).await;
            if *shutdown.borrow() {
                tracing::info!("shutdown requested, stopping after note {post_id}");
                break;
            }
        }
        report
    }

    async fn process_post(&mut self, post_id: &str, report: &mut PollReport) {
        let comments = match self.feed.fetch_comments(post_id).await {
            Ok(comments) => comments,
            Err(err) => {
                tracing::warn!("failed to fetch comments for note {post_id}: {err:#}");
                report.fetch_failures += 1;
                return;
            },
        };

        let mut fresh = 0usize;
        for comment in comments {
            if !self.gate.first_sighting(&comment.comment_id) {
                report.duplicates += 1;
                continue;
            }
            fresh += 1;
            report.new_comments += 1;
            self.handle_comment(post_id, &comment, report).await;
        }
        if fresh > 0 {
            tracing::info!("note {post_id}: {fresh} new comments");
        }
    }

    async fn handle_comment(&mut self, post_id: &str, comment: &Comment, report: &mut PollReport) {
        if !self.settings.auto_reply_enabled {
            let category = self.strategy.classifier().classify(&comment.content);
            tracing::info!(
                "[monitor only] note {post_id} comment {} by {} ({category}): {}",
                comment.comment_id,
                comment.user_name,
                text_preview(&comment.content, LOG_PREVIEW_CHARS)
            );
            report.monitor_only += 1;
            return;
        }

        let today = Local::now().date_naive();
        match self.gate.should_reply(comment, today) {
            GateDecision::Allow => {},
            decision => {
                tracing::debug!("comment {} not answered: {decision:?}", comment.comment_id);
                report.gated += 1;
                return;
            },
        }

        let category = self.strategy.classifier().classify(&comment.content);
        let reply = self.strategy.reply_for_category(
            &comment.content,
            category,
            self.store.user_history(&comment.user_id),
        );

        tokio::time::sleep(self.settings.reply_delay).await;

        match self
            .feed
            .post_reply(post_id, &comment.comment_id, &reply)
            .await
        {
            Ok(true) => self.finish_reply(post_id, comment, category, &reply, report),
            Ok(false) => {
                tracing::warn!(
                    "reply to comment {} on note {post_id} was refused; dropped without retry",
                    comment.comment_id
                );
                report.failed += 1;
            },
            Err(err) => {
                tracing::warn!(
                    "reply to comment {} on note {post_id} failed: {err:#}; dropped without retry",
                    comment.comment_id
                );
                report.failed += 1;
            },
        }
    }

    fn finish_reply(
        &mut self,
        post_id: &str,
        comment: &Comment,
        category: Category,
        reply: &str,
        report: &mut PollReport,
    ) {
        match self.store.record_interaction(
            &comment.user_id,
            &comment.user_name,
            post_id,
            &comment.content,
            reply,
        ) {
            Ok(record) => tracing::debug!(
                "customer {} now {} after {} interactions",
                record.user_id,
                record.status(),
                record.interaction_count()
            ),
            Err(err) => tracing::error!(
                "reply posted but customer record for {} was not saved: {err:#}",
                comment.user_id
            ),
        }

        self.gate.record_reply(Local::now().date_naive());
        report.replied += 1;

        tracing::info!(
            target: REPLY_LOG_TARGET,
            "note:{post_id} | user:{} | {category} | comment:{} | reply:{}",
            comment.user_name,
            text_preview(&comment.content, LOG_PREVIEW_CHARS),
            text_preview(reply, LOG_PREVIEW_CHARS)
        );
        tracing::info!(
            "replies total: {} | today: {}/{}",
            self.gate.total_replies(),
            self.gate.replies_today(),
            self.gate.max_replies_per_day()
        );
    }
}

/// Receiver that flips to `true` on Ctrl-C.
pub fn spawn_ctrl_c_listener() -> watch::Receiver<bool> {
    spawn_shutdown_listener(tokio::signal::ctrl_c())
}

/// Receiver that flips to `true` once `signal` resolves successfully. If the
/// signal cannot be installed the receiver never flips, and the sender stays
/// alive until every receiver is gone so the poll loop keeps running.
pub fn spawn_shutdown_listener<S>(signal: S) -> watch::Receiver<bool>
where
    S: Future<Output = io::Result<()>> + Send + 'static,
{
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                tracing::info!("interrupt received, finishing current note");
                let _ = sender.send(true);
            },
            Err(err) => {
                tracing::error!(
                    "failed to listen for interrupt, Ctrl-C will not stop gracefully: {err}"
                );
                sender.closed().await;
            },
        }
    });
    receiver
}
