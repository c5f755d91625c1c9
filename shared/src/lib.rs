//! Core of the comment reply engine: classification, reply selection,
//! customer tracking and the dedupe/rate gate. Everything here is
//! transport-agnostic; the feed client and poll loop live in the backend.

pub mod classifier;
pub mod customer_store;
pub mod reply_gate;
pub mod reply_strategy;

use serde::{Deserialize, Serialize};

// 评论数据模型（每次轮询由评论源生成，不落盘）
/// A single comment observed on a tracked post, top-level or nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique across top-level comments and sub-comments of the same post.
    pub comment_id: String,
    /// Post (note) the comment belongs to.
    pub post_id: String,
    /// Author id; keys the customer record.
    pub user_id: String,
    /// Author display name at the time of the fetch.
    pub user_name: String,
    /// Raw comment text.
    pub content: String,
    /// Creation time in epoch millis, when the feed reports one.
    pub create_time: Option<i64>,
    /// Like counter as reported by the feed.
    pub like_count: u64,
    /// True for replies nested under another comment.
    pub is_sub_comment: bool,
    /// Set iff `is_sub_comment`.
    pub parent_comment_id: Option<String>,
}

/// Truncate `text` to at most `max_chars` characters, marking the cut with
/// `...`.
pub fn text_preview(text: &str, max_chars: usize) -> String {
    let preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::text_preview;

    #[test]
    fn text_preview_counts_chars_not_bytes() {
        assert_eq!(text_preview("这个多少钱", 3), "这个多...");
        assert_eq!(text_preview("short", 30), "short");
        assert_eq!(text_preview("", 5), "");
    }
}
