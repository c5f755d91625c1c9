use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use comment_pilot_shared::Comment;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, USER_AGENT};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::FeedConfig;

const COMMENT_PAGE_PATH: &str = "/api/sns/web/v1/comment/page";
const COMMENT_POST_PATH: &str = "/api/sns/web/v1/comment/post";

/// The two capabilities the poll loop needs from the comment platform.
#[async_trait]
pub trait CommentFeed: Send + Sync {
    /// Current comments of `post_id`, top-level first, then nested replies.
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>>;

    /// Post `text` as a reply to `comment_id`. `Ok(false)` means the platform
    /// answered but refused the reply.
    async fn post_reply(&self, post_id: &str, comment_id: &str, text: &str) -> Result<bool>;
}

/// HTTP client for the Xiaohongshu web comment API.
#[derive(Clone)]
pub struct XhsFeedClient {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct CommentPageResponse {
    #[serde(default)]
    data: Option<CommentPageData>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentPageData {
    #[serde(default)]
    comments: Vec<Value>,
}

/// Every field tolerates `null`; only the id and author id are required and
/// those are checked after decoding.
#[derive(Debug, Deserialize)]
struct RawComment {
    id: Option<String>,
    user: Option<RawUser>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    create_time: Option<i64>,
    #[serde(default)]
    like_count: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    user_id: Option<String>,
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostReplyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    msg: Option<String>,
}

impl XhsFeedClient {
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(config.cookies.trim())
                .context("xiaohongshu.cookies is not a valid header value")?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(config.user_agent.trim())
                .context("xiaohongshu.user_agent is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .default_headers(headers)
            .build()
            .context("failed to build feed http client")?;

        Ok(Self {
            client,
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CommentFeed for XhsFeedClient {
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let url = format!("{}{COMMENT_PAGE_PATH}", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("note_id", post_id),
                ("cursor", "0"),
                ("top_comment_id", ""),
                ("image_scenes", ""),
            ])
            .send()
            .await
            .with_context(|| format!("comment page request failed for note {post_id}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("comment page for note {post_id} returned status {status}");
        }

        let page: CommentPageResponse = response
            .json()
            .await
            .with_context(|| format!("comment page for note {post_id} is not valid JSON"))?;
        let raw = page.data.unwrap_or_default().comments;
        Ok(flatten_comments(post_id, raw))
    }

    async fn post_reply(&self, post_id: &str, comment_id: &str, text: &str) -> Result<bool> {
        let url = format!("{}{COMMENT_POST_PATH}", self.api_base);
        let body = json!({
            "note_id": post_id,
            "content": text,
            "comment_id": comment_id,
            "at_users": {},
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("reply request failed for comment {comment_id}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("reply to comment {comment_id} returned status {status}");
        }

        let result: PostReplyResponse = response
            .json()
            .await
            .with_context(|| format!("reply response for comment {comment_id} is not valid JSON"))?;
        if !result.success {
            tracing::warn!(
                "feed refused reply to comment {comment_id}: {}",
                result.msg.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(result.success)
    }
}

/// Turn one page of raw comments into [`Comment`]s: top-level comments first,
/// then every nested reply tagged with its parent. Entries without an id or
/// author are skipped on their own; the replies under a skipped parent are
/// still kept as long as the parent carries an id.
fn flatten_comments(post_id: &str, raw: Vec<Value>) -> Vec<Comment> {
    let mut top_level = Vec::new();
    let mut nested = Vec::new();

    for mut value in raw {
        let sub_comments = match value.get_mut("sub_comments").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let parent_id = value
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if let Some(comment) = parse_raw_comment(post_id, value) {
            top_level.push(comment);
        }
        if sub_comments.is_empty() {
            continue;
        }
        let Some(parent_id) = parent_id else {
            tracing::warn!(
                "skipping {} replies on note {post_id} under a comment without id",
                sub_comments.len()
            );
            continue;
        };
        for sub_value in sub_comments {
            if let Some(mut sub) = parse_raw_comment(post_id, sub_value) {
                sub.is_sub_comment = true;
                sub.parent_comment_id = Some(parent_id.clone());
                nested.push(sub);
            }
        }
    }

    top_level.extend(nested);
    top_level
}

fn parse_raw_comment(post_id: &str, value: Value) -> Option<Comment> {
    let raw: RawComment = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!("skipping malformed comment on note {post_id}: {err}");
            return None;
        },
    };

    let comment_id = raw.id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());
    let (user_id, user_name) = match raw.user {
        Some(user) => (
            user.user_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()),
            user.nickname.unwrap_or_default(),
        ),
        None => (None, String::new()),
    };
    let (Some(comment_id), Some(user_id)) = (comment_id, user_id) else {
        tracing::warn!("skipping comment on note {post_id} without id or author");
        return None;
    };

    Some(Comment {
        comment_id,
        post_id: post_id.to_string(),
        user_id,
        user_name,
        content: raw.content.unwrap_or_default(),
        create_time: raw.create_time,
        like_count: raw.like_count.as_ref().map_or(0, parse_count),
        is_sub_comment: false,
        parent_comment_id: None,
    })
}

/// The web API reports counters either as numbers or as numeric strings.
fn parse_count(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number.as_u64().unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
