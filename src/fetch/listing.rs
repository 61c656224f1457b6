//! JSON listing adapter: raw API records and their normalization into posts.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::store::{NewPost, Reply};

/// Kind tag of post records in a listing.
const POST_KIND: &str = "t3";

/// Kind tag of reply records in a comment tree.
const REPLY_KIND: &str = "t1";

/// Author placeholder for removed accounts.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Sort {
    #[default]
    Hot,
    New,
    Top,
    Rising,
    Controversial,
}

impl Sort {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::New => "new",
            Self::Top => "top",
            Self::Rising => "rising",
            Self::Controversial => "controversial",
        }
    }

    /// Whether the listing accepts a time window.
    #[must_use]
    pub fn takes_time_filter(self) -> bool {
        matches!(self, Self::Top | Self::Controversial)
    }
}

/// Time window for `top` and `controversial` listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TimeFilter {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

/// Parameters of one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub subreddit: String,
    pub sort: Sort,
    pub time_filter: TimeFilter,
    /// Maximum number of posts to return.
    pub limit: u32,
}

impl ListingRequest {
    #[must_use]
    pub fn new(subreddit: impl Into<String>, sort: Sort, limit: u32) -> Self {
        Self {
            subreddit: normalize_subreddit(&subreddit.into()),
            sort,
            time_filter: TimeFilter::default(),
            limit,
        }
    }

    #[must_use]
    pub fn with_time_filter(mut self, time_filter: TimeFilter) -> Self {
        self.time_filter = time_filter;
        self
    }
}

/// Normalizes a source-group name: trimmed, lowercase, without a leading `r/`.
#[must_use]
pub fn normalize_subreddit(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("/r/")
        .or_else(|| lowered.strip_prefix("r/"))
        .unwrap_or(&lowered);
    stripped.trim_matches('/').to_string()
}

/// A post record as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub permalink: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_utc: f64,
}

impl RawPost {
    /// Canonical thread URL under `web_base`.
    #[must_use]
    pub fn canonical_url(&self, web_base: &str) -> String {
        format!("{}{}", web_base.trim_end_matches('/'), self.permalink)
    }

    /// Converts the record into a storable post.
    #[must_use]
    pub fn into_new_post(self, subreddit: &str, web_base: &str, comments: Vec<Reply>) -> NewPost {
        let url = self.canonical_url(web_base);
        let content = if self.selftext.trim().is_empty() {
            None
        } else {
            Some(self.selftext)
        };
        NewPost {
            reddit_id: self.id,
            subreddit: subreddit.to_string(),
            title: self.title,
            content,
            url,
            author: self
                .author
                .filter(|author| !author.is_empty())
                .unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            score: self.score,
            num_comments: self.num_comments,
            created_utc: timestamp_from_epoch(self.created_utc),
            comments,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp_from_epoch(secs: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs.trunc() as i64, 0)
        .single()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: Value,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub posts: Vec<RawPost>,
    /// Cursor for the next page.
    pub after: Option<String>,
}

/// Parses a listing page, keeping only post records.
///
/// # Errors
///
/// Returns a description of the problem when the body is not a listing.
pub fn parse_listing(body: &Value) -> Result<ListingPage, String> {
    let envelope = ListingEnvelope::deserialize(body).map_err(|e| e.to_string())?;
    let posts = envelope
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == POST_KIND)
        .filter_map(|thing| RawPost::deserialize(thing.data).ok())
        .collect();
    Ok(ListingPage {
        posts,
        after: envelope.data.after.filter(|cursor| !cursor.is_empty()),
    })
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    score: i64,
}

/// Parses a thread response (`[post listing, reply listing]`) into its
/// top-level replies, highest score first, truncated to `limit`.
///
/// # Errors
///
/// Returns a description of the problem when the body is not a thread.
pub fn parse_replies(body: &Value, limit: usize) -> Result<Vec<Reply>, String> {
    let reply_listing = body
        .as_array()
        .and_then(|parts| parts.get(1))
        .ok_or_else(|| "expected a two-element thread array".to_string())?;
    let envelope = ListingEnvelope::deserialize(reply_listing).map_err(|e| e.to_string())?;

    let mut replies: Vec<Reply> = envelope
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == REPLY_KIND)
        .filter_map(|thing| RawReply::deserialize(thing.data).ok())
        .map(|raw| Reply {
            author: raw
                .author
                .filter(|author| !author.is_empty())
                .unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            body: raw.body,
            score: raw.score,
        })
        .collect();

    replies.sort_by(|a, b| b.score.cmp(&a.score));
    replies.truncate(limit);
    Ok(replies)
}
