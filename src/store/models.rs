//! Persisted entities: posts, users and episodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A reply embedded in a post, ordered by score when fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub author: String,
    pub body: String,
    pub score: i64,
}

/// A normalized post ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    /// Globally unique external identifier.
    pub reddit_id: String,
    pub subreddit: String,
    pub title: String,
    pub content: Option<String>,
    /// Canonical web URL of the thread.
    pub url: String,
    pub author: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: DateTime<Utc>,
    pub comments: Vec<Reply>,
}

/// A stored post.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub reddit_id: String,
    pub subreddit: String,
    pub title: String,
    pub content: Option<String>,
    pub url: String,
    pub author: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub comments: Vec<Reply>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    id: i64,
    reddit_id: String,
    subreddit: String,
    title: String,
    content: Option<String>,
    url: String,
    author: String,
    score: i64,
    num_comments: i64,
    created_utc: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
    comments: Option<String>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let comments = match row.comments.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|error| {
                warn!(reddit_id = %row.reddit_id, %error, "Discarding unreadable stored replies");
                Vec::new()
            }),
        };
        Self {
            id: row.id,
            reddit_id: row.reddit_id,
            subreddit: row.subreddit,
            title: row.title,
            content: row.content,
            url: row.url,
            author: row.author,
            score: row.score,
            num_comments: row.num_comments,
            created_utc: row.created_utc,
            fetched_at: row.fetched_at,
            comments,
        }
    }
}

/// Column list matching [`PostRow`].
pub(crate) const POST_COLUMNS: &str = "p.id, p.reddit_id, p.subreddit, p.title, p.content, p.url, \
     p.author, p.score, p.num_comments, p.created_utc, p.fetched_at, p.comments";

/// A listener identity that owns episodes and followed subreddits.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Bearer token for authenticated API access, when one was stored.
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A rendered episode.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Episode {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub transcript_path: String,
    pub audio_path: String,
    pub duration_seconds: Option<f64>,
    pub post_count: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to record an episode together with its post associations.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub title: String,
    pub description: String,
    pub transcript_path: String,
    pub audio_path: String,
    pub duration_seconds: f64,
    pub user_id: i64,
    pub post_ids: Vec<i64>,
}
