//! Persistence for posts, users, followed subreddits and episodes.
//!
//! # Overview
//!
//! The store consists of:
//! - [`Store`] - Main interface over the `SQLite` database
//! - [`Post`] / [`NewPost`] - Fetched content with embedded replies
//! - [`User`] - Listener identities owning episodes
//! - [`Episode`] / [`NewEpisode`] - Rendered episodes and their post associations
//! - [`StoreError`] - Operation error types
//!
//! Posts are write-once: a re-fetch of a stored `reddit_id` is ignored.
//! Episodes are written together with their post associations in one
//! transaction.

mod episodes;
mod error;
mod models;
mod users;

pub use episodes::{CandidateFilter, CandidateOrder};
pub use error::{DbErrorKind, StoreError};
pub use models::{Episode, NewEpisode, NewPost, Post, Reply, User};
pub use users::GLOBAL_USER;

use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, instrument};

use crate::db::Database;
use models::{POST_COLUMNS, PostRow};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store manager over the application database.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Creates a store over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the subset of `reddit_ids` that are already stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self, reddit_ids), fields(count = reddit_ids.len()))]
    pub async fn existing_reddit_ids(&self, reddit_ids: &[String]) -> Result<HashSet<String>> {
        if reddit_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT reddit_id FROM posts WHERE reddit_id IN (");
        let mut separated = builder.separated(", ");
        for id in reddit_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(String,)> = builder.build_query_as().fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Inserts a batch of posts in a single transaction.
    ///
    /// Posts whose `reddit_id` is already stored are skipped. Either every new
    /// row of the batch is committed or none is.
    ///
    /// Returns the number of rows actually inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if any insert or the commit fails.
    #[instrument(skip(self, posts), fields(batch = posts.len()))]
    pub async fn insert_posts(&self, posts: &[NewPost]) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;

        for post in posts {
            let comments = if post.comments.is_empty() {
                None
            } else {
                serde_json::to_string(&post.comments).ok()
            };

            let result = sqlx::query(
                r"INSERT INTO posts
                    (reddit_id, subreddit, title, content, url, author, score, num_comments, created_utc, comments)
                  VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                  ON CONFLICT(reddit_id) DO NOTHING",
            )
            .bind(&post.reddit_id)
            .bind(&post.subreddit)
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.url)
            .bind(&post.author)
            .bind(post.score)
            .bind(post.num_comments)
            .bind(post.created_utc)
            .bind(comments)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(inserted, "Committed post batch");
        Ok(inserted)
    }

    /// Fetches a stored post by its external id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn post_by_reddit_id(&self, reddit_id: &str) -> Result<Option<Post>> {
        let row: Option<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.reddit_id = ?"
        ))
        .bind(reddit_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(Post::from))
    }

    /// Counts stored posts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count_posts(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Deletes every stored post. Episode associations cascade.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear_posts(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM posts")
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
