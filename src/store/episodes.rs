//! Episodes, their post associations, and the candidate pool for new episodes.

use sqlx::{QueryBuilder, Sqlite};
use tracing::{info, instrument};

use super::models::{POST_COLUMNS, PostRow};
use super::{Episode, NewEpisode, Post, Result, Store};

const EPISODE_COLUMNS: &str = "id, title, description, transcript_path, audio_path, \
     duration_seconds, post_count, user_id, created_at";

/// Which posts may go into a new episode for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    /// The requesting user.
    pub user_id: i64,
    /// Keep posts already used in this user's episodes.
    pub include_covered: bool,
    /// Restrict to these subreddits when non-empty.
    pub subreddits: Vec<String>,
}

/// Ordering of the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrder {
    /// Highest score first; ties keep insertion order.
    Engagement,
    /// Most recently fetched first.
    Recent,
}

impl Store {
    /// Returns up to `limit` candidate posts for a new episode.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn candidate_posts(
        &self,
        filter: &CandidateFilter,
        order: CandidateOrder,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE 1 = 1"));

        if !filter.include_covered {
            builder
                .push(
                    " AND NOT EXISTS (SELECT 1 FROM post_episodes pe \
                     JOIN episodes e ON e.id = pe.episode_id \
                     WHERE pe.post_id = p.id AND e.user_id = ",
                )
                .push_bind(filter.user_id)
                .push(")");
        }

        if !filter.subreddits.is_empty() {
            builder.push(" AND p.subreddit IN (");
            let mut separated = builder.separated(", ");
            for subreddit in &filter.subreddits {
                separated.push_bind(subreddit);
            }
            separated.push_unseparated(")");
        }

        builder.push(match order {
            CandidateOrder::Engagement => " ORDER BY p.score DESC, p.id ASC",
            CandidateOrder::Recent => " ORDER BY p.fetched_at DESC, p.id DESC",
        });
        builder.push(" LIMIT ").push_bind(limit);

        let rows: Vec<PostRow> = builder.build_query_as().fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Records an episode and links it to its posts atomically.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if any statement or the commit
    /// fails; nothing is written in that case.
    #[instrument(skip(self, episode), fields(user_id = episode.user_id, posts = episode.post_ids.len()))]
    pub async fn record_episode(&self, episode: &NewEpisode) -> Result<Episode> {
        let mut tx = self.db.pool().begin().await?;

        let post_count = i64::try_from(episode.post_ids.len()).unwrap_or(i64::MAX);
        let stored: Episode = sqlx::query_as(&format!(
            "INSERT INTO episodes \
               (title, description, transcript_path, audio_path, duration_seconds, post_count, user_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {EPISODE_COLUMNS}"
        ))
        .bind(&episode.title)
        .bind(&episode.description)
        .bind(&episode.transcript_path)
        .bind(&episode.audio_path)
        .bind(episode.duration_seconds)
        .bind(post_count)
        .bind(episode.user_id)
        .fetch_one(&mut *tx)
        .await?;

        for post_id in &episode.post_ids {
            sqlx::query("INSERT INTO post_episodes (post_id, episode_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(stored.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(episode_id = stored.id, "Recorded episode");
        Ok(stored)
    }

    /// Lists a user's episodes, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn episodes_for_user(&self, user_id: i64) -> Result<Vec<Episode>> {
        let episodes = sqlx::query_as(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes WHERE user_id = ? ORDER BY id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(episodes)
    }

    /// Returns the post ids linked to an episode.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn episode_post_ids(&self, episode_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT post_id FROM post_episodes WHERE episode_id = ? ORDER BY post_id",
        )
        .bind(episode_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Counts stored episodes.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn count_episodes(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM episodes")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Deletes every episode, associations first.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if a delete or the commit fails.
    #[instrument(skip(self))]
    pub async fn clear_episodes(&self) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM post_episodes")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM episodes").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
