//! Fetch-and-store pipeline for source groups.
//!
//! For each subreddit the [`Ingestor`] fetches the listing, drops posts that
//! are already stored (before any reply request is made), fetches replies for
//! the rest with adaptive pacing, and writes the group's posts in one
//! transaction. A failing group is reported and the remaining groups still run.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::fetch::{
    FetchError, ListingRequest, RateLimitSnapshot, RedditClient, Sort, TimeFilter, adaptive_delay,
    normalize_subreddit,
};
use crate::store::{NewPost, Store, StoreError};

/// Base pause between reply fetches.
pub const DEFAULT_COMMENT_DELAY: Duration = Duration::from_secs(6);

/// Base pause between source groups.
pub const DEFAULT_GROUP_DELAY: Duration = Duration::from_secs(1);

/// Replies kept per post by default.
pub const DEFAULT_COMMENT_LIMIT: usize = 10;

/// Where posts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Source {
    /// JSON listings with scores and replies.
    #[default]
    Json,
    /// Atom feeds; no scores, no replies.
    Rss,
}

/// Errors that abort one source group.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Knobs for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub sort: Sort,
    pub time_filter: TimeFilter,
    /// Posts requested per group.
    pub limit: u32,
    /// Replies kept per post (JSON source only).
    pub comment_limit: usize,
    pub source: Source,
    pub comment_delay: Duration,
    pub group_delay: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            sort: Sort::Hot,
            time_filter: TimeFilter::Day,
            limit: 25,
            comment_limit: DEFAULT_COMMENT_LIMIT,
            source: Source::Json,
            comment_delay: DEFAULT_COMMENT_DELAY,
            group_delay: DEFAULT_GROUP_DELAY,
        }
    }
}

impl IngestOptions {
    /// Rough wall-clock estimate for fetching `groups` groups.
    #[must_use]
    pub fn estimate(&self, groups: usize) -> Duration {
        if self.source == Source::Rss {
            return self.group_delay * u32::try_from(groups).unwrap_or(u32::MAX);
        }
        let posts = u32::try_from(groups)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.limit);
        self.comment_delay * posts
    }
}

/// Progress notifications emitted while ingesting.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    FetchingPosts {
        subreddit: String,
    },
    FetchingComments {
        subreddit: String,
        /// 1-based position among posts needing replies.
        index: usize,
        total: usize,
        /// Estimated time left for this group's reply fetches.
        eta: Duration,
    },
    Saving {
        subreddit: String,
        count: usize,
    },
    GroupDone(GroupReport),
    GroupFailed {
        subreddit: String,
        error: String,
    },
}

/// Outcome of one source group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub subreddit: String,
    /// Posts returned by the source.
    pub fetched: usize,
    /// Posts skipped because they were already stored.
    pub already_stored: usize,
    /// Rows actually inserted.
    pub inserted: u64,
}

/// Outcome of a multi-group run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub groups: Vec<GroupReport>,
    /// `(subreddit, error message)` for groups that failed.
    pub failures: Vec<(String, String)>,
}

impl IngestReport {
    #[must_use]
    pub fn total_inserted(&self) -> u64 {
        self.groups.iter().map(|group| group.inserted).sum()
    }
}

/// Fetches source groups and stores their posts.
#[derive(Debug)]
pub struct Ingestor<'a> {
    client: &'a RedditClient,
    store: &'a Store,
    options: IngestOptions,
}

impl<'a> Ingestor<'a> {
    #[must_use]
    pub fn new(client: &'a RedditClient, store: &'a Store, options: IngestOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    /// Ingests every group in order, pacing between groups from the last
    /// observed quota. Group failures are collected, not propagated.
    #[instrument(skip(self, on_event), fields(groups = subreddits.len()))]
    pub async fn ingest_all(
        &self,
        subreddits: &[String],
        on_event: &mut dyn FnMut(IngestEvent),
    ) -> IngestReport {
        let mut report = IngestReport::default();
        let mut last_quota: Option<RateLimitSnapshot> = None;

        for (index, raw_name) in subreddits.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(adaptive_delay(last_quota.as_ref(), self.options.group_delay))
                    .await;
            }

            let subreddit = normalize_subreddit(raw_name);
            match self.ingest_group(&subreddit, on_event).await {
                Ok((group, quota)) => {
                    last_quota = quota.or(last_quota);
                    on_event(IngestEvent::GroupDone(group.clone()));
                    report.groups.push(group);
                }
                Err(error) => {
                    warn!(%subreddit, %error, "Source group failed");
                    on_event(IngestEvent::GroupFailed {
                        subreddit: subreddit.clone(),
                        error: error.to_string(),
                    });
                    report.failures.push((subreddit, error.to_string()));
                }
            }
        }

        info!(
            inserted = report.total_inserted(),
            failed = report.failures.len(),
            "Ingest complete"
        );
        report
    }

    /// Ingests one group and returns its report with the last observed quota.
    ///
    /// # Errors
    ///
    /// A listing failure or a failed batch insert aborts the group; nothing
    /// from the group is stored in that case.
    #[instrument(skip(self, on_event))]
    pub async fn ingest_group(
        &self,
        subreddit: &str,
        on_event: &mut dyn FnMut(IngestEvent),
    ) -> Result<(GroupReport, Option<RateLimitSnapshot>), IngestError> {
        on_event(IngestEvent::FetchingPosts {
            subreddit: subreddit.to_string(),
        });

        let request = ListingRequest::new(subreddit, self.options.sort, self.options.limit)
            .with_time_filter(self.options.time_filter);

        let (posts, fetched, already_stored, quota) = match self.options.source {
            Source::Json => self.collect_json(&request, on_event).await?,
            Source::Rss => self.collect_feed(&request).await?,
        };

        on_event(IngestEvent::Saving {
            subreddit: subreddit.to_string(),
            count: posts.len(),
        });
        let inserted = self.store.insert_posts(&posts).await?;

        Ok((
            GroupReport {
                subreddit: subreddit.to_string(),
                fetched,
                already_stored,
                inserted,
            },
            quota,
        ))
    }

    async fn collect_json(
        &self,
        request: &ListingRequest,
        on_event: &mut dyn FnMut(IngestEvent),
    ) -> Result<(Vec<NewPost>, usize, usize, Option<RateLimitSnapshot>), IngestError> {
        let listing = self.client.fetch_listing(request).await?;
        let fetched = listing.posts.len();

        let ids: Vec<String> = listing.posts.iter().map(|post| post.id.clone()).collect();
        let existing = self.store.existing_reddit_ids(&ids).await?;
        let already_stored = ids.iter().filter(|id| existing.contains(*id)).count();
        let mut seen = HashSet::new();
        let fresh: Vec<_> = listing
            .posts
            .into_iter()
            .filter(|post| !existing.contains(&post.id) && seen.insert(post.id.clone()))
            .collect();

        let mut quota = listing.rate_limit;
        let total = fresh.len();
        let mut posts = Vec::with_capacity(total);

        for (index, raw) in fresh.into_iter().enumerate() {
            let delay = adaptive_delay(Some(&quota), self.options.comment_delay);
            let left = u32::try_from(total - index).unwrap_or(u32::MAX);
            on_event(IngestEvent::FetchingComments {
                subreddit: request.subreddit.clone(),
                index: index + 1,
                total,
                eta: delay * left,
            });
            tokio::time::sleep(delay).await;

            let url = raw.canonical_url(self.client.web_base());
            let replies = self
                .client
                .fetch_comments(&url, self.options.comment_limit)
                .await;
            if let Some(observed) = replies.rate_limit {
                quota = observed;
            }
            posts.push(raw.into_new_post(
                &request.subreddit,
                self.client.web_base(),
                replies.replies,
            ));
        }

        Ok((posts, fetched, already_stored, Some(quota)))
    }

    async fn collect_feed(
        &self,
        request: &ListingRequest,
    ) -> Result<(Vec<NewPost>, usize, usize, Option<RateLimitSnapshot>), IngestError> {
        let page = self.client.fetch_feed(request).await?;
        let fetched = page.posts.len();

        let ids: Vec<String> = page.posts.iter().map(|post| post.reddit_id.clone()).collect();
        let existing = self.store.existing_reddit_ids(&ids).await?;
        let posts: Vec<NewPost> = page
            .posts
            .into_iter()
            .filter(|post| !existing.contains(&post.reddit_id))
            .collect();
        let already_stored = fetched - posts.len();

        Ok((posts, fetched, already_stored, Some(page.rate_limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_json_counts_reply_delays() {
        let options = IngestOptions {
            limit: 10,
            ..IngestOptions::default()
        };
        assert_eq!(options.estimate(2), Duration::from_secs(120));
    }

    #[test]
    fn test_estimate_rss_only_counts_group_delays() {
        let options = IngestOptions {
            source: Source::Rss,
            ..IngestOptions::default()
        };
        assert_eq!(options.estimate(3), Duration::from_secs(3));
    }

    #[test]
    fn test_report_total_inserted() {
        let report = IngestReport {
            groups: vec![
                GroupReport {
                    subreddit: "rust".to_string(),
                    fetched: 5,
                    already_stored: 2,
                    inserted: 3,
                },
                GroupReport {
                    subreddit: "golang".to_string(),
                    fetched: 1,
                    already_stored: 0,
                    inserted: 1,
                },
            ],
            failures: Vec::new(),
        };
        assert_eq!(report.total_inserted(), 4);
    }
}
