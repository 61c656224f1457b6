//! Picks the posts for a new episode from the user's unused pool.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

use super::EpisodeError;
use crate::store::{CandidateFilter, CandidateOrder, Post, Store};

/// Random selection samples from this many times the requested count of
/// the most recently fetched candidates.
pub const RANDOM_WINDOW_FACTOR: usize = 3;

/// How posts are chosen from the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Top posts by score; ties keep insertion order.
    ByEngagement,
    /// A random sample of recent posts.
    #[default]
    Random,
}

/// Selects up to `count` posts.
///
/// # Errors
///
/// Returns [`EpisodeError::NoCandidates`] when the pool is empty and
/// [`EpisodeError::Store`] if the query fails.
#[instrument(skip(store, rng), fields(user_id = filter.user_id))]
pub async fn select_posts<R: Rng + ?Sized>(
    store: &Store,
    filter: &CandidateFilter,
    mode: SelectionMode,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Post>, EpisodeError> {
    let count = count.max(1);
    let posts = match mode {
        SelectionMode::ByEngagement => {
            store
                .candidate_posts(filter, CandidateOrder::Engagement, as_limit(count))
                .await?
        }
        SelectionMode::Random => {
            let window = count.saturating_mul(RANDOM_WINDOW_FACTOR);
            let pool = store
                .candidate_posts(filter, CandidateOrder::Recent, as_limit(window))
                .await?;
            debug!(pool = pool.len(), "Sampling from recent candidates");
            pool.choose_multiple(rng, count).cloned().collect()
        }
    };

    if posts.is_empty() {
        return Err(EpisodeError::NoCandidates);
    }
    debug!(selected = posts.len(), "Posts selected");
    Ok(posts)
}

fn as_limit(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::NewEpisode;
    use crate::store::tests::{sample_post, test_store};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn filter(user_id: i64) -> CandidateFilter {
        CandidateFilter {
            user_id,
            include_covered: false,
            subreddits: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_by_engagement_picks_top_scores() {
        let store = test_store().await;
        let posts: Vec<_> = [10, 7, 9, 3]
            .iter()
            .enumerate()
            .map(|(i, &score)| sample_post(&format!("p{i}"), "rust", score))
            .collect();
        store.insert_posts(&posts).await.unwrap();
        let user = store.get_or_create_user("alice").await.unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let selected = select_posts(&store, &filter(user.id), SelectionMode::ByEngagement, 2, &mut rng)
            .await
            .unwrap();

        let ids: Vec<&str> = selected.iter().map(|p| p.reddit_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p2"]);
    }

    #[tokio::test]
    async fn test_by_engagement_ranks_by_score_not_replies() {
        let store = test_store().await;
        let posts: Vec<_> = [10, 7, 9, 3]
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                let mut post = sample_post(&format!("p{i}"), "rust", score);
                if score == 7 {
                    post.num_comments = 50;
                }
                post
            })
            .collect();
        store.insert_posts(&posts).await.unwrap();
        let user = store.get_or_create_user("alice").await.unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let selected = select_posts(&store, &filter(user.id), SelectionMode::ByEngagement, 2, &mut rng)
            .await
            .unwrap();

        let scores: Vec<i64> = selected.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![10, 9]);
    }

    #[tokio::test]
    async fn test_random_is_seeded_and_bounded() {
        let store = test_store().await;
        let posts: Vec<_> = (0..20)
            .map(|i| sample_post(&format!("p{i}"), "rust", i))
            .collect();
        store.insert_posts(&posts).await.unwrap();
        let user = store.get_or_create_user("alice").await.unwrap();

        let first = select_posts(
            &store,
            &filter(user.id),
            SelectionMode::Random,
            4,
            &mut StdRng::seed_from_u64(42),
        )
        .await
        .unwrap();
        let second = select_posts(
            &store,
            &filter(user.id),
            SelectionMode::Random,
            4,
            &mut StdRng::seed_from_u64(42),
        )
        .await
        .unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(
            first.iter().map(|p| p.id).collect::<Vec<_>>(),
            second.iter().map(|p| p.id).collect::<Vec<_>>()
        );
        let mut ids: Vec<i64> = first.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_pool_is_no_candidates() {
        let store = test_store().await;
        let user = store.get_or_create_user("alice").await.unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let err = select_posts(&store, &filter(user.id), SelectionMode::Random, 3, &mut rng)
            .await
            .unwrap_err();

        assert!(matches!(err, EpisodeError::NoCandidates));
    }

    #[tokio::test]
    async fn test_covered_posts_excluded_for_owner_only() {
        let store = test_store().await;
        store
            .insert_posts(&[sample_post("a1", "rust", 5)])
            .await
            .unwrap();
        let alice = store.get_or_create_user("alice").await.unwrap();
        let bob = store.get_or_create_user("bob").await.unwrap();
        let post = store.post_by_reddit_id("a1").await.unwrap().unwrap();
        store
            .record_episode(&NewEpisode {
                title: "t".to_string(),
                description: "d".to_string(),
                transcript_path: String::new(),
                audio_path: "a.mp3".to_string(),
                duration_seconds: 1.0,
                user_id: alice.id,
                post_ids: vec![post.id],
            })
            .await
            .unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let err = select_posts(&store, &filter(alice.id), SelectionMode::ByEngagement, 1, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, EpisodeError::NoCandidates));

        let for_bob = select_posts(&store, &filter(bob.id), SelectionMode::ByEngagement, 1, &mut rng)
            .await
            .unwrap();
        assert_eq!(for_bob.len(), 1);
    }
}
