//! Optional LLM-based ranking of posts for episode worthiness.
//!
//! Scoring never fails: any model error or unreadable answer falls back to
//! a neutral score.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::llm::LanguageModel;
use crate::store::Post;

/// Score assumed when the model gives none.
pub const DEFAULT_SCORE: u8 = 5;

/// Highest possible score.
pub const MAX_SCORE: u8 = 10;

/// Reasoning recorded when the model call fails.
pub const FALLBACK_REASONING: &str = "API error. Using default score.";

const SCORING_MAX_TOKENS: u32 = 256;

const SCORE_PROMPT: &str = include_str!("prompts/score_post.txt");

#[allow(clippy::expect_used)]
static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("integer regex is valid"));

/// The model's verdict on one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostAnalysis {
    /// 0 to 10.
    pub score: u8,
    /// Whether the discussion thread is worth pulling in.
    pub should_fetch: bool,
    pub reasoning: String,
}

impl PostAnalysis {
    /// Verdict used when the model could not be reached.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            score: DEFAULT_SCORE,
            should_fetch: false,
            reasoning: FALLBACK_REASONING.to_string(),
        }
    }
}

/// Renders the rubric prompt for a post.
#[must_use]
pub fn build_prompt(post: &Post) -> String {
    let content = post
        .content
        .as_deref()
        .filter(|content| !content.trim().is_empty())
        .unwrap_or("No text content (link post)");
    SCORE_PROMPT
        .replace("{title}", &post.title)
        .replace("{subreddit}", &post.subreddit)
        .replace("{url}", &post.url)
        .replace("{content}", content)
}

/// Parses a `SCORE:` / `FETCH_URL:` / `REASONING:` answer.
///
/// Labels match case-insensitively at the start of a line. The score is the
/// first integer after the label, capped at 10; anything unreadable leaves
/// the default of 5.
#[must_use]
pub fn parse_analysis(response: &str) -> PostAnalysis {
    let mut analysis = PostAnalysis {
        score: DEFAULT_SCORE,
        should_fetch: false,
        reasoning: String::new(),
    };

    for line in response.trim().lines() {
        let line = line.trim();
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        match label.trim().to_ascii_uppercase().as_str() {
            "SCORE" => {
                if let Some(found) = FIRST_INTEGER.find(value) {
                    // Digit runs too long for u64 are far above the cap anyway.
                    analysis.score = found
                        .as_str()
                        .parse::<u64>()
                        .ok()
                        .and_then(|n| u8::try_from(n.min(u64::from(MAX_SCORE))).ok())
                        .unwrap_or(MAX_SCORE);
                }
            }
            "FETCH_URL" => analysis.should_fetch = value.to_lowercase().contains("yes"),
            "REASONING" => analysis.reasoning = value.trim().to_string(),
            _ => {}
        }
    }

    analysis
}

/// Ranks posts with a language model.
#[derive(Clone)]
pub struct ContentScorer {
    model: Arc<dyn LanguageModel>,
}

impl ContentScorer {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Scores a single post. Never fails.
    #[instrument(skip(self, post), fields(reddit_id = %post.reddit_id))]
    pub async fn analyze(&self, post: &Post) -> PostAnalysis {
        match self
            .model
            .complete(&build_prompt(post), SCORING_MAX_TOKENS)
            .await
        {
            Ok(response) => {
                let analysis = parse_analysis(&response);
                debug!(score = analysis.score, fetch = analysis.should_fetch, "Scored post");
                analysis
            }
            Err(error) => {
                warn!(%error, "Scoring failed, using default score");
                PostAnalysis::fallback()
            }
        }
    }

    /// Scores every post, keeps those reaching `min_score`, best first.
    ///
    /// Equal scores keep their input order.
    pub async fn score_posts(&self, posts: Vec<Post>, min_score: u8) -> Vec<(Post, PostAnalysis)> {
        let mut scored = Vec::with_capacity(posts.len());
        for post in posts {
            let analysis = self.analyze(&post).await;
            if analysis.score >= min_score {
                scored.push((post, analysis));
            }
        }
        scored.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        scored
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use chrono::Utc;

    struct Failing;

    #[async_trait]
    impl LanguageModel for Failing {
        fn provider(&self) -> &'static str {
            "failing"
        }
        fn model(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            Err(LlmError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }

    fn post(title: &str) -> Post {
        Post {
            id: 1,
            reddit_id: title.to_string(),
            subreddit: "rust".to_string(),
            title: title.to_string(),
            content: None,
            url: "https://www.reddit.com/r/rust/comments/x/".to_string(),
            author: "ferris".to_string(),
            score: 1,
            num_comments: 0,
            created_utc: Utc::now(),
            fetched_at: Utc::now(),
            comments: Vec::new(),
        }
    }

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_analysis_well_formed() {
        let analysis = parse_analysis("SCORE: 8\nFETCH_URL: yes\nREASONING: Spicy take.");
        assert_eq!(analysis.score, 8);
        assert!(analysis.should_fetch);
        assert_eq!(analysis.reasoning, "Spicy take.");
    }

    #[test]
    fn test_parse_analysis_case_insensitive_and_fractional() {
        let analysis = parse_analysis("score: 7/10\nfetch_url: No\nreasoning: meh");
        assert_eq!(analysis.score, 7);
        assert!(!analysis.should_fetch);
    }

    #[test]
    fn test_parse_analysis_clamps_high_scores() {
        assert_eq!(parse_analysis("SCORE: 42").score, 10);
    }

    #[test]
    fn test_parse_analysis_malformed_defaults_to_five() {
        let analysis = parse_analysis("I think it's great!");
        assert_eq!(analysis.score, DEFAULT_SCORE);
        assert!(!analysis.should_fetch);
        assert_eq!(parse_analysis("SCORE: high").score, DEFAULT_SCORE);
    }

    #[test]
    fn test_build_prompt_marks_link_posts() {
        let prompt = build_prompt(&post("Hello"));
        assert!(prompt.contains("Post Title: Hello"));
        assert!(prompt.contains("r/rust"));
        assert!(prompt.contains("No text content (link post)"));
    }

    // ==================== Scorer Tests ====================

    #[tokio::test]
    async fn test_analyze_model_error_falls_back() {
        let scorer = ContentScorer::new(Arc::new(Failing));
        let analysis = scorer.analyze(&post("x")).await;
        assert_eq!(analysis, PostAnalysis::fallback());
    }

    #[tokio::test]
    async fn test_score_posts_filters_and_sorts() {
        struct ByTitle;

        #[async_trait]
        impl LanguageModel for ByTitle {
            fn provider(&self) -> &'static str {
                "by-title"
            }
            fn model(&self) -> &str {
                "by-title"
            }
            async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
                let score = if prompt.contains("Post Title: high") {
                    9
                } else if prompt.contains("Post Title: mid") {
                    6
                } else {
                    2
                };
                Ok(format!("SCORE: {score}\nFETCH_URL: no\nREASONING: ok"))
            }
        }

        let scorer = ContentScorer::new(Arc::new(ByTitle));
        let scored = scorer
            .score_posts(vec![post("low"), post("mid"), post("high")], 5)
            .await;

        let titles: Vec<_> = scored.iter().map(|(p, _)| p.title.as_str()).collect();
        assert_eq!(titles, vec!["high", "mid"]);
    }
}
