//! Rate-limited HTTP client for the forum API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::feed::parse_feed;
use super::listing::{ListingRequest, RawPost, parse_listing, parse_replies};
use super::rate_limit::{RateLimitSnapshot, RetryPolicy, countdown, countdown_steps};
use super::FetchError;
use crate::store::{NewPost, Reply};

/// Public web origin used for canonical thread URLs.
pub const DEFAULT_WEB_BASE: &str = "https://www.reddit.com";

/// Origin for bearer-authenticated API calls.
pub const DEFAULT_OAUTH_BASE: &str = "https://oauth.reddit.com";

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "threadcast:v0.1.0 (JSON reader)";

/// Largest page the listing endpoint serves.
pub const MAX_PAGE_SIZE: u32 = 100;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// One tick of a rate-limit countdown, reported to the wait observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitWait {
    pub url: String,
    /// Seconds left before the next attempt.
    pub seconds_left: u64,
    /// The upcoming retry (1-based).
    pub attempt: u32,
    pub max_retries: u32,
}

/// Observer invoked once per countdown tick while waiting out a 429.
pub type WaitObserver = Arc<dyn Fn(&RateLimitWait) + Send + Sync>;

/// Settings for [`RedditClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub web_base: String,
    pub oauth_base: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            oauth_base: DEFAULT_OAUTH_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// A successful response body with the quota it reported.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub rate_limit: RateLimitSnapshot,
}

/// Raw posts of a listing and the quota of its last page.
#[derive(Debug, Clone)]
pub struct Listing {
    pub posts: Vec<RawPost>,
    pub rate_limit: RateLimitSnapshot,
}

/// Posts of a feed and the quota reported with it.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub posts: Vec<NewPost>,
    pub rate_limit: RateLimitSnapshot,
}

/// Replies of a thread. Empty when fetching them failed.
#[derive(Debug, Clone, Default)]
pub struct Replies {
    pub replies: Vec<Reply>,
    pub rate_limit: Option<RateLimitSnapshot>,
}

/// HTTP client for listings, threads and feeds with bounded 429 retries.
#[derive(Clone)]
pub struct RedditClient {
    client: Client,
    web_base: String,
    oauth_base: String,
    retry: RetryPolicy,
    access_token: Option<String>,
    on_wait: Option<WaitObserver>,
}

impl std::fmt::Debug for RedditClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditClient")
            .field("web_base", &self.web_base)
            .field("oauth_base", &self.oauth_base)
            .field("retry", &self.retry)
            .field("authenticated", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl RedditClient {
    /// Builds a client from its settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the TLS backend cannot be initialized.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            client,
            web_base: config.web_base.trim_end_matches('/').to_string(),
            oauth_base: config.oauth_base.trim_end_matches('/').to_string(),
            retry: config.retry,
            access_token: None,
            on_wait: None,
        })
    }

    /// Routes API calls through the authenticated origin with `token`.
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|token| !token.is_empty());
        self
    }

    /// Registers an observer for rate-limit countdown ticks.
    #[must_use]
    pub fn with_wait_observer(mut self, observer: WaitObserver) -> Self {
        self.on_wait = Some(observer);
        self
    }

    /// The public web origin.
    #[must_use]
    pub fn web_base(&self) -> &str {
        &self.web_base
    }

    fn api_base(&self) -> &str {
        if self.access_token.is_some() {
            &self.oauth_base
        } else {
            &self.web_base
        }
    }

    /// GETs `url`, waiting out HTTP 429 responses.
    ///
    /// Each 429 is followed by a countdown of `max(reset hint, backoff)`
    /// seconds, the backoff doubling after every retry. Once the retry budget
    /// is spent the next 429 is terminal.
    ///
    /// # Errors
    ///
    /// - [`FetchError::RateLimitExhausted`] after `max_retries + 1` consecutive 429s
    /// - [`FetchError::HttpStatus`] for any other non-success status
    /// - [`FetchError::Network`] for transport failures
    #[instrument(skip(self, query, bearer), fields(url = %url))]
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        bearer: Option<&str>,
    ) -> Result<Fetched, FetchError> {
        let max_retries = self.retry.max_retries();
        let mut backoff = self.retry.initial_backoff();
        let target = with_query(url, query)?;

        for attempt in 0..=max_retries {
            let mut request = self.client.get(target.clone());
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| FetchError::network(url, e))?;
            let rate_limit = RateLimitSnapshot::from_headers(response.headers());
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt == max_retries {
                    break;
                }
                let wait = self.retry.wait_for(&rate_limit, backoff);
                warn!(
                    attempt = attempt + 1,
                    max_retries,
                    wait_secs = wait.as_secs_f64(),
                    "Rate limited, waiting before retry"
                );
                countdown(countdown_steps(wait), self.retry.tick(), |seconds_left| {
                    if let Some(observer) = &self.on_wait {
                        observer(&RateLimitWait {
                            url: url.to_string(),
                            seconds_left,
                            attempt: attempt + 1,
                            max_retries,
                        });
                    }
                })
                .await;
                backoff *= 2;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::http_status(url, status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::network(url, e))?;
            debug!(bytes = body.len(), remaining = ?rate_limit.remaining, "Fetched");
            return Ok(Fetched {
                body: body.to_vec(),
                rate_limit,
            });
        }

        Err(FetchError::RateLimitExhausted {
            url: url.to_string(),
            attempts: max_retries + 1,
        })
    }

    /// Fetches up to `request.limit` posts of a listing.
    ///
    /// Limits above one page are served by following the `after` cursor.
    ///
    /// # Errors
    ///
    /// Any request failure aborts the whole listing; an unexpected body is
    /// reported as [`FetchError::Decode`].
    #[instrument(skip(self), fields(subreddit = %request.subreddit, sort = request.sort.as_str()))]
    pub async fn fetch_listing(&self, request: &ListingRequest) -> Result<Listing, FetchError> {
        if request.limit == 0 {
            return Err(FetchError::InvalidRequest(
                "listing limit must be at least 1".to_string(),
            ));
        }
        if request.subreddit.is_empty() {
            return Err(FetchError::InvalidRequest(
                "subreddit name is empty".to_string(),
            ));
        }

        let url = format!(
            "{}/r/{}/{}.json",
            self.api_base(),
            request.subreddit,
            request.sort.as_str()
        );
        let target = request.limit as usize;
        let mut posts = Vec::with_capacity(target.min(MAX_PAGE_SIZE as usize));
        let mut after: Option<String> = None;
        let mut rate_limit = RateLimitSnapshot::default();

        loop {
            let page_size = (target - posts.len()).min(MAX_PAGE_SIZE as usize);
            let mut query = vec![("limit", page_size.to_string())];
            if request.sort.takes_time_filter() {
                query.push(("t", request.time_filter.as_str().to_string()));
            }
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let fetched = self
                .fetch_with_retry(&url, &query, self.access_token.as_deref())
                .await?;
            rate_limit = fetched.rate_limit;

            let body: serde_json::Value = serde_json::from_slice(&fetched.body)
                .map_err(|e| FetchError::decode(&url, e.to_string()))?;
            let page = parse_listing(&body).map_err(|message| FetchError::decode(&url, message))?;
            let page_len = page.posts.len();
            posts.extend(page.posts);

            after = page.after;
            if posts.len() >= target || after.is_none() || page_len == 0 {
                break;
            }
        }

        posts.truncate(target);
        info!(count = posts.len(), "Fetched listing");
        Ok(Listing { posts, rate_limit })
    }

    /// Fetches the top `limit` replies of a thread, highest score first.
    ///
    /// Best-effort: every failure, including exhausted rate-limit retries,
    /// yields an empty result.
    #[instrument(skip(self), fields(url = %post_url))]
    pub async fn fetch_comments(&self, post_url: &str, limit: usize) -> Replies {
        let Some(url) = self.thread_json_url(post_url) else {
            warn!("Cannot build thread URL, skipping replies");
            return Replies::default();
        };

        let fetched = match self
            .fetch_with_retry(
                &url,
                &[("limit", limit.to_string())],
                self.access_token.as_deref(),
            )
            .await
        {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(%error, "Reply fetch failed, continuing without replies");
                return Replies::default();
            }
        };

        let replies = serde_json::from_slice::<serde_json::Value>(&fetched.body)
            .map_err(|e| e.to_string())
            .and_then(|body| parse_replies(&body, limit));
        match replies {
            Ok(replies) => Replies {
                replies,
                rate_limit: Some(fetched.rate_limit),
            },
            Err(error) => {
                warn!(%error, "Unreadable reply listing, continuing without replies");
                Replies {
                    replies: Vec::new(),
                    rate_limit: Some(fetched.rate_limit),
                }
            }
        }
    }

    /// `{post_url}.json` on the API origin, keeping any query string.
    fn thread_json_url(&self, post_url: &str) -> Option<String> {
        let rebased = match post_url.strip_prefix(&self.web_base) {
            Some(rest) => format!("{}{rest}", self.api_base()),
            None => post_url.to_string(),
        };
        let mut url = Url::parse(&rebased).ok()?;
        let path = format!("{}.json", url.path().trim_end_matches('/'));
        url.set_path(&path);
        Some(url.into())
    }

    /// Fetches the Atom feed of a listing.
    ///
    /// # Errors
    ///
    /// Request failures propagate; an unparseable document is reported as
    /// [`FetchError::Decode`].
    #[instrument(skip(self), fields(subreddit = %request.subreddit, sort = request.sort.as_str()))]
    pub async fn fetch_feed(&self, request: &ListingRequest) -> Result<FeedPage, FetchError> {
        if request.subreddit.is_empty() {
            return Err(FetchError::InvalidRequest(
                "subreddit name is empty".to_string(),
            ));
        }

        let url = format!(
            "{}/r/{}/{}/.rss",
            self.web_base,
            request.subreddit,
            request.sort.as_str()
        );
        let mut query = Vec::new();
        if request.sort.takes_time_filter() {
            query.push(("t", request.time_filter.as_str().to_string()));
        }

        let fetched = self.fetch_with_retry(&url, &query, None).await?;
        let mut posts = parse_feed(&fetched.body, &request.subreddit)
            .map_err(|message| FetchError::decode(&url, message))?;
        posts.truncate(request.limit as usize);

        info!(count = posts.len(), "Fetched feed");
        Ok(FeedPage {
            posts,
            rate_limit: fetched.rate_limit,
        })
    }

    /// Checks a bearer token and returns the account name it belongs to.
    ///
    /// # Errors
    ///
    /// An expired or revoked token surfaces as [`FetchError::HttpStatus`] (401/403).
    #[instrument(skip(self, token))]
    pub async fn verify_token(&self, token: &str) -> Result<String, FetchError> {
        #[derive(Deserialize)]
        struct Me {
            name: String,
        }

        let url = format!("{}/api/v1/me", self.oauth_base);
        let fetched = self.fetch_with_retry(&url, &[], Some(token)).await?;
        let me: Me = serde_json::from_slice(&fetched.body)
            .map_err(|e| FetchError::decode(&url, e.to_string()))?;
        Ok(me.name)
    }
}

fn with_query(url: &str, query: &[(&str, String)]) -> Result<Url, FetchError> {
    let mut parsed =
        Url::parse(url).map_err(|e| FetchError::InvalidRequest(format!("{url}: {e}")))?;
    if !query.is_empty() {
        parsed
            .query_pairs_mut()
            .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
    }
    Ok(parsed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_appends_pairs() {
        let url = with_query(
            "https://www.reddit.com/r/rust/top.json",
            &[("limit", "25".to_string()), ("t", "day".to_string())],
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://www.reddit.com/r/rust/top.json?limit=25&t=day");
    }

    fn client_with_bases(web: &str, oauth: &str) -> RedditClient {
        RedditClient::new(ClientConfig {
            web_base: web.to_string(),
            oauth_base: oauth.to_string(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_thread_json_url_appends_suffix() {
        let client = client_with_bases(DEFAULT_WEB_BASE, DEFAULT_OAUTH_BASE);
        assert_eq!(
            client
                .thread_json_url("https://www.reddit.com/r/rust/comments/abc/hello/")
                .unwrap(),
            "https://www.reddit.com/r/rust/comments/abc/hello.json"
        );
    }

    #[test]
    fn test_thread_json_url_keeps_query() {
        let client = client_with_bases(DEFAULT_WEB_BASE, DEFAULT_OAUTH_BASE);
        assert_eq!(
            client
                .thread_json_url("https://www.reddit.com/r/rust/comments/abc/?context=3")
                .unwrap(),
            "https://www.reddit.com/r/rust/comments/abc.json?context=3"
        );
    }

    #[test]
    fn test_thread_json_url_uses_oauth_origin_when_authenticated() {
        let client = client_with_bases(DEFAULT_WEB_BASE, DEFAULT_OAUTH_BASE)
            .with_access_token(Some("tok".to_string()));
        assert_eq!(
            client
                .thread_json_url("https://www.reddit.com/r/rust/comments/abc/")
                .unwrap(),
            "https://oauth.reddit.com/r/rust/comments/abc.json"
        );
    }

    #[test]
    fn test_empty_access_token_is_ignored() {
        let client = client_with_bases(DEFAULT_WEB_BASE, DEFAULT_OAUTH_BASE)
            .with_access_token(Some(String::new()));
        assert_eq!(client.api_base(), DEFAULT_WEB_BASE);
    }

    #[test]
    fn test_debug_hides_token() {
        let client = client_with_bases(DEFAULT_WEB_BASE, DEFAULT_OAUTH_BASE)
            .with_access_token(Some("secret".to_string()));
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("authenticated: true"));
    }

    #[tokio::test]
    async fn test_fetch_listing_rejects_zero_limit() {
        let client = client_with_bases(DEFAULT_WEB_BASE, DEFAULT_OAUTH_BASE);
        let request = ListingRequest::new("rust", crate::fetch::Sort::Hot, 0);
        let err = client.fetch_listing(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
    }
}
