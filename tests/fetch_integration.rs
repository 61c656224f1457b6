//! Integration tests for the rate-limited fetcher.
//!
//! Exercises retries, listings and reply fetching against a mock server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use threadcast_core::fetch::{
    ClientConfig, FetchError, ListingRequest, RateLimitWait, RedditClient, RetryPolicy, Sort,
    TimeFilter,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fixtures;
use support::socket_guard::start_mock_server_or_skip;

fn client_for(base: &str, max_retries: u32) -> RedditClient {
    RedditClient::new(ClientConfig {
        web_base: base.to_string(),
        oauth_base: format!("{base}/oauth"),
        retry: RetryPolicy::with_max_retries(max_retries).with_tick(Duration::from_millis(1)),
        ..ClientConfig::default()
    })
    .unwrap()
}

// ==================== Rate Limit Tests ====================

#[tokio::test]
async fn test_429_exhausts_after_max_retries_with_full_countdown() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/r/rust/hot.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("x-ratelimit-reset", "5"))
        .expect(3)
        .mount(&server)
        .await;

    let ticks = Arc::new(AtomicU64::new(0));
    let first_wait = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let ticks = Arc::clone(&ticks);
        let first_wait = Arc::clone(&first_wait);
        Arc::new(move |wait: &RateLimitWait| {
            ticks.fetch_add(1, Ordering::SeqCst);
            if wait.attempt == 1 {
                first_wait.lock().unwrap().push(wait.seconds_left);
            }
        })
    };
    let client = client_for(&server.uri(), 2).with_wait_observer(observer);

    let result = client
        .fetch_listing(&ListingRequest::new("rust", Sort::Hot, 10))
        .await;

    assert!(matches!(
        result,
        Err(FetchError::RateLimitExhausted { attempts: 3, .. })
    ));
    // Two waits of max(reset 5s, backoff 1s/2s) = 5 countdown steps each.
    assert_eq!(ticks.load(Ordering::SeqCst), 10);
    assert_eq!(*first_wait.lock().unwrap(), vec![5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn test_429_then_success_returns_listing() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/r/rust/new.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/rust/new.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "42")
                .set_body_json(fixtures::listing("rust", &[("a1", 5), ("a2", 9)], None)),
        )
        .mount(&server)
        .await;

    let listing = client_for(&server.uri(), 3)
        .fetch_listing(&ListingRequest::new("rust", Sort::New, 10))
        .await
        .unwrap();

    assert_eq!(listing.posts.len(), 2);
    assert_eq!(listing.rate_limit.remaining, Some(42.0));
}

#[tokio::test]
async fn test_non_429_error_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/r/private/hot.json"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server.uri(), 3)
        .fetch_listing(&ListingRequest::new("private", Sort::Hot, 10))
        .await;

    assert_eq!(result.unwrap_err().status(), Some(403));
}

// ==================== Listing Tests ====================

#[tokio::test]
async fn test_top_listing_sends_time_filter() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/r/rust/top.json"))
        .and(query_param("t", "week"))
        .and(query_param("limit", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::listing("rust", &[("t1", 100)], None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = ListingRequest::new("rust", Sort::Top, 3).with_time_filter(TimeFilter::Week);
    let listing = client_for(&server.uri(), 0)
        .fetch_listing(&request)
        .await
        .unwrap();

    assert_eq!(listing.posts[0].id, "t1");
}

#[tokio::test]
async fn test_listing_follows_after_cursor_past_one_page() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let first_page: Vec<(String, i64)> = (0..100).map(|i| (format!("p{i}"), 1)).collect();
    let first_refs: Vec<(&str, i64)> = first_page.iter().map(|(id, s)| (id.as_str(), *s)).collect();
    Mock::given(method("GET"))
        .and(path("/r/rust/hot.json"))
        .and(query_param("after", "t3_p99"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::listing("rust", &[("q0", 1), ("q1", 1)], None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/rust/hot.json"))
        .and(query_param("limit", "100"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::listing("rust", &first_refs, Some("t3_p99"))),
        )
        .mount(&server)
        .await;

    let listing = client_for(&server.uri(), 0)
        .fetch_listing(&ListingRequest::new("rust", Sort::Hot, 101))
        .await
        .unwrap();

    assert_eq!(listing.posts.len(), 101);
    assert_eq!(listing.posts[100].id, "q0");
}

#[tokio::test]
async fn test_authenticated_requests_use_oauth_origin() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/oauth/r/rust/hot.json"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixtures::listing("rust", &[("o1", 1)], None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let listing = client_for(&server.uri(), 0)
        .with_access_token(Some("tok".to_string()))
        .fetch_listing(&ListingRequest::new("rust", Sort::Hot, 5))
        .await
        .unwrap();

    assert_eq!(listing.posts.len(), 1);
}

// ==================== Reply Tests ====================

#[tokio::test]
async fn test_fetch_comments_sorted_and_limited() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/r/rust/comments/a1/slug.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::thread(&[("low", 1), ("high", 50), ("mid", 10)])),
        )
        .mount(&server)
        .await;

    let url = format!("{}/r/rust/comments/a1/slug/", server.uri());
    let replies = client_for(&server.uri(), 0).fetch_comments(&url, 2).await;

    let authors: Vec<&str> = replies.replies.iter().map(|r| r.author.as_str()).collect();
    assert_eq!(authors, vec!["high", "mid"]);
    assert!(replies.rate_limit.is_some());
}

#[tokio::test]
async fn test_fetch_comments_failure_is_soft() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/r/rust/comments/a1/slug.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/r/rust/comments/a1/slug/", server.uri());
    let replies = client_for(&server.uri(), 0).fetch_comments(&url, 5).await;

    assert!(replies.replies.is_empty());
}

#[tokio::test]
async fn test_verify_token_returns_account_name() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/oauth/api/v1/me"))
        .and(header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "ferris"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/api/v1/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    assert_eq!(client.verify_token("good").await.unwrap(), "ferris");
    assert_eq!(client.verify_token("bad").await.unwrap_err().status(), Some(401));
}
