//! Forum fetching: rate-limited HTTP access and source adapters.
//!
//! # Overview
//!
//! - [`RedditClient`] - HTTP client with bounded 429 retries and quota tracking
//! - [`adaptive_delay`] - Pause derived from the last response's quota headers
//! - [`listing`] - JSON listing adapter ([`RawPost`] → [`crate::store::NewPost`])
//! - [`feed`] - Atom feed adapter
//!
//! # Example
//!
//! ```no_run
//! use threadcast_core::fetch::{ClientConfig, ListingRequest, RedditClient, Sort};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RedditClient::new(ClientConfig::default())?;
//! let listing = client.fetch_listing(&ListingRequest::new("rust", Sort::Hot, 25)).await?;
//! println!("{} posts", listing.posts.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod feed;
pub mod listing;
mod rate_limit;

pub use client::{
    ClientConfig, DEFAULT_OAUTH_BASE, DEFAULT_USER_AGENT, DEFAULT_WEB_BASE, FeedPage, Fetched,
    Listing, MAX_PAGE_SIZE, RateLimitWait, RedditClient, Replies, WaitObserver,
};
pub use error::FetchError;
pub use listing::{ListingRequest, RawPost, Sort, TimeFilter, normalize_subreddit};
pub use rate_limit::{
    DEFAULT_MAX_RETRIES, RateLimitSnapshot, RetryPolicy, adaptive_delay, parse_retry_after,
};
