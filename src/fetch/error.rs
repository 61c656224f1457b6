//! Error types for the fetch module.

use thiserror::Error;

/// Errors that can occur while fetching from the forum API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP response other than an exhausted 429.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server kept answering 429 after every allowed retry.
    #[error(
        "rate limited fetching {url} after {attempts} attempts\n  Suggestion: wait a few minutes and try again"
    )]
    RateLimitExhausted {
        /// The URL that was rate limited.
        url: String,
        /// Total attempts made.
        attempts: u32,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// The URL whose body could not be decoded.
        url: String,
        /// What was wrong with it.
        message: String,
    },

    /// The requested listing parameters are not valid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RateLimitExhausted { .. } => Some(429),
            Self::Network { .. }
            | Self::Decode { .. }
            | Self::InvalidRequest(_)
            | Self::ClientBuild(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_http_status_display() {
        let error = FetchError::http_status("https://www.reddit.com/r/rust/hot.json", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("/r/rust/hot.json"));
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_fetch_error_rate_limit_exhausted_display() {
        let error = FetchError::RateLimitExhausted {
            url: "https://www.reddit.com/r/rust/hot.json".to_string(),
            attempts: 3,
        };
        let msg = error.to_string();
        assert!(msg.contains("rate limited"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("Suggestion"));
        assert_eq!(error.status(), Some(429));
    }

    #[test]
    fn test_fetch_error_decode_display() {
        let error = FetchError::decode("https://x", "missing data.children");
        assert!(error.to_string().contains("missing data.children"));
        assert_eq!(error.status(), None);
    }
}
