//! Rate-limit header handling, adaptive pacing and 429 retry policy.
//!
//! Reddit reports its quota through `X-Ratelimit-Remaining` and
//! `X-Ratelimit-Reset`. [`adaptive_delay`] turns the last observed values
//! into a pause before the next request, and [`RetryPolicy`] drives the
//! bounded retry loop on HTTP 429.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{debug, warn};

/// Remaining-request count assumed when the header is absent.
pub const DEFAULT_REMAINING: f64 = 100.0;

/// Reset window (seconds) assumed when the header is absent.
pub const DEFAULT_RESET_SECS: f64 = 60.0;

/// Below this many remaining requests, wait for the full reset window.
const CRITICAL_REMAINING: f64 = 5.0;

/// Below this many remaining requests, double the base delay.
const LOW_REMAINING: f64 = 20.0;

/// Default maximum retries after a 429.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff used when the server gives no reset hint.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on any server-provided wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Quota information read from the last response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimitSnapshot {
    /// Requests left in the current window.
    pub remaining: Option<f64>,
    /// Seconds until the window resets.
    pub reset_secs: Option<f64>,
    /// Standard `Retry-After` hint, if any.
    pub retry_after: Option<Duration>,
}

impl RateLimitSnapshot {
    /// Reads the quota headers of a response.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_f64(headers, "x-ratelimit-remaining"),
            reset_secs: header_f64(headers, "x-ratelimit-reset"),
            retry_after: headers
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after),
        }
    }

    #[must_use]
    pub fn remaining_or_default(&self) -> f64 {
        self.remaining.unwrap_or(DEFAULT_REMAINING)
    }

    #[must_use]
    pub fn reset_or_default(&self) -> f64 {
        self.reset_secs.unwrap_or(DEFAULT_RESET_SECS)
    }

    /// Server hint for how long to back off, preferring the Reddit header.
    #[must_use]
    pub fn reset_hint(&self) -> Option<Duration> {
        self.reset_secs
            .map(secs_to_duration)
            .or(self.retry_after)
            .map(|hint| hint.min(MAX_RETRY_AFTER))
    }
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    let raw = headers.get(name)?.to_str().ok()?;
    let value = raw.trim().parse::<f64>().ok()?;
    if value.is_finite() { Some(value) } else { None }
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(MAX_RETRY_AFTER)
}

/// Computes the pause before the next request from the last response's quota.
///
/// - fewer than 5 requests remaining: wait the whole reset window
/// - fewer than 20 remaining: twice the base delay
/// - otherwise: the base delay
///
/// A missing snapshot behaves like a response without quota headers.
#[must_use]
pub fn adaptive_delay(snapshot: Option<&RateLimitSnapshot>, base: Duration) -> Duration {
    let snapshot = snapshot.copied().unwrap_or_default();
    let remaining = snapshot.remaining_or_default();

    let delay = if remaining < CRITICAL_REMAINING {
        secs_to_duration(snapshot.reset_or_default()).min(MAX_RETRY_AFTER)
    } else if remaining < LOW_REMAINING {
        base * 2
    } else {
        base
    };

    debug!(remaining, delay_ms = delay.as_millis(), "Adaptive delay");
    delay
}

/// Bounded retry behavior for HTTP 429 responses.
///
/// With `max_retries = R` a request is attempted at most `R + 1` times.
/// Each wait lasts `max(server reset hint, backoff)`; the backoff starts at
/// one second and doubles per retry. Waits are counted down in ticks of
/// `tick` (one second in production) so progress can be reported per tick.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    tick: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            tick: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a custom retry count, other settings default.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Overrides the real duration of one countdown step.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// How long to wait after a 429, given the current backoff.
    #[must_use]
    pub fn wait_for(&self, snapshot: &RateLimitSnapshot, backoff: Duration) -> Duration {
        snapshot.reset_hint().unwrap_or(backoff).max(backoff)
    }
}

/// Whole countdown steps needed to cover `wait`, rounding partial seconds up.
#[must_use]
pub fn countdown_steps(wait: Duration) -> u64 {
    let secs = wait.as_secs();
    if wait.subsec_nanos() > 0 { secs + 1 } else { secs }
}

/// Sleeps for `steps` ticks, reporting the seconds left before each tick.
pub async fn countdown(steps: u64, tick: Duration, mut on_tick: impl FnMut(u64)) {
    for remaining in (1..=steps).rev() {
        on_tick(remaining);
        tokio::time::sleep(tick).await;
    }
}

/// Parses a `Retry-After` header value (integer seconds or HTTP-date).
///
/// Values are capped at one hour; negative or unparseable values yield `None`.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        let duration = Duration::from_secs(seconds);
        if duration > MAX_RETRY_AFTER {
            warn!(seconds, "Retry-After exceeds maximum, capping at 1 hour");
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        return match datetime.duration_since(std::time::SystemTime::now()) {
            Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
            Err(_) => Some(Duration::ZERO),
        };
    }

    debug!(header_value, "unparseable Retry-After value");
    None
}
