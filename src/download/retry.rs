//! Retry logic with exponential backoff for transient download failures.
//!
//! When a save fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - Temporary failures that may succeed on retry
//! - [`FailureType::Permanent`] - Failures that won't succeed regardless of retries
//! - [`FailureType::NeedsAuth`] - 401/403, usually a missing or invalid API key
//! - [`FailureType::RateLimited`] - HTTP 429 (retries, honouring Retry-After)
//!
//! The [`RetryPolicy`] then decides whether to retry based on failure type and
//! attempt count, calculating exponential backoff delays with jitter.
//!
//! # Example
//!
//! ```
//! use wallhaven_core::download::{
//!     DownloadError, RetryPolicy, RetryDecision, classify_error
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://w.wallhaven.cc/full/ab/x.jpg", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::DownloadError;
use crate::api::ApiError;

/// Default maximum attempts (including the first one).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms, never more than the base delay).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of download failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, 5xx server errors, connection refused.
    Transient,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, invalid URL, local IO error, interruption.
    Permanent,

    /// The API key is missing or was rejected.
    NeedsAuth,

    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the download after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the download.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// With defaults, delays are approximately 1s then 2s before the third and
/// final attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt.
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom attempt count and base delay
    /// (`--retries` / `--backoff-ms`), using defaults for the rest.
    #[must_use]
    pub fn with_backoff(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_backoff(1, Duration::ZERO)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the base backoff delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Determines whether to retry after attempt number `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "authentication required - check the API key".to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);

        // attempt 1 = 1x base
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let max_ms = MAX_JITTER.min(self.base_delay).as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=max_ms);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 401/403 | NeedsAuth |
/// | HTTP 429 | RateLimited |
/// | HTTP 408, 5xx | Transient |
/// | other HTTP 4xx | Permanent |
/// | Timeout, Network | Transient (TLS errors Permanent) |
/// | Integrity | Transient (truncated transfer) |
/// | IO, InvalidUrl, Interrupted | Permanent |
/// | Api | by the API error's status |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),
        DownloadError::Timeout { .. } | DownloadError::Integrity { .. } => FailureType::Transient,
        DownloadError::Network { source, .. } => classify_network(source),
        DownloadError::Api { source, .. } => classify_api_error(source),
        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::Interrupted { .. } => FailureType::Permanent,
    }
}

fn classify_api_error(error: &ApiError) -> FailureType {
    match error {
        ApiError::TooManyRequests { .. } => FailureType::RateLimited,
        ApiError::Status { status_code, .. } => classify_http_status(*status_code),
        ApiError::Network { source, .. } => classify_network(source),
        ApiError::Decode { .. } | ApiError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

fn classify_network(error: &reqwest::Error) -> FailureType {
    if is_tls_error(error) {
        FailureType::Permanent
    } else {
        FailureType::Transient
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 => FailureType::NeedsAuth,
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://w.wallhaven.cc/full/94/wallhaven-94x38z.jpg";

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
        assert!((policy.backoff_multiplier - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_retry_policy_with_backoff() {
        let policy = RetryPolicy::with_backoff(5, Duration::from_millis(250));
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.base_delay(), Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::with_backoff(0, DEFAULT_BASE_DELAY).max_attempts(), 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts(), 1);
    }

    // ==================== Delay Calculation Tests ====================

    #[test]
    fn test_delay_calculation_grows_exponentially() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(32), 2.0);

        let first = policy.calculate_delay(1);
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1500));

        let second = policy.calculate_delay(2);
        assert!(second >= Duration::from_secs(2) && second <= Duration::from_millis(2500));

        let third = policy.calculate_delay(3);
        assert!(third >= Duration::from_secs(4) && third <= Duration::from_millis(4500));
    }

    #[test]
    fn test_delay_calculation_respects_max_delay() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        let delay = policy.calculate_delay(6);
        assert!(delay >= Duration::from_secs(5));
        assert!(delay <= Duration::from_millis(5500));
    }

    #[test]
    fn test_zero_base_delay_has_no_jitter() {
        let policy = RetryPolicy::with_backoff(3, Duration::ZERO);
        for attempt in 1..3 {
            assert_eq!(policy.calculate_delay(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn test_jitter_bounded_by_base_delay() {
        let policy = RetryPolicy::with_backoff(3, Duration::from_millis(20));
        for _ in 0..100 {
            assert!(policy.calculate_jitter() <= Duration::from_millis(20));
        }
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            assert!(policy.calculate_jitter() <= MAX_JITTER);
        }
    }

    // ==================== Error Classification Tests ====================

    #[test]
    fn test_classify_http_statuses() {
        let cases = [
            (400, FailureType::Permanent),
            (401, FailureType::NeedsAuth),
            (403, FailureType::NeedsAuth),
            (404, FailureType::Permanent),
            (408, FailureType::Transient),
            (429, FailureType::RateLimited),
            (500, FailureType::Transient),
            (503, FailureType::Transient),
            (302, FailureType::Permanent),
        ];
        for (status, expected) in cases {
            let error = DownloadError::http_status(URL, status);
            assert_eq!(classify_error(&error), expected, "status {status}");
        }
    }

    #[test]
    fn test_classify_local_failures_permanent() {
        let io = std::io::Error::other("disk full");
        assert_eq!(
            classify_error(&DownloadError::io("/tmp/a.jpg", io)),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&DownloadError::invalid_url("")),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&DownloadError::interrupted("/tmp/a.jpg")),
            FailureType::Permanent
        );
    }

    #[test]
    fn test_classify_timeout_and_integrity_transient() {
        assert_eq!(classify_error(&DownloadError::timeout(URL)), FailureType::Transient);
        assert_eq!(
            classify_error(&DownloadError::integrity("/tmp/a.jpg", 10, 4)),
            FailureType::Transient
        );
    }

    #[test]
    fn test_classify_api_errors() {
        let unauthorized = DownloadError::api("abc", ApiError::status("/w/abc", 401));
        assert_eq!(classify_error(&unauthorized), FailureType::NeedsAuth);

        let throttled = DownloadError::api("abc", ApiError::too_many_requests("/w/abc", None));
        assert_eq!(classify_error(&throttled), FailureType::RateLimited);

        let server = DownloadError::api("abc", ApiError::status("/w/abc", 502));
        assert_eq!(classify_error(&server), FailureType::Transient);
    }

    // ==================== Should Retry Decision Tests ====================

    #[test]
    fn test_should_retry_permanent_and_auth_do_not_retry() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureType::Permanent, 1);
        assert!(matches!(decision, RetryDecision::DoNotRetry { ref reason } if reason.contains("permanent")));

        let decision = policy.should_retry(FailureType::NeedsAuth, 1);
        assert!(matches!(decision, RetryDecision::DoNotRetry { ref reason } if reason.contains("API key")));
    }

    #[test]
    fn test_should_retry_transient_and_rate_limited_retry() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::RateLimited, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::with_backoff(3, Duration::ZERO);

        assert!(matches!(policy.should_retry(FailureType::Transient, 1), RetryDecision::Retry { .. }));
        assert!(matches!(policy.should_retry(FailureType::Transient, 2), RetryDecision::Retry { .. }));

        let decision = policy.should_retry(FailureType::Transient, 3);
        assert!(matches!(decision, RetryDecision::DoNotRetry { ref reason } if reason.contains("exhausted")));
    }
}
