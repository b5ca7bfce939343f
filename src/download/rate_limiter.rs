//! Process-wide rate limiting for outbound wallhaven requests.
//!
//! This module provides the [`RateLimiter`] struct, a sliding-window gate
//! shared by every worker. Metadata calls and image downloads both pass
//! through the same limiter, so the configured ceiling holds for the whole
//! process no matter how many workers are running.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wallhaven_core::download::RateLimiter;
//!
//! # async fn example() {
//! // At most 2 requests in any 1 second window
//! let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
//!
//! limiter.acquire().await; // immediate
//! limiter.acquire().await; // immediate
//! limiter.acquire().await; // waits until the first admission leaves the window
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Sliding-window rate limiter shared across all workers.
///
/// Wrap it in `Arc` and hand clones to the API client, the file sink and the
/// scheduler. Acquisitions are serialized through a `tokio::sync::Mutex`
/// which is held while a caller sleeps, so waiting callers are admitted one
/// at a time. Fairness between callers is not guaranteed.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum admissions per window.
    max_requests: usize,

    /// Length of the sliding window.
    window: Duration,

    /// Whether rate limiting is disabled (for `--limit 0`).
    disabled: bool,

    state: Mutex<WindowState>,

    /// Total time callers have spent waiting (in milliseconds).
    cumulative_delay_ms: AtomicU64,
}

#[derive(Debug, Default)]
struct WindowState {
    /// Admission times still inside the window, oldest first.
    admitted: VecDeque<Instant>,

    /// Server-mandated pause (from `Retry-After`).
    paused_until: Option<Instant>,
}

impl WindowState {
    fn evict_expired(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if oldest + window <= now {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RateLimiter {
    /// Creates a limiter admitting at most `max_requests` per `window`.
    ///
    /// A `max_requests` of zero yields a disabled limiter.
    #[must_use]
    #[instrument(skip_all, fields(max_requests, window_ms = window.as_millis()))]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        if max_requests == 0 || window.is_zero() {
            return Self::disabled();
        }
        debug!(max_requests, "creating rate limiter");
        Self {
            max_requests: max_requests as usize,
            window,
            disabled: false,
            state: Mutex::new(WindowState::default()),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a limiter admitting `limit` requests per second (`0` disables).
    #[must_use]
    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    /// Creates a disabled rate limiter that applies no delays.
    ///
    /// Use this when `--limit 0` is specified.
    #[must_use]
    #[instrument]
    pub fn disabled() -> Self {
        debug!("creating disabled rate limiter");
        Self {
            max_requests: 0,
            window: Duration::ZERO,
            disabled: true,
            state: Mutex::new(WindowState::default()),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Maximum admissions per window (0 when disabled).
    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Length of the sliding window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Total delay imposed on callers so far.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Suspends the caller until one more request fits in the window, then
    /// counts it. Never fails.
    ///
    /// The internal lock is released while sleeping, so dropping the future
    /// mid-wait is safe and [`RateLimiter::pause_for`] never queues behind a
    /// sleeping caller.
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        if self.disabled {
            return;
        }

        loop {
            let delay = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                match state.paused_until {
                    Some(until) if until > now => {
                        let delay = until - now;
                        debug!(delay_ms = delay.as_millis(), "honouring server pause");
                        delay
                    }
                    _ => {
                        state.paused_until = None;
                        state.evict_expired(now, self.window);
                        if state.admitted.len() < self.max_requests {
                            state.admitted.push_back(now);
                            return;
                        }

                        // Window is full; wait for the oldest admission to expire.
                        let Some(&oldest) = state.admitted.front() else {
                            continue;
                        };
                        let delay = (oldest + self.window).saturating_duration_since(now);
                        debug!(
                            delay_ms = delay.as_millis(),
                            in_window = state.admitted.len(),
                            "applying rate limit delay"
                        );
                        delay
                    }
                }
            };

            self.record_delay(delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Records a server-mandated pause (from a `Retry-After` header).
    ///
    /// Subsequent acquisitions wait until the pause has elapsed. A shorter
    /// pause never shortens one already in effect.
    #[instrument(skip(self), fields(delay_ms = delay.as_millis()))]
    pub async fn pause_for(&self, delay: Duration) {
        if self.disabled {
            return;
        }
        let delay = delay.min(MAX_RETRY_AFTER);
        let until = Instant::now() + delay;
        let mut state = self.state.lock().await;
        state.paused_until = Some(state.paused_until.map_or(until, |current| current.max(until)));
        debug!("recorded server rate limit");
    }

    #[allow(clippy::cast_possible_truncation)]
    fn record_delay(&self, delay: Duration) {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        let total = Duration::from_millis(total);
        let previous = total.saturating_sub(delay);

        // Warn once, when the threshold is first crossed.
        if previous < CUMULATIVE_DELAY_WARNING_THRESHOLD
            && total >= CUMULATIVE_DELAY_WARNING_THRESHOLD
        {
            warn!(
                cumulative_delay_secs = total.as_secs(),
                "excessive rate limiting - consider raising --limit or reducing workers"
            );
        }
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wallhaven_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        match datetime.duration_since(std::time::SystemTime::now()) {
            Ok(duration) if duration > MAX_RETRY_AFTER => {
                warn!(
                    delay_secs = duration.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                Some(MAX_RETRY_AFTER)
            }
            Ok(duration) => Some(duration),
            Err(_) => {
                debug!(header_value, "Retry-After date is in the past, returning zero");
                Some(Duration::ZERO)
            }
        }
    } else {
        debug!(header_value, "unparseable Retry-After value");
        None
    }
}
