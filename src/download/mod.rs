//! Concurrent, rate-limited wallpaper downloads.
//!
//! - [`RateLimiter`]: process-wide sliding-window gate for outbound requests
//! - [`FileSink`]: one atomic download-to-disk with skip-if-exists
//! - [`DownloadScheduler`]: bounded fan-out of a [`JobPlan`] through the sink
//! - [`RetryPolicy`]: exponential backoff for transient and throttled failures

pub mod constants;
mod error;
pub mod filename;
mod job;
pub mod rate_limiter;
mod retry;
mod scheduler;
mod sink;

pub use error::DownloadError;
pub use job::{DownloadJob, DownloadResult, DownloadStatus, JobPlan};
pub use rate_limiter::{RateLimiter, parse_retry_after};
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};
pub use scheduler::{
    DEFAULT_WORKERS, DownloadScheduler, FailureRecord, RunStats, RunSummary, SchedulerError,
};
pub use sink::FileSink;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
