//! Constants for the download module (timeouts, rate limiting, layout).

use std::time::Duration;

/// HTTP connect timeout for image downloads (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP read timeout for image downloads (5 minutes for large originals).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Warning threshold for cumulative rate limit delay (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// How often waits re-check the interrupt flag.
pub const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Suffix appended to the destination file while bytes are in flight.
pub const PARTIAL_SUFFIX: &str = "part";

/// Directory name used for a user's uploads.
pub const UPLOADS_DIR: &str = "uploads";

/// Extension used when neither the URL nor the MIME type yields one.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Worker counts above this still run but are logged as likely to be throttled.
pub const RECOMMENDED_MAX_WORKERS: usize = 6;
