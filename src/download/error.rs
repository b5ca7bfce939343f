//! Error types for the download module.
//!
//! This module defines structured errors for a single wallpaper download.
//! They stay local to one job: the scheduler classifies them for retry and
//! finally records them as the job's failure reason.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur while saving one wallpaper to disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Parsed Retry-After delay, if present (for 429 responses).
        retry_after: Option<Duration>,
    },

    /// File system error during download (create dir, write, rename, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The source URL is malformed or empty.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Downloaded byte count does not match the server's Content-Length.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// Resolving the image URL through the API failed.
    #[error("could not resolve download URL for {wallpaper_id}: {source}")]
    Api {
        /// Wallpaper whose detail lookup failed.
        wallpaper_id: String,
        /// The underlying API error.
        #[source]
        source: ApiError,
    },

    /// The run was interrupted while this file was in flight.
    #[error("interrupted while downloading {path}")]
    Interrupted {
        /// Destination that was being written.
        path: PathBuf,
    },
}

impl DownloadError {
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
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a parsed Retry-After delay.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates an API lookup error.
    pub fn api(wallpaper_id: impl Into<String>, source: ApiError) -> Self {
        Self::Api {
            wallpaper_id: wallpaper_id.into(),
            source,
        }
    }

    /// Creates an interruption error.
    pub fn interrupted(path: impl Into<PathBuf>) -> Self {
        Self::Interrupted { path: path.into() }
    }

    /// Server-mandated delay carried by a 429, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HttpStatus { retry_after, .. } => *retry_after,
            Self::Api {
                source: ApiError::TooManyRequests { retry_after, .. },
                ..
            } => *retry_after,
            _ => None,
        }
    }
}
