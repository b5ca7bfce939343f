//! Error types for wallhaven API requests.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`WallhavenClient`](super::WallhavenClient).
///
/// The client never retries on its own; callers decide what to do with a
/// [`ApiError::TooManyRequests`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP status other than 429.
    #[error("HTTP {status_code} from {endpoint}")]
    Status {
        /// The HTTP status code.
        status_code: u16,
        /// Endpoint path that was requested.
        endpoint: String,
    },

    /// The API asked us to slow down (HTTP 429).
    #[error("rate limited by {endpoint}{}", retry_hint(.retry_after))]
    TooManyRequests {
        /// Endpoint path that was requested.
        endpoint: String,
        /// Parsed `Retry-After` header, if present.
        retry_after: Option<Duration>,
    },

    /// Transport-level failure (DNS, connection refused, TLS, timeout).
    #[error("network error requesting {endpoint}: {source}")]
    Network {
        /// Endpoint path that was requested.
        endpoint: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Response body was not the JSON shape we expected.
    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        /// Endpoint path that was requested.
        endpoint: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A URL could not be built from the base URL and path.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

#[allow(clippy::ref_option)]
fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|delay| format!(" (retry after {}s)", delay.as_secs()))
        .unwrap_or_default()
}

impl ApiError {
    /// Creates a status error.
    pub fn status(endpoint: impl Into<String>, status_code: u16) -> Self {
        Self::Status {
            status_code,
            endpoint: endpoint.into(),
        }
    }

    /// Creates a rate-limit error.
    pub fn too_many_requests(endpoint: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::TooManyRequests {
            endpoint: endpoint.into(),
            retry_after,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a decode error.
    pub fn decode(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// HTTP status carried by this error, if any (429 included).
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            Self::TooManyRequests { .. } => Some(429),
            Self::Network { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Decode { .. } | Self::InvalidUrl { .. } => None,
        }
    }

    /// Returns true for 401/403, i.e. a missing or rejected API key.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status_code(), Some(401 | 403))
    }
}
