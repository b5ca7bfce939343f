//! Client for the wallhaven.cc REST API (v1).
//!
//! [`WallhavenClient`] issues metadata requests (collection listings, uploads
//! search, wallpaper detail). Every request first passes through the shared
//! [`RateLimiter`]. Listings are exposed as lazy page cursors
//! ([`CollectionPages`], [`WallpaperPages`]) that fetch one page per call and
//! can be restarted from the first page.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wallhaven_core::api::{SearchFilter, WallhavenClient, WallpaperSource};
//! use wallhaven_core::download::RateLimiter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WallhavenClient::new(Arc::new(RateLimiter::per_second(1)), None);
//! let collections = client.list_collections("alice").collect_all().await?;
//! for collection in collections {
//!     let source = WallpaperSource::Collection { id: collection.id, name: collection.label };
//!     let wallpapers = client
//!         .list_wallpapers("alice", source, &SearchFilter::default())
//!         .collect_all()
//!         .await?;
//!     println!("{} wallpapers", wallpapers.len());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

pub use error::ApiError;
pub use types::{Category, CollectionInfo, Purity, SearchFilter, WallpaperDescriptor};

use crate::download::{RateLimiter, parse_retry_after};
use crate::user_agent;
use types::{DetailResponse, ListResponse, WallpaperRecord};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://wallhaven.cc/api/v1";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Connect timeout for metadata requests.
const API_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall timeout for metadata requests.
const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a user's wallpapers are listed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WallpaperSource {
    /// A named collection.
    Collection {
        /// Collection id.
        id: u64,
        /// Collection label, attached to every descriptor.
        name: String,
    },
    /// Everything the user has uploaded.
    Uploads,
}

/// Async client for the wallhaven API.
///
/// Cheap to clone: the underlying `reqwest::Client` and limiter are shared.
#[derive(Debug, Clone)]
pub struct WallhavenClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limiter: Arc<RateLimiter>,
}

#[derive(Debug, Deserialize)]
struct WallpaperDetail {
    path: String,
}

impl WallhavenClient {
    /// Creates a client for the production API.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(limiter: Arc<RateLimiter>, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(API_CONNECT_TIMEOUT)
            .timeout(API_REQUEST_TIMEOUT)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            limiter,
        }
    }

    /// Points the client at a different API root (used with mock servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the API root in use.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether an API key will be sent.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Limiter shared by this client.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Lazily lists the collections owned by `username`.
    #[must_use]
    pub fn list_collections(&self, username: &str) -> CollectionPages {
        CollectionPages {
            client: self.clone(),
            cursor: PageCursor::new(
                format!("/collections/{}", urlencoding::encode(username)),
                Vec::new(),
            ),
        }
    }

    /// Fetches every collection of `username` in one call.
    ///
    /// # Errors
    ///
    /// Returns the first [`ApiError`] hit while paging.
    #[instrument(skip(self))]
    pub async fn get_collection_info(
        &self,
        username: &str,
    ) -> Result<Vec<CollectionInfo>, ApiError> {
        self.list_collections(username).collect_all().await
    }

    /// Lazily lists the wallpapers of a collection or of the user's uploads,
    /// keeping only those accepted by `filter`.
    #[must_use]
    pub fn list_wallpapers(
        &self,
        username: &str,
        source: WallpaperSource,
        filter: &SearchFilter,
    ) -> WallpaperPages {
        let user = urlencoding::encode(username);
        let (endpoint, query, collection_name) = match source {
            WallpaperSource::Collection { id, name } => (
                format!("/collections/{user}/{id}"),
                vec![("purity", filter.purity_param())],
                Some(name),
            ),
            WallpaperSource::Uploads => (
                "/search".to_string(),
                vec![
                    ("q", format!("@{username}")),
                    ("purity", filter.purity_param()),
                    ("categories", filter.categories_param()),
                ],
                None,
            ),
        };
        WallpaperPages {
            client: self.clone(),
            cursor: PageCursor::new(endpoint, query),
            filter: filter.clone(),
            collection_name,
        }
    }

    /// Resolves the full-resolution image URL of a wallpaper.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] for non-success responses (401 when the
    /// wallpaper needs an API key), [`ApiError::Decode`] when the response has
    /// no `path`.
    #[instrument(skip(self))]
    pub async fn get_download_url(&self, wallpaper_id: &str) -> Result<String, ApiError> {
        let endpoint = format!("/w/{}", urlencoding::encode(wallpaper_id));
        let detail: DetailResponse<WallpaperDetail> = self.get_json(&endpoint, &[]).await?;
        Ok(detail.data.path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let raw = format!("{}{endpoint}", self.base_url);
        let mut url = url::Url::parse(&raw).map_err(|_| ApiError::invalid_url(&raw))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        self.limiter.acquire().await;

        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        debug!(endpoint, ?query, "requesting");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(endpoint, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(ApiError::too_many_requests(endpoint, retry_after));
        }
        if !status.is_success() {
            return Err(ApiError::status(endpoint, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(endpoint, e))?;
        serde_json::from_str(&body).map_err(|e| ApiError::decode(endpoint, e))
    }
}

/// Page position shared by both cursor types.
#[derive(Debug, Clone)]
struct PageCursor {
    endpoint: String,
    query: Vec<(&'static str, String)>,
    next_page: Option<u32>,
}

impl PageCursor {
    fn new(endpoint: String, query: Vec<(&'static str, String)>) -> Self {
        Self {
            endpoint,
            query,
            next_page: Some(1),
        }
    }

    /// Fetches the next page. On error the position is unchanged, so the
    /// same page is requested again on the next call.
    async fn fetch<T: DeserializeOwned>(
        &mut self,
        client: &WallhavenClient,
    ) -> Result<Option<Vec<T>>, ApiError> {
        let Some(page) = self.next_page else {
            return Ok(None);
        };

        let mut query = self.query.clone();
        query.push(("page", page.to_string()));
        let response: ListResponse<T> = client.get_json(&self.endpoint, &query).await?;

        // No meta block means the endpoint is not paginated.
        self.next_page = match response.meta {
            Some(meta) if page < meta.last_page && !response.data.is_empty() => Some(page + 1),
            _ => None,
        };
        debug!(
            endpoint = %self.endpoint,
            page,
            items = response.data.len(),
            last_page = response.meta.map(|m| m.last_page),
            "fetched page"
        );
        Ok(Some(response.data))
    }

    fn restart(&mut self) {
        self.next_page = Some(1);
    }
}

/// Lazy cursor over a user's collections.
#[derive(Debug, Clone)]
pub struct CollectionPages {
    client: WallhavenClient,
    cursor: PageCursor,
}

impl CollectionPages {
    /// Fetches the next page, or `None` once the listing is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the failed request.
    #[instrument(skip(self), fields(endpoint = %self.cursor.endpoint))]
    pub async fn next_page(&mut self) -> Result<Option<Vec<CollectionInfo>>, ApiError> {
        self.cursor.fetch(&self.client).await
    }

    /// Rewinds to the first page.
    pub fn restart(&mut self) {
        self.cursor.restart();
    }

    /// Drains every remaining page.
    ///
    /// # Errors
    ///
    /// Returns the first [`ApiError`] encountered.
    pub async fn collect_all(mut self) -> Result<Vec<CollectionInfo>, ApiError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

/// Lazy cursor over filtered wallpaper descriptors.
#[derive(Debug, Clone)]
pub struct WallpaperPages {
    client: WallhavenClient,
    cursor: PageCursor,
    filter: SearchFilter,
    collection_name: Option<String>,
}

impl WallpaperPages {
    /// Fetches the next page, dropping descriptors the filter rejects.
    ///
    /// A page whose every entry was filtered out yields `Some(vec![])`;
    /// only an exhausted listing yields `None`.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the failed request.
    #[instrument(skip(self), fields(endpoint = %self.cursor.endpoint))]
    pub async fn next_page(&mut self) -> Result<Option<Vec<WallpaperDescriptor>>, ApiError> {
        let Some(records) = self.cursor.fetch::<WallpaperRecord>(&self.client).await? else {
            return Ok(None);
        };
        let total = records.len();
        let kept: Vec<WallpaperDescriptor> = records
            .into_iter()
            .map(|record| WallpaperDescriptor::from_record(record, self.collection_name.as_deref()))
            .filter(|descriptor| self.filter.accepts(descriptor))
            .collect();
        if kept.len() < total {
            debug!(dropped = total - kept.len(), "filtered wallpapers");
        }
        Ok(Some(kept))
    }

    /// Rewinds to the first page.
    pub fn restart(&mut self) {
        self.cursor.restart();
    }

    /// Drains every remaining page, preserving upstream order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ApiError`] encountered.
    pub async fn collect_all(mut self) -> Result<Vec<WallpaperDescriptor>, ApiError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}
