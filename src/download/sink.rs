//! Atomic download of one wallpaper to disk.
//!
//! [`FileSink`] streams the image body into `<destination>.part` and renames
//! it over the destination only after the whole body arrived. The temp file
//! is owned by a drop guard, so it is removed on every exit path: errors,
//! early returns, panics and task cancellation alike. A destination file
//! therefore either does not exist or is complete.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::RETRY_AFTER;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use super::constants::{CONNECT_TIMEOUT_SECS, INTERRUPT_POLL_INTERVAL, READ_TIMEOUT_SECS};
use super::filename::partial_path;
use super::job::{DownloadJob, DownloadResult, DownloadStatus};
use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::DownloadError;
use crate::api::WallhavenClient;
use crate::user_agent;

/// Writes wallpapers to disk, one job per call.
///
/// Cheap to clone; clones share the HTTP client, API client, limiter and
/// interrupt flag.
#[derive(Debug, Clone)]
pub struct FileSink {
    http: reqwest::Client,
    api: WallhavenClient,
    limiter: Arc<RateLimiter>,
    interrupt: Arc<AtomicBool>,
}

impl FileSink {
    /// Creates a sink that shares `api`'s rate limiter.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(api: WallhavenClient) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        let limiter = Arc::clone(api.rate_limiter());
        Self {
            http,
            api,
            limiter,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` to abort in-flight transfers once it is set.
    #[must_use]
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Limiter gating image requests.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Saves one job, folding any error into [`DownloadStatus::Failed`].
    pub async fn save(&self, job: &DownloadJob) -> DownloadResult {
        let status = match self.save_once(job).await {
            Ok(status) => status,
            Err(error) => DownloadStatus::Failed(error.to_string()),
        };
        DownloadResult {
            job: job.clone(),
            status,
        }
    }

    /// Saves one job, returning the typed error for retry classification.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] for API lookup, HTTP, IO, integrity and
    /// interruption failures. No file is left at the destination or temp
    /// path when an error is returned.
    #[instrument(
        skip(self, job),
        fields(id = %job.descriptor().id, dest = %job.destination_file().display())
    )]
    pub async fn save_once(&self, job: &DownloadJob) -> Result<DownloadStatus, DownloadError> {
        let destination = job.destination_file();

        if let Ok(meta) = tokio::fs::metadata(destination).await
            && meta.is_file()
            && meta.len() > 0
        {
            debug!("file exists, skipping");
            return Ok(DownloadStatus::SkippedExists);
        }

        tokio::fs::create_dir_all(job.destination_dir())
            .await
            .map_err(|e| DownloadError::io(job.destination_dir(), e))?;

        if self.is_interrupted() {
            return Err(DownloadError::interrupted(destination));
        }

        let url = self
            .unless_interrupted(self.resolve_source_url(job), destination)
            .await??;
        if url::Url::parse(&url).is_err() {
            return Err(DownloadError::invalid_url(url));
        }

        self.unless_interrupted(self.limiter.acquire(), destination)
            .await?;
        let response = self
            .unless_interrupted(self.send(&url), destination)
            .await??;
        let content_length = response.content_length();

        let temp = PartialFile::new(partial_path(destination));
        let mut file = File::create(temp.path())
            .await
            .map_err(|e| DownloadError::io(temp.path(), e))?;
        let bytes = self
            .stream_to_file(&mut file, response, &url, temp.path(), destination)
            .await?;
        drop(file);

        if let Some(expected) = content_length
            && expected != bytes
        {
            return Err(DownloadError::integrity(destination, expected, bytes));
        }

        tokio::fs::rename(temp.path(), destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        temp.disarm();

        debug!(bytes, "download complete");
        Ok(DownloadStatus::Ok { bytes })
    }

    /// Runs `work` unless the interrupt flag is raised first; the work is
    /// dropped in that case.
    async fn unless_interrupted<F: Future>(
        &self,
        work: F,
        destination: &Path,
    ) -> Result<F::Output, DownloadError> {
        tokio::select! {
            output = work => Ok(output),
            () = wait_for_interrupt(&self.interrupt) => {
                debug!("interrupted while waiting");
                Err(DownloadError::interrupted(destination))
            }
        }
    }

    async fn resolve_source_url(&self, job: &DownloadJob) -> Result<String, DownloadError> {
        let descriptor = job.descriptor();
        if !descriptor.source_url.is_empty() {
            return Ok(descriptor.source_url.clone());
        }
        debug!("listing had no image URL, asking the detail endpoint");
        self.api
            .get_download_url(&descriptor.id)
            .await
            .map_err(|e| DownloadError::api(&descriptor.id, e))
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }
        Ok(response)
    }

    async fn stream_to_file(
        &self,
        file: &mut File,
        response: reqwest::Response,
        url: &str,
        temp_path: &Path,
        destination: &Path,
    ) -> Result<u64, DownloadError> {
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        // A stalled server must not hold an interrupted run open.
        while let Some(chunk_result) = self
            .unless_interrupted(stream.next(), destination)
            .await?
        {
            if self.is_interrupted() {
                return Err(DownloadError::interrupted(destination));
            }
            let chunk = chunk_result.map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url)
                } else {
                    DownloadError::network(url, e)
                }
            })?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(temp_path, e))?;
            bytes_written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;
        Ok(bytes_written)
    }
}

/// Resolves once `flag` is set.
pub(super) async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

/// Temp file that is deleted on drop unless disarmed.
#[derive(Debug)]
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the file; called once it has been renamed into place.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove partial file"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::api::{Category, Purity, WallpaperDescriptor};

    fn sink() -> FileSink {
        FileSink::new(WallhavenClient::new(Arc::new(RateLimiter::disabled()), None))
    }

    fn job(dir: &Path, url: &str) -> DownloadJob {
        DownloadJob::new(
            WallpaperDescriptor {
                id: "94x38z".to_string(),
                source_url: url.to_string(),
                purity: Purity::Sfw,
                category: Category::General,
                collection_name: None,
                file_type: None,
            },
            dir,
        )
    }

    #[test]
    fn test_partial_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg.part");
        std::fs::write(&path, b"half").unwrap();

        drop(PartialFile::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn test_partial_file_kept_when_disarmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg.part");
        std::fs::write(&path, b"full").unwrap();

        PartialFile::new(path.clone()).disarm();
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_missing_is_fine() {
        let dir = TempDir::new().unwrap();
        drop(PartialFile::new(dir.path().join("never-created.part")));
    }

    #[tokio::test]
    async fn test_existing_file_skipped_without_network() {
        let dir = TempDir::new().unwrap();
        // Unroutable URL: any network access would fail the test.
        let job = job(dir.path(), "http://127.0.0.1:9/full/94x38z.jpg");
        std::fs::write(job.destination_file(), b"already here").unwrap();

        let result = sink().save(&job).await;
        assert_eq!(result.status, DownloadStatus::SkippedExists);
        assert_eq!(std::fs::read(job.destination_file()).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn test_invalid_source_url_fails() {
        let dir = TempDir::new().unwrap();
        let job = job(dir.path(), "not a url");

        let error = sink().save_once(&job).await.unwrap_err();
        assert!(matches!(error, DownloadError::InvalidUrl { .. }));
        assert!(!job.destination_file().exists());
    }

    #[tokio::test]
    async fn test_interrupted_before_request() {
        let dir = TempDir::new().unwrap();
        let job = job(dir.path(), "http://127.0.0.1:9/full/94x38z.jpg");
        let flag = Arc::new(AtomicBool::new(true));

        let error = sink().with_interrupt_flag(flag).save_once(&job).await.unwrap_err();
        assert!(matches!(error, DownloadError::Interrupted { .. }));
        assert!(!job.destination_file().exists());
        assert!(!partial_path(job.destination_file()).exists());
    }
}
