//! Bounded-concurrency execution of a [`JobPlan`].
//!
//! The scheduler spawns one Tokio task per job, gated by a semaphore sized to
//! the worker count. Each task runs [`FileSink::save_once`] under the retry
//! policy and records its outcome in the shared [`RunStats`]. A failing job
//! never cancels its siblings.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wallhaven_core::api::WallhavenClient;
//! use wallhaven_core::download::{DownloadScheduler, FileSink, JobPlan, RateLimiter, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimiter::per_second(1));
//! let sink = FileSink::new(WallhavenClient::new(limiter, None));
//! let scheduler = DownloadScheduler::new(2, RetryPolicy::default(), sink)?;
//! let summary = scheduler.run(JobPlan::new()).await?;
//! println!("ok {}, skipped {}, failed {}", summary.ok, summary.skipped, summary.failed);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::constants::RECOMMENDED_MAX_WORKERS;
use super::job::{DownloadJob, DownloadResult, DownloadStatus, JobPlan};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::sink::{FileSink, wait_for_interrupt};
use super::DownloadError;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 1;

/// Error type for scheduler construction and runs.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Worker count must be at least 1.
    #[error("invalid worker count {value}: must be at least 1")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// A failed job as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Destination the job was writing.
    pub file: PathBuf,
    /// Why it failed.
    pub reason: String,
}

/// Live counters for a run, shared with every task and the progress display.
#[derive(Debug, Default)]
pub struct RunStats {
    total: AtomicUsize,
    ok: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    failures: Mutex<Vec<FailureRecord>>,
}

impl RunStats {
    /// Creates a tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs in the plan being run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Jobs that wrote a file.
    #[must_use]
    pub fn ok(&self) -> usize {
        self.ok.load(Ordering::SeqCst)
    }

    /// Jobs skipped because the file existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Jobs that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Retry attempts made across all jobs.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Jobs finished so far, whatever the outcome.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.ok() + self.skipped() + self.failed()
    }

    /// Zeroes every counter and sets the job total for a new run.
    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        for counter in [&self.ok, &self.skipped, &self.failed, &self.retried] {
            counter.store(0, Ordering::SeqCst);
        }
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    fn record(&self, result: &DownloadResult) {
        match &result.status {
            DownloadStatus::Ok { .. } => {
                self.ok.fetch_add(1, Ordering::SeqCst);
            }
            DownloadStatus::SkippedExists => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
            DownloadStatus::Failed(reason) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                let record = FailureRecord {
                    file: result.job.destination_file().to_path_buf(),
                    reason: reason.clone(),
                };
                self.failures
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(record);
            }
        }
    }

    fn failures(&self) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// Final tally of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files written.
    pub ok: usize,
    /// Files already present.
    pub skipped: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Retry attempts made.
    pub retried: usize,
    /// Whether the run was cut short by an interrupt.
    pub interrupted: bool,
    /// One entry per failed job.
    pub failures: Vec<FailureRecord>,
    /// Every job's result, in completion order.
    pub results: Vec<DownloadResult>,
}

impl RunSummary {
    /// Whether every job ended `Ok` or `SkippedExists` and the run completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }
}

/// Runs a plan's jobs through a [`FileSink`] with bounded concurrency.
#[derive(Debug)]
pub struct DownloadScheduler {
    worker_count: usize,
    retry_policy: RetryPolicy,
    sink: FileSink,
    stats: Arc<RunStats>,
}

impl DownloadScheduler {
    /// Creates a scheduler with `worker_count` concurrent jobs.
    ///
    /// Counts above the recommended maximum are accepted with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidWorkerCount`] for zero workers.
    #[instrument(level = "debug", skip(retry_policy, sink))]
    pub fn new(
        worker_count: usize,
        retry_policy: RetryPolicy,
        sink: FileSink,
    ) -> Result<Self, SchedulerError> {
        if worker_count == 0 {
            return Err(SchedulerError::InvalidWorkerCount { value: worker_count });
        }
        if worker_count > RECOMMENDED_MAX_WORKERS {
            warn!(
                worker_count,
                recommended_max = RECOMMENDED_MAX_WORKERS,
                "many workers - wallhaven may throttle or block this client"
            );
        }
        debug!(
            worker_count,
            max_attempts = retry_policy.max_attempts(),
            "creating download scheduler"
        );
        Ok(Self {
            worker_count,
            retry_policy,
            sink,
            stats: Arc::new(RunStats::new()),
        })
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Counters updated live while a run is in progress.
    #[must_use]
    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    /// Runs every job to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::SemaphoreClosed`] if the semaphore is closed.
    /// Individual job failures are reported in the summary, not as errors.
    pub async fn run(&self, plan: JobPlan) -> Result<RunSummary, SchedulerError> {
        self.run_interruptible(plan, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Runs the plan until done or until `interrupt` is set.
    ///
    /// Once the flag is set no new job starts; in-flight saves notice it,
    /// abort and remove their temp files. Every spawned task is awaited
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(skip(self, plan, interrupt), fields(jobs = plan.len(), workers = self.worker_count))]
    pub async fn run_interruptible(
        &self,
        plan: JobPlan,
        interrupt: Arc<AtomicBool>,
    ) -> Result<RunSummary, SchedulerError> {
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let sink = self.sink.clone().with_interrupt_flag(Arc::clone(&interrupt));
        let stats = Arc::clone(&self.stats);
        stats.reset(plan.len());

        info!("starting downloads");

        let mut handles = Vec::with_capacity(plan.len());
        for job in plan {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::SemaphoreClosed)?;

            if interrupt.load(Ordering::SeqCst) {
                debug!("interrupted - not starting remaining jobs");
                break;
            }

            let sink = sink.clone();
            let stats = Arc::clone(&stats);
            let policy = self.retry_policy.clone();
            let interrupt = Arc::clone(&interrupt);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let status = save_with_retry(&sink, &job, &policy, &stats, &interrupt).await;
                let result = DownloadResult { job, status };
                stats.record(&result);
                result
            }));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "download task panicked"),
            }
        }

        let summary = RunSummary {
            ok: stats.ok(),
            skipped: stats.skipped(),
            failed: stats.failed(),
            retried: stats.retried(),
            interrupted: interrupt.load(Ordering::SeqCst),
            failures: stats.failures(),
            results,
        };
        info!(
            ok = summary.ok,
            skipped = summary.skipped,
            failed = summary.failed,
            retried = summary.retried,
            interrupted = summary.interrupted,
            "downloads complete"
        );
        Ok(summary)
    }
}

#[instrument(
    skip(sink, job, policy, stats, interrupt),
    fields(id = %job.descriptor().id)
)]
async fn save_with_retry(
    sink: &FileSink,
    job: &DownloadJob,
    policy: &RetryPolicy,
    stats: &RunStats,
    interrupt: &AtomicBool,
) -> DownloadStatus {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let error: DownloadError = match sink.save_once(job).await {
            Ok(status) => return status,
            Err(e) => e,
        };

        let failure_type = classify_error(&error);
        let retry_after = if failure_type == FailureType::RateLimited {
            error.retry_after()
        } else {
            None
        };
        if let Some(delay) = retry_after {
            sink.rate_limiter().pause_for(delay).await;
        }

        match policy.should_retry(failure_type, attempt) {
            RetryDecision::Retry {
                delay: backoff_delay,
                attempt: next_attempt,
            } if !interrupt.load(Ordering::SeqCst) => {
                let delay = retry_after.map_or(backoff_delay, |d| d.max(backoff_delay));
                info!(
                    file = %job.destination_file().display(),
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    using_retry_after = retry_after.is_some(),
                    error = %error,
                    "retrying download"
                );
                stats.increment_retried();
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = wait_for_interrupt(interrupt) => {
                        debug!("interrupted during retry delay");
                        return DownloadStatus::Failed(error.to_string());
                    }
                }
            }
            RetryDecision::Retry { .. } => {
                return DownloadStatus::Failed(error.to_string());
            }
            RetryDecision::DoNotRetry { reason } => {
                warn!(
                    file = %job.destination_file().display(),
                    error = %error,
                    attempts = attempt,
                    %reason,
                    "download failed"
                );
                return DownloadStatus::Failed(error.to_string());
            }
        }
    }
}
