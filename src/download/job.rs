//! Download jobs, plans and per-job results.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::api::WallpaperDescriptor;

use super::filename::{wallpaper_extension, wallpaper_filename};

/// One wallpaper bound to its destination on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    descriptor: WallpaperDescriptor,
    destination_dir: PathBuf,
    destination_file: PathBuf,
}

impl DownloadJob {
    /// Creates a job writing `<destination_dir>/<id>.<ext>`.
    ///
    /// The extension comes from the listing (URL, then MIME type, then
    /// `jpg`) and is fixed here so skip checks match across runs. A job whose
    /// URL is looked up later keeps this name even if the image is a PNG.
    #[must_use]
    pub fn new(descriptor: WallpaperDescriptor, destination_dir: impl Into<PathBuf>) -> Self {
        let destination_dir = destination_dir.into();
        let extension =
            wallpaper_extension(&descriptor.source_url, descriptor.file_type.as_deref());
        let destination_file = destination_dir.join(wallpaper_filename(&descriptor.id, &extension));
        Self {
            descriptor,
            destination_dir,
            destination_file,
        }
    }

    /// The wallpaper being fetched.
    #[must_use]
    pub fn descriptor(&self) -> &WallpaperDescriptor {
        &self.descriptor
    }

    /// Directory the file lands in.
    #[must_use]
    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    /// Final path of the file.
    #[must_use]
    pub fn destination_file(&self) -> &Path {
        &self.destination_file
    }
}

/// Ordered list of jobs with unique destination files.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    jobs: Vec<DownloadJob>,
    destinations: HashSet<PathBuf>,
}

impl JobPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job unless its destination file is already planned.
    ///
    /// Returns `false` when the job was dropped as a duplicate.
    pub fn push(&mut self, job: DownloadJob) -> bool {
        if !self.destinations.insert(job.destination_file.clone()) {
            return false;
        }
        self.jobs.push(job);
        true
    }

    /// Number of jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the plan has no jobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs in planning order.
    #[must_use]
    pub fn jobs(&self) -> &[DownloadJob] {
        &self.jobs
    }
}

impl IntoIterator for JobPlan {
    type Item = DownloadJob;
    type IntoIter = std::vec::IntoIter<DownloadJob>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

impl FromIterator<DownloadJob> for JobPlan {
    fn from_iter<I: IntoIterator<Item = DownloadJob>>(iter: I) -> Self {
        let mut plan = Self::new();
        for job in iter {
            plan.push(job);
        }
        plan
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// File written; carries the byte count.
    Ok {
        /// Bytes written to disk.
        bytes: u64,
    },
    /// A non-empty file was already present; nothing was fetched.
    SkippedExists,
    /// The job failed; carries a human-readable reason.
    Failed(String),
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok { bytes } => write!(f, "ok ({bytes} bytes)"),
            Self::SkippedExists => f.write_str("skipped (exists)"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A job paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// The job that ran.
    pub job: DownloadJob,
    /// What happened.
    pub status: DownloadStatus,
}

impl DownloadResult {
    /// Whether the job failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.status, DownloadStatus::Failed(_))
    }
}
