//! Turns users and selectors into a [`JobPlan`].
//!
//! Each target (one user's collections, or one user's uploads) is planned in
//! isolation: an unknown user or collection name produces a [`PlanError`]
//! for that target only, and the remaining targets still contribute jobs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, CollectionInfo, SearchFilter, WallhavenClient, WallpaperSource};
use crate::download::constants::UPLOADS_DIR;
use crate::download::filename::sanitize_segment;
use crate::download::{DownloadJob, JobPlan};

/// What to plan for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanTarget {
    /// Named collections of a user; an empty list selects all of them.
    Collections {
        /// Owner of the collections.
        username: String,
        /// Collection labels, matched case-insensitively.
        names: Vec<String>,
    },
    /// Everything the user uploaded.
    Uploads {
        /// Uploader.
        username: String,
    },
}

impl PlanTarget {
    /// User this target belongs to.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Collections { username, .. } | Self::Uploads { username } => username,
        }
    }
}

/// How the plan will be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanMode {
    /// Fetch whatever is missing locally.
    #[default]
    Download,
    /// Mirror upstream, removing files no longer listed. Not available yet.
    Sync,
}

/// Everything the planner needs for one run.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// Targets in the order they were given.
    pub targets: Vec<PlanTarget>,
    /// Purity/category filter applied to every listing.
    pub filter: SearchFilter,
    /// Root of the download tree.
    pub output_root: PathBuf,
    /// Planning mode.
    pub mode: PlanMode,
}

/// A target that could not be planned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{username}: {detail}")]
pub struct PlanError {
    /// User of the failed target.
    pub username: String,
    /// What went wrong.
    pub detail: String,
}

impl PlanError {
    /// Creates an error for `username`.
    #[must_use]
    pub fn new(username: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            detail: detail.into(),
        }
    }

    fn from_api(username: &str, context: &str, error: &ApiError) -> Self {
        let detail = match error.status_code() {
            Some(404) => format!("{context}: user or collection not found ({error})"),
            Some(401 | 403) => format!("{context}: API key missing or rejected ({error})"),
            Some(429) => format!("{context}: too many requests, lower --limit ({error})"),
            _ => format!("{context}: {error}"),
        };
        Self::new(username, detail)
    }
}

/// Errors that stop planning altogether.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The requested mode exists but has no implementation.
    #[error("{feature} mode is not implemented")]
    NotImplemented {
        /// Name of the missing feature.
        feature: &'static str,
    },
}

/// Result of planning: jobs for the targets that worked, errors for the rest.
#[derive(Debug, Default)]
pub struct PlanOutcome {
    /// Deduplicated jobs in target order.
    pub plan: JobPlan,
    /// One entry per failed target.
    pub errors: Vec<PlanError>,
}

/// Builds download plans from API listings.
#[derive(Debug, Clone)]
pub struct JobPlanner {
    client: WallhavenClient,
}

impl JobPlanner {
    /// Creates a planner using `client` for listings.
    #[must_use]
    pub fn new(client: WallhavenClient) -> Self {
        Self { client }
    }

    /// Plans every target in `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::NotImplemented`] for [`PlanMode::Sync`], before
    /// any request is made. Per-target failures are reported in
    /// [`PlanOutcome::errors`] instead.
    #[instrument(skip(self, request), fields(targets = request.targets.len(), mode = ?request.mode))]
    pub async fn plan(&self, request: &PlanRequest) -> Result<PlanOutcome, PlannerError> {
        if request.mode == PlanMode::Sync {
            return Err(PlannerError::NotImplemented { feature: "sync" });
        }

        let mut outcome = PlanOutcome::default();
        for target in &request.targets {
            match self
                .plan_target(target, &request.filter, &request.output_root)
                .await
            {
                Ok(jobs) => {
                    let found = jobs.len();
                    let mut dropped = 0usize;
                    for job in jobs {
                        if !outcome.plan.push(job) {
                            dropped += 1;
                        }
                    }
                    if dropped > 0 {
                        debug!(username = target.username(), dropped, "dropped duplicate jobs");
                    }
                    info!(username = target.username(), wallpapers = found, "planned target");
                }
                Err(error) => {
                    warn!(username = %error.username, detail = %error.detail, "target failed");
                    outcome.errors.push(error);
                }
            }
        }
        Ok(outcome)
    }

    async fn plan_target(
        &self,
        target: &PlanTarget,
        filter: &SearchFilter,
        output_root: &Path,
    ) -> Result<Vec<DownloadJob>, PlanError> {
        let username = target.username();
        let user_dir = output_root.join(sanitize_segment(username));

        match target {
            PlanTarget::Uploads { .. } => {
                let descriptors = self
                    .client
                    .list_wallpapers(username, WallpaperSource::Uploads, filter)
                    .collect_all()
                    .await
                    .map_err(|e| PlanError::from_api(username, "listing uploads", &e))?;
                let dir = user_dir.join(UPLOADS_DIR);
                Ok(descriptors
                    .into_iter()
                    .map(|d| DownloadJob::new(d, &dir))
                    .collect())
            }
            PlanTarget::Collections { names, .. } => {
                let available = self
                    .client
                    .list_collections(username)
                    .collect_all()
                    .await
                    .map_err(|e| PlanError::from_api(username, "listing collections", &e))?;
                let selected = resolve_collections(&available, names)
                    .map_err(|detail| PlanError::new(username, detail))?;

                let mut jobs = Vec::new();
                for collection in selected {
                    let dir = user_dir.join(sanitize_segment(&collection.label));
                    let source = WallpaperSource::Collection {
                        id: collection.id,
                        name: collection.label.clone(),
                    };
                    let descriptors = self
                        .client
                        .list_wallpapers(username, source, filter)
                        .collect_all()
                        .await
                        .map_err(|e| {
                            PlanError::from_api(
                                username,
                                &format!("listing collection '{}'", collection.label),
                                &e,
                            )
                        })?;
                    debug!(collection = %collection.label, wallpapers = descriptors.len(), "listed collection");
                    jobs.extend(descriptors.into_iter().map(|d| DownloadJob::new(d, &dir)));
                }
                Ok(jobs)
            }
        }
    }
}

/// Folds a label the way collection names are compared and directories collide.
fn fold(label: &str) -> String {
    sanitize_segment(label).to_lowercase()
}

/// Picks the collections named in `names` (all of them when empty).
///
/// Names match labels case-insensitively. A name matching nothing, or more
/// than one collection, is an error. With no names, labels that would share
/// a directory are an error.
pub(crate) fn resolve_collections(
    available: &[CollectionInfo],
    names: &[String],
) -> Result<Vec<CollectionInfo>, String> {
    if names.is_empty() {
        let mut seen: HashMap<String, &str> = HashMap::new();
        for collection in available {
            if let Some(previous) = seen.insert(fold(&collection.label), collection.label.as_str()) {
                return Err(format!(
                    "collections '{previous}' and '{}' differ only by case and would share a directory",
                    collection.label
                ));
            }
        }
        return Ok(available.to_vec());
    }

    let mut selected: Vec<CollectionInfo> = Vec::new();
    for name in names {
        let wanted = fold(name);
        let matches: Vec<&CollectionInfo> = available
            .iter()
            .filter(|c| fold(&c.label) == wanted)
            .collect();
        match matches.as_slice() {
            [] => return Err(format!("collection '{name}' not found")),
            [one] => {
                if !selected.iter().any(|c| c.id == one.id) {
                    selected.push((*one).clone());
                }
            }
            many => {
                let labels: Vec<&str> = many.iter().map(|c| c.label.as_str()).collect();
                return Err(format!(
                    "collection name '{name}' is ambiguous, matches: {}",
                    labels.join(", ")
                ));
            }
        }
    }
    Ok(selected)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::download::RateLimiter;

    fn collection(id: u64, label: &str) -> CollectionInfo {
        CollectionInfo {
            id,
            label: label.to_string(),
            views: 0,
            count: 0,
        }
    }

    #[test]
    fn test_resolve_all_when_no_names() {
        let available = vec![collection(1, "Default"), collection(2, "Cats")];
        let selected = resolve_collections(&available, &[]).unwrap();
        assert_eq!(selected, available);
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let available = vec![collection(1, "Default"), collection(2, "Cats")];
        let selected = resolve_collections(&available, &["cats".to_string()]).unwrap();
        assert_eq!(selected, vec![collection(2, "Cats")]);
    }

    #[test]
    fn test_resolve_unknown_name_fails() {
        let available = vec![collection(1, "Default")];
        let error = resolve_collections(&available, &["Dogs".to_string()]).unwrap_err();
        assert!(error.contains("'Dogs' not found"), "{error}");
    }

    #[test]
    fn test_resolve_ambiguous_name_fails() {
        let available = vec![collection(1, "Cats"), collection(2, "CATS")];
        let error = resolve_collections(&available, &["cats".to_string()]).unwrap_err();
        assert!(error.contains("ambiguous"), "{error}");
        assert!(error.contains("Cats, CATS"), "{error}");
    }

    #[test]
    fn test_resolve_all_rejects_case_collisions() {
        let available = vec![collection(1, "Cats"), collection(2, "cats")];
        let error = resolve_collections(&available, &[]).unwrap_err();
        assert!(error.contains("differ only by case"), "{error}");
    }

    #[test]
    fn test_resolve_dedups_repeated_names() {
        let available = vec![collection(1, "Cats")];
        let names = vec!["Cats".to_string(), "cats".to_string()];
        assert_eq!(resolve_collections(&available, &names).unwrap().len(), 1);
    }

    #[test]
    fn test_plan_error_display() {
        let error = PlanError::new("alice", "collection 'Dogs' not found");
        assert_eq!(error.to_string(), "alice: collection 'Dogs' not found");
    }

    #[test]
    fn test_plan_error_from_api_status() {
        let error = PlanError::from_api("bob", "listing uploads", &ApiError::status("/search", 401));
        assert!(error.detail.contains("API key"), "{}", error.detail);
    }

    #[tokio::test]
    async fn test_sync_mode_fails_before_network() {
        // Unroutable base URL: any request would surface as a PlanError instead.
        let client = WallhavenClient::new(Arc::new(RateLimiter::disabled()), None)
            .with_base_url("http://127.0.0.1:9/api/v1");
        let planner = JobPlanner::new(client);
        let request = PlanRequest {
            targets: vec![PlanTarget::Uploads {
                username: "alice".into(),
            }],
            filter: SearchFilter::default(),
            output_root: PathBuf::from("downloads"),
            mode: PlanMode::Sync,
        };

        let error = planner.plan(&request).await.unwrap_err();
        assert!(matches!(error, PlannerError::NotImplemented { feature: "sync" }));
    }
}
