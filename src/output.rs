//! Human-readable output: collection listings, run summaries, exit outcome.

use std::time::Duration;

use wallhaven_core::{CollectionInfo, PlanError, RunSummary};

use crate::ProcessExit;

pub(crate) fn print_collection_info(username: &str, collections: &[CollectionInfo]) {
    for line in render_collection_info(username, collections) {
        println!("{line}");
    }
}

pub(crate) fn render_collection_info(username: &str, collections: &[CollectionInfo]) -> Vec<String> {
    if collections.is_empty() {
        return vec![format!("{username}: no public collections")];
    }
    let label_width = collections
        .iter()
        .map(|c| c.label.chars().count())
        .max()
        .unwrap_or(0)
        .max("Collection".len());

    let mut lines = Vec::with_capacity(collections.len() + 2);
    lines.push(format!("{username}: {} collection(s)", collections.len()));
    lines.push(format!(
        "  {:<label_width$}  {:>10}  {:>8}  {:>8}",
        "Collection", "ID", "Count", "Views"
    ));
    for collection in collections {
        lines.push(format!(
            "  {:<label_width$}  {:>10}  {:>8}  {:>8}",
            collection.label, collection.id, collection.count, collection.views
        ));
    }
    lines
}

pub(crate) fn print_run_summary(summary: &RunSummary, plan_errors: &[PlanError], elapsed: Duration) {
    for line in render_run_summary(summary, plan_errors, elapsed) {
        println!("{line}");
    }
}

pub(crate) fn render_run_summary(
    summary: &RunSummary,
    plan_errors: &[PlanError],
    elapsed: Duration,
) -> Vec<String> {
    let mut lines = vec![format!(
        "Finished in {}: {} downloaded, {} skipped (already present), {} failed",
        format_elapsed(elapsed),
        summary.ok,
        summary.skipped,
        summary.failed
    )];
    if summary.retried > 0 {
        lines.push(format!("{} download(s) needed a retry", summary.retried));
    }
    if summary.interrupted {
        lines.push("Interrupted. Run again to resume.".to_string());
    }
    if !summary.failures.is_empty() {
        lines.push("Failed downloads:".to_string());
        for failure in &summary.failures {
            lines.push(format!("  {}: {}", failure.file.display(), failure.reason));
        }
    }
    if !plan_errors.is_empty() {
        lines.push("Planning errors:".to_string());
        for error in plan_errors {
            lines.push(format!("  {error}"));
        }
    }
    lines
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Exit 1 when any target could not be planned or the run was cut short.
/// Individual download failures are reported but do not fail the process.
pub(crate) fn determine_exit_outcome(plan_errors: usize, interrupted: bool) -> ProcessExit {
    if plan_errors > 0 || interrupted {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
