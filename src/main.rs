//! CLI entry point for the wallhaven downloader.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use wallhaven_core::{
    DownloadScheduler, FileSink, JobPlanner, PlanRequest, RateLimiter, RetryPolicy, WallhavenClient,
};

mod cli;
mod config;
mod output;
mod progress;
mod terminal;

use cli::Args;

/// Process outcome mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse before tracing so --help and usage errors print cleanly
    let args = Args::parse_grouped();
    terminal::init_tracing(terminal::default_log_level(args.quiet, args.verbose));

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    debug!(
        workers = args.workers,
        limit = args.limit,
        retries = args.retries,
        sync = args.sync,
        "CLI arguments parsed"
    );

    let api_key = config::resolve_api_key(
        args.api_key.as_deref(),
        std::env::var(config::API_KEY_VAR).ok(),
        Path::new(config::SETTINGS_FILE),
    )?;
    let api_key = match api_key {
        Some((key, source)) => {
            debug!(%source, "using API key");
            Some(key)
        }
        None => {
            warn!(
                "no API key found (--api_key, {} or {}); NSFW and private content will be unavailable",
                config::API_KEY_VAR,
                config::SETTINGS_FILE
            );
            None
        }
    };

    let limiter = if args.limit == 0 {
        debug!("rate limiting disabled");
        Arc::new(RateLimiter::disabled())
    } else {
        debug!(requests_per_second = args.limit, "rate limiting enabled");
        Arc::new(RateLimiter::per_second(args.limit))
    };
    let client = WallhavenClient::new(limiter, api_key);

    for username in &args.info {
        let collections = client
            .get_collection_info(username)
            .await
            .with_context(|| format!("failed to list collections of {username}"))?;
        output::print_collection_info(username, &collections);
    }

    let targets = args.plan_targets();
    if targets.is_empty() {
        return Ok(ProcessExit::Success);
    }

    let started = Instant::now();
    let request = PlanRequest {
        targets,
        filter: args.search_filter(),
        output_root: args.downloads_path.clone(),
        mode: args.plan_mode(),
    };
    if args.explicitly_requests_keyed_content() && !client.has_api_key() {
        warn!("nsfw requested without an API key; upstream will omit those wallpapers");
    }

    let planner = JobPlanner::new(client.clone());
    let outcome = planner.plan(&request).await?;
    for plan_error in &outcome.errors {
        warn!(username = %plan_error.username, detail = %plan_error.detail, "target skipped");
    }

    let total = outcome.plan.len();
    info!(jobs = total, output = %args.downloads_path.display(), "planned downloads");

    let retry_policy =
        RetryPolicy::with_backoff(args.retries, Duration::from_millis(args.backoff_ms));
    let scheduler =
        DownloadScheduler::new(usize::from(args.workers), retry_policy, FileSink::new(client))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(use_spinner, scheduler.stats(), total);

    let summary = scheduler
        .run_interruptible(outcome.plan, Arc::clone(&interrupted))
        .await?;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    output::print_run_summary(&summary, &outcome.errors, started.elapsed());

    if summary.interrupted {
        warn!(
            finished = summary.ok + summary.skipped + summary.failed,
            total, "Interrupted. Run again to resume."
        );
    }

    Ok(output::determine_exit_outcome(
        outcome.errors.len(),
        summary.interrupted,
    ))
}
