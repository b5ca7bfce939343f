//! Wallhaven Downloader Core Library
//!
//! This library downloads wallhaven.cc collections and uploads for one or
//! more users into a deterministic directory tree, under a process-wide
//! request-rate ceiling, without ever leaving a partially written image at
//! its final path.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Paginated wallhaven API client with purity/category filtering
//! - [`download`] - Rate limiter, atomic file sink, retrying scheduler
//! - [`planner`] - Users and selectors to an ordered, deduplicated job plan

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod download;
pub mod planner;
mod user_agent;

// Re-export commonly used types
pub use api::{
    ApiError, Category, CollectionInfo, Purity, SearchFilter, WallhavenClient,
    WallpaperDescriptor, WallpaperSource,
};
pub use download::{
    DownloadError, DownloadJob, DownloadResult, DownloadScheduler, DownloadStatus, FileSink,
    JobPlan, RateLimiter, RetryPolicy, RunStats, RunSummary, SchedulerError,
};
pub use planner::{
    JobPlanner, PlanError, PlanMode, PlanOutcome, PlanRequest, PlanTarget, PlannerError,
};
