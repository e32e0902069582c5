//! Stale branch policy engine.
//!
//! This crate scans the branches of a GitHub repository, decides for each
//! one whether to leave it alone, mark it stale, keep waiting, or remove it,
//! and then carries that decision out through commit comments and ref
//! deletion.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use stale_branches::{GitHubClient, Params, Repo, StaleBranchReaper};
//!
//! # async fn example() -> stale_branches::Result<()> {
//! let repo = Repo::new("octo-org", "octo-repo");
//! let client = Arc::new(GitHubClient::new("ghp_token", repo.clone())?);
//!
//! let mut params = Params::new(repo);
//! params.dry_run = true;
//!
//! let summary = StaleBranchReaper::new(params, client.clone(), client)
//!     .run(chrono::Utc::now())
//!     .await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! A branch whose last commit is older than the stale cutoff gets a comment
//! tagged `[stale:<branch>]` on its tip commit. Once the newest such comment
//! is older than the grace period, the branch is deleted together with its
//! stale comments. Deleting the comment or pushing a new commit resets the
//! cycle.
//!
//! # Architecture
//!
//! - [`BranchSource`] lists branches page by page; [`BranchReader`] walks it
//! - [`CommentStore`] reads and writes commit comments and deletes refs
//! - [`planner`] turns a branch into a [`Plan`], [`executor`] applies it
//! - [`StaleBranchReaper`] drives both with bounded concurrency and an
//!   operation budget
//! - [`GitHubClient`] implements both ports against the GitHub API
//! - [`EventSink`] receives a structured [`RunEvent`] for every decision

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod filters;
pub mod github;
pub mod memory;
pub mod planner;
pub mod recipient;
pub mod runner;
pub mod source;
pub mod store;
pub mod tagged;
pub mod template;
pub mod types;

pub use config::Params;
pub use error::{Result, StaleBranchError};
pub use events::{EventSink, MemoryEventSink, RunEvent, TracingEventSink};
pub use github::GitHubClient;
pub use runner::{StaleBranchReaper, DEFAULT_CONCURRENCY};
pub use source::{BranchReader, BranchSource};
pub use store::CommentStore;
pub use types::{Author, Branch, CommitComment, Plan, PlanKind, Repo, RunSummary, SkipReason};
