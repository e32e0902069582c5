//! In-memory implementations of the ports.
//!
//! Used for tests and for rehearsing a policy against a fixed set of
//! branches without talking to GitHub.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, StaleBranchError};
use crate::source::{BranchPage, BranchQuery, BranchSource};
use crate::store::{branch_ref, CommentStore};
use crate::types::{Branch, CommitComment};

#[derive(Debug, Default)]
struct StoreState {
    comments: Vec<(String, CommitComment)>,
    next_id: u64,
    deleted_refs: Vec<String>,
    protected_branches: Vec<String>,
    failing_commits: HashSet<String>,
    failing_creates: HashSet<String>,
    failing_refs: HashSet<String>,
    failing_comments: HashSet<u64>,
}

/// Comment store backed by a vector.
#[derive(Debug, Default)]
pub struct InMemoryCommentStore {
    state: Mutex<StoreState>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryCommentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a comment; returns its id.
    pub fn insert_comment(&self, commit_sha: &str, body: &str, created_at: DateTime<Utc>) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.comments.push((
            commit_sha.to_string(),
            CommitComment {
                id,
                created_at,
                body: body.to_string(),
            },
        ));
        id
    }

    pub fn set_protected_branches(&self, names: &[&str]) {
        self.state().protected_branches = names.iter().map(|n| (*n).to_string()).collect();
    }

    /// Make listing comments on `commit_sha` fail.
    pub fn fail_listing_for(&self, commit_sha: &str) {
        self.state().failing_commits.insert(commit_sha.to_string());
    }

    /// Make posting a comment on `commit_sha` fail.
    pub fn fail_creating_for(&self, commit_sha: &str) {
        self.state().failing_creates.insert(commit_sha.to_string());
    }

    /// Make deleting the ref for `branch_name` fail.
    pub fn fail_deleting_ref(&self, branch_name: &str) {
        self.state().failing_refs.insert(branch_name.to_string());
    }

    /// Make deleting comment `comment_id` fail.
    pub fn fail_deleting_comment(&self, comment_id: u64) {
        self.state().failing_comments.insert(comment_id);
    }

    pub fn comments_on(&self, commit_sha: &str) -> Vec<CommitComment> {
        self.state()
            .comments
            .iter()
            .filter(|(sha, _)| sha == commit_sha)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn comment_count(&self) -> usize {
        self.state().comments.len()
    }

    /// Refs deleted so far, relative to `refs/`.
    pub fn deleted_refs(&self) -> Vec<String> {
        self.state().deleted_refs.clone()
    }

    /// Highest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        InFlight(&self.in_flight)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn injected(what: &str) -> StaleBranchError {
    StaleBranchError::Api {
        status: 500,
        message: format!("injected failure: {what}"),
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn list_commit_comments(&self, commit_sha: &str) -> Result<Vec<CommitComment>> {
        let _guard = self.enter().await;
        if self.state().failing_commits.contains(commit_sha) {
            return Err(injected("list comments"));
        }
        Ok(self.comments_on(commit_sha))
    }

    async fn create_commit_comment(&self, commit_sha: &str, body: &str) -> Result<()> {
        let _guard = self.enter().await;
        if self.state().failing_creates.contains(commit_sha) {
            return Err(injected("create comment"));
        }
        self.insert_comment(commit_sha, body, Utc::now());
        Ok(())
    }

    async fn delete_commit_comment(&self, comment_id: u64) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.state();
        if state.failing_comments.contains(&comment_id) {
            return Err(injected("delete comment"));
        }
        let before = state.comments.len();
        state.comments.retain(|(_, c)| c.id != comment_id);
        if state.comments.len() == before {
            return Err(StaleBranchError::Api {
                status: 404,
                message: format!("comment {comment_id} not found"),
            });
        }
        Ok(())
    }

    async fn delete_branch_ref(&self, prefix: &str, branch_name: &str) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.state();
        if state.failing_refs.contains(branch_name) {
            return Err(injected("delete ref"));
        }
        state.deleted_refs.push(branch_ref(prefix, branch_name));
        Ok(())
    }

    async fn list_protected_branches(&self) -> Result<Vec<String>> {
        let _guard = self.enter().await;
        Ok(self.state().protected_branches.clone())
    }
}

/// Branch source serving a fixed list, paged by index cursors.
#[derive(Debug, Default)]
pub struct StaticBranchSource {
    branches: Vec<Branch>,
    fail_after_pages: Option<usize>,
    pages_served: AtomicUsize,
}

impl StaticBranchSource {
    #[must_use]
    pub fn new(branches: Vec<Branch>) -> Self {
        Self {
            branches,
            ..Self::default()
        }
    }

    /// Fail every page request after the first `pages` succeed.
    #[must_use]
    pub fn fail_after_pages(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BranchSource for StaticBranchSource {
    async fn fetch_branch_page(&self, query: &BranchQuery<'_>) -> Result<BranchPage> {
        if self
            .fail_after_pages
            .is_some_and(|limit| self.pages_served() >= limit)
        {
            return Err(injected("list branches"));
        }

        let start = match query.after {
            Some(cursor) => cursor.parse::<usize>().map_err(|_| {
                StaleBranchError::InvalidResponse(format!("bad cursor {cursor}"))
            })?,
            None => 0,
        };
        let end = (start + query.page_size).min(self.branches.len());
        let has_next_page = end < self.branches.len();

        self.pages_served.fetch_add(1, Ordering::SeqCst);

        Ok(BranchPage {
            branches: self.branches.get(start..end).unwrap_or_default().to_vec(),
            end_cursor: has_next_page.then(|| end.to_string()),
            has_next_page,
        })
    }
}
