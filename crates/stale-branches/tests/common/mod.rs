//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use stale_branches::memory::{InMemoryCommentStore, StaticBranchSource};
use stale_branches::{Author, Branch, MemoryEventSink, Params, Repo, StaleBranchReaper};

pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn params() -> Params {
    let mut params = Params::new(Repo::new("github", "octocat"));
    params.days_before_branch_stale = 60;
    params.days_before_branch_delete = 7;
    params
}

/// A branch last committed `age_days` before [`now`], authored by `user1`.
pub fn branch(name: &str, age_days: i64) -> Branch {
    Branch {
        branch_name: name.to_string(),
        prefix: "refs/heads/".to_string(),
        commit_id: format!("sha-{name}"),
        date: now() - Duration::days(age_days),
        author: Some(Author {
            username: "user1".to_string(),
            email: Some("user1@example.com".to_string()),
            belongs_to_organization: false,
        }),
        is_protected: false,
        open_prs: false,
    }
}

pub fn stale_branches(count: usize) -> Vec<Branch> {
    (1..=count).map(|i| branch(&format!("stale-{i}"), 100)).collect()
}

/// Seed a stale comment on `branch`, `age_days` before [`now`].
pub fn mark(store: &InMemoryCommentStore, branch: &Branch, age_days: i64) -> u64 {
    store.insert_comment(
        &branch.commit_id,
        &format!("[stale:{}]\r\n\r\nmarked", branch.branch_name),
        now() - Duration::days(age_days),
    )
}

pub struct Harness {
    pub source: Arc<StaticBranchSource>,
    pub store: Arc<InMemoryCommentStore>,
    pub sink: Arc<MemoryEventSink>,
}

impl Harness {
    pub fn new(branches: Vec<Branch>) -> Self {
        Self::with_parts(StaticBranchSource::new(branches), InMemoryCommentStore::new())
    }

    pub fn with_parts(source: StaticBranchSource, store: InMemoryCommentStore) -> Self {
        Self {
            source: Arc::new(source),
            store: Arc::new(store),
            sink: Arc::new(MemoryEventSink::new()),
        }
    }

    pub fn reaper(&self, params: Params) -> StaleBranchReaper {
        StaleBranchReaper::new(params, self.source.clone(), self.store.clone())
            .with_event_sink(self.sink.clone())
    }
}
