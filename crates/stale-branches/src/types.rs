//! Domain types shared by the planner, executor and runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub owner: String,
    pub repo: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse an `owner/repo` slug.
    pub fn parse(slug: &str) -> Option<Self> {
        let (owner, repo) = slug.trim().split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::new(owner, repo))
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Author of a branch's tip commit, resolved to a GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    pub email: Option<String>,
    /// Whether the author is a member of the protected organization.
    pub belongs_to_organization: bool,
}

/// One ref under `refs/heads/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub branch_name: String,
    /// Ref namespace, e.g. `refs/heads/`.
    pub prefix: String,
    /// Tip commit SHA; comments are looked up by this.
    pub commit_id: String,
    /// Authoring date of the tip commit.
    pub date: DateTime<Utc>,
    /// `None` when the commit author is not linked to an account.
    pub author: Option<Author>,
    pub is_protected: bool,
    pub open_prs: bool,
}

impl Branch {
    pub fn username(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.username.as_str())
    }
}

/// A comment attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitComment {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

/// Why a branch was left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    ProtectedOrganization { username: String, organization: String },
    UnknownAuthor,
    OpenPullRequests,
    ProtectedAuthor { username: String },
    NotAllowed,
    Exempted,
    ProtectedBranch,
    UpdatedRecently { last_commit: DateTime<Utc> },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtectedOrganization {
                username,
                organization,
            } => write!(
                f,
                "author {username} belongs to protected organization {organization}"
            ),
            Self::UnknownAuthor => write!(f, "author is unknown"),
            Self::OpenPullRequests => write!(f, "branch has open pull requests"),
            Self::ProtectedAuthor { username } => write!(f, "author {username} is protected"),
            Self::NotAllowed => write!(f, "branch is not matched by the allowed branches pattern"),
            Self::Exempted => write!(f, "branch is exempted"),
            Self::ProtectedBranch => write!(f, "branch is protected"),
            Self::UpdatedRecently { last_commit } => {
                write!(f, "updated recently ({})", last_commit.to_rfc3339())
            }
        }
    }
}

/// Disposition decided for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Plan {
    /// Leave the branch alone.
    Skip { reason: SkipReason },
    /// Post a stale comment; the branch becomes removable at `cutoff_time`.
    MarkStale { cutoff_time: DateTime<Utc> },
    /// Already marked, grace period still running.
    KeepStale {
        last_comment_time: DateTime<Utc>,
        cutoff_time: DateTime<Utc>,
    },
    /// Delete the branch and the stale comments found for it.
    ///
    /// `last_comment_time` is `None` when the grace period is zero and the
    /// branch was never marked.
    Remove {
        last_comment_time: Option<DateTime<Utc>>,
        cutoff_time: DateTime<Utc>,
        comments: Vec<CommitComment>,
    },
}

impl Plan {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Skip { .. } => PlanKind::Skip,
            Self::MarkStale { .. } => PlanKind::MarkStale,
            Self::KeepStale { .. } => PlanKind::KeepStale,
            Self::Remove { .. } => PlanKind::Remove,
        }
    }

    /// Whether acting on this plan counts against the operation budget.
    pub fn is_operation(&self) -> bool {
        self.kind().is_operation()
    }
}

/// Discriminant of [`Plan`], used for counters and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Skip,
    MarkStale,
    KeepStale,
    Remove,
}

impl PlanKind {
    pub const fn is_operation(self) -> bool {
        matches!(self, Self::MarkStale | Self::Remove)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::MarkStale => "mark stale",
            Self::KeepStale => "keep stale",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub skip: usize,
    pub mark_stale: usize,
    pub keep_stale: usize,
    pub remove: usize,
    /// Mutating plans not executed because the operation budget was spent.
    pub deferred: usize,
    /// Branches whose planning or execution failed.
    pub errors: usize,
}

impl RunSummary {
    pub fn record(&mut self, kind: PlanKind) {
        match kind {
            PlanKind::Skip => self.skip += 1,
            PlanKind::MarkStale => self.mark_stale += 1,
            PlanKind::KeepStale => self.keep_stale += 1,
            PlanKind::Remove => self.remove += 1,
        }
    }

    pub fn count(&self, kind: PlanKind) -> usize {
        match kind {
            PlanKind::Skip => self.skip,
            PlanKind::MarkStale => self.mark_stale,
            PlanKind::KeepStale => self.keep_stale,
            PlanKind::Remove => self.remove,
        }
    }

    /// Number of mutating dispositions acted on.
    pub fn operations(&self) -> usize {
        self.mark_stale + self.remove
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned: {}, skip: {}, mark stale: {}, keep stale: {}, remove: {}, deferred: {}, errors: {}",
            self.scanned,
            self.skip,
            self.mark_stale,
            self.keep_stale,
            self.remove,
            self.deferred,
            self.errors
        )
    }
}
