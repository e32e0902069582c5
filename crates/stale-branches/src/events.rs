//! Structured run events.
//!
//! The planner, executor and runner report through an [`EventSink`] so that
//! callers can assert on what happened instead of scraping log text.
//! [`TracingEventSink`] turns events into log lines; [`MemoryEventSink`]
//! keeps them for inspection.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::types::{Plan, PlanKind, RunSummary};

/// Policy rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    ProtectedOrganization,
    UnknownAuthor,
    OpenPullRequests,
    ProtectedAuthor,
    AllowedBranches,
    ExemptBranches,
    ProtectedBranch,
    Staleness,
}

/// Which half of a branch's processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        repository: String,
        dry_run: bool,
        operations_per_run: usize,
    },
    /// `matched` is true when the rule fired and the branch was skipped.
    RuleEvaluated {
        branch: String,
        rule: Rule,
        matched: bool,
    },
    Planned {
        branch: String,
        plan: Plan,
    },
    Executed {
        branch: String,
        kind: PlanKind,
        dry_run: bool,
    },
    BranchFailed {
        branch: String,
        stage: Stage,
        error: String,
    },
    /// A mutating plan was dropped because the run's budget was spent.
    BudgetExhausted {
        branch: String,
        kind: PlanKind,
    },
    ListingFailed {
        error: String,
    },
    RunFinished {
        summary: RunSummary,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::RunStarted {
                repository,
                dry_run,
                operations_per_run,
            } => {
                info!(repository = %repository, operations_per_run, "Scanning branches");
                if dry_run {
                    info!("Running in dry-run mode. No branch will be removed.");
                }
            }
            RunEvent::RuleEvaluated {
                branch,
                rule,
                matched,
            } => debug!(branch = %branch, ?rule, matched, "Rule evaluated"),
            RunEvent::Planned { branch, plan } => log_plan(&branch, &plan),
            RunEvent::Executed {
                branch,
                kind,
                dry_run,
            } => {
                if dry_run && kind.is_operation() {
                    info!(branch = %branch, "-> dry run, skipping {kind}");
                } else {
                    debug!(branch = %branch, %kind, "Branch processed");
                }
            }
            RunEvent::BranchFailed {
                branch,
                stage,
                error,
            } => warn!(branch = %branch, ?stage, error = %error, "Failed to process branch"),
            RunEvent::BudgetExhausted { branch, kind } => {
                info!(branch = %branch, "-> operation budget spent, not performing {kind}");
            }
            RunEvent::ListingFailed { error } => {
                warn!(error = %error, "Failed to list branches, stopping run");
            }
            RunEvent::RunFinished { summary } => info!("Summary: {summary}"),
        }
    }
}

fn log_plan(branch: &str, plan: &Plan) {
    match plan {
        Plan::Skip { reason } => info!(branch = %branch, "-> {reason}"),
        Plan::MarkStale { cutoff_time } => info!(
            branch = %branch,
            "-> marking as stale, removable after {}",
            cutoff_time.to_rfc3339()
        ),
        Plan::KeepStale {
            last_comment_time, ..
        } => info!(
            branch = %branch,
            "-> already marked stale on {}, skipping",
            last_comment_time.to_rfc3339()
        ),
        Plan::Remove {
            last_comment_time,
            comments,
            ..
        } => match last_comment_time {
            Some(t) => info!(
                branch = %branch,
                comments = comments.len(),
                "-> removing stale branch (stale comment date is {})",
                t.to_rfc3339()
            ),
            None => info!(branch = %branch, "-> removing stale branch (no grace period)"),
        },
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<RunEvent>>,
}

impl MemoryEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Plans recorded for `branch`.
    pub fn plans_for(&self, branch: &str) -> Vec<Plan> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Planned { branch: b, plan } if b == branch => Some(plan),
                _ => None,
            })
            .collect()
    }

    /// Rules evaluated for `branch`, in order.
    pub fn rules_for(&self, branch: &str) -> Vec<(Rule, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::RuleEvaluated {
                    branch: b,
                    rule,
                    matched,
                } if b == branch => Some((rule, matched)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
