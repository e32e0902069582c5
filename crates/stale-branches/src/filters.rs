//! Run-scoped cutoffs and compiled patterns.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::config::Params;
use crate::error::{Result, StaleBranchError};

/// Filters derived once per run from [`Params`] and the run's `now`.
#[derive(Debug, Clone)]
pub struct BranchFilters {
    pub now: DateTime<Utc>,
    /// Branches whose tip commit is older than this are stale.
    pub stale_cutoff: DateTime<Utc>,
    /// Stale comments older than this allow removal.
    pub remove_cutoff: DateTime<Utc>,
    /// When a branch marked during this run becomes removable.
    pub removable_after: DateTime<Utc>,
    pub authors_regex: Option<Regex>,
    pub allowed_branches_regex: Option<Regex>,
    pub protected_branches_regex: Option<Regex>,
    pub exempt_protected_branches: bool,
}

impl BranchFilters {
    pub fn new(params: &Params, now: DateTime<Utc>) -> Result<Self> {
        let stale_age = Duration::days(i64::from(params.days_before_branch_stale));
        let delete_grace = Duration::days(i64::from(params.days_before_branch_delete));

        Ok(Self {
            now,
            stale_cutoff: shift(
                now.checked_sub_signed(stale_age),
                "days before branch stale",
            )?,
            remove_cutoff: shift(
                now.checked_sub_signed(delete_grace),
                "days before branch delete",
            )?,
            removable_after: shift(
                now.checked_add_signed(delete_grace),
                "days before branch delete",
            )?,
            authors_regex: compile("protected authors", params.protected_authors_regex.as_deref())?,
            allowed_branches_regex: compile(
                "allowed branches",
                params.allowed_branches_regex.as_deref(),
            )?,
            protected_branches_regex: compile(
                "protected branches",
                params.protected_branches_regex.as_deref(),
            )?,
            exempt_protected_branches: params.exempt_protected_branches,
        })
    }

    /// When a branch marked now becomes removable.
    pub fn mark_cutoff(&self) -> DateTime<Utc> {
        self.removable_after
    }
}

/// Reject day counts that push a cutoff outside the representable range.
fn shift(cutoff: Option<DateTime<Utc>>, setting: &str) -> Result<DateTime<Utc>> {
    cutoff.ok_or_else(|| StaleBranchError::config(format!("{setting} is out of range")))
}

fn compile(name: &'static str, pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern.map(str::trim) {
        None | Some("") => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| StaleBranchError::InvalidPattern { name, source }),
    }
}
