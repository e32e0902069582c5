//! Disposition planner.
//!
//! Rules run in [`RULES`] order and the first one that matches skips the
//! branch. Comments are only read for branches that pass every rule.

use crate::config::Params;
use crate::error::Result;
use crate::events::{EventSink, Rule, RunEvent};
use crate::filters::BranchFilters;
use crate::tagged::{stale_tag, TaggedComments};
use crate::types::{Branch, Plan, SkipReason};

pub const RULES: [Rule; 8] = [
    Rule::ProtectedOrganization,
    Rule::UnknownAuthor,
    Rule::OpenPullRequests,
    Rule::ProtectedAuthor,
    Rule::AllowedBranches,
    Rule::ExemptBranches,
    Rule::ProtectedBranch,
    Rule::Staleness,
];

/// Evaluate a single rule; `Some` means the branch is skipped.
pub fn check_rule(
    rule: Rule,
    branch: &Branch,
    filters: &BranchFilters,
    params: &Params,
) -> Option<SkipReason> {
    match rule {
        Rule::ProtectedOrganization => {
            let organization = params.protected_organization_name.as_deref()?;
            let author = branch.author.as_ref()?;
            author
                .belongs_to_organization
                .then(|| SkipReason::ProtectedOrganization {
                    username: author.username.clone(),
                    organization: organization.to_string(),
                })
        }
        Rule::UnknownAuthor => (branch.author.is_none() && !params.ignore_unknown_authors)
            .then_some(SkipReason::UnknownAuthor),
        Rule::OpenPullRequests => (branch.open_prs && params.ignore_branches_with_open_prs)
            .then_some(SkipReason::OpenPullRequests),
        Rule::ProtectedAuthor => {
            let regex = filters.authors_regex.as_ref()?;
            let username = branch.username()?;
            regex
                .is_match(username)
                .then(|| SkipReason::ProtectedAuthor {
                    username: username.to_string(),
                })
        }
        Rule::AllowedBranches => {
            let regex = filters.allowed_branches_regex.as_ref()?;
            (!regex.is_match(&branch.branch_name)).then_some(SkipReason::NotAllowed)
        }
        Rule::ExemptBranches => {
            let regex = filters.protected_branches_regex.as_ref()?;
            regex
                .is_match(&branch.branch_name)
                .then_some(SkipReason::Exempted)
        }
        Rule::ProtectedBranch => (filters.exempt_protected_branches && branch.is_protected)
            .then_some(SkipReason::ProtectedBranch),
        Rule::Staleness => (branch.date >= filters.stale_cutoff)
            .then_some(SkipReason::UpdatedRecently {
                last_commit: branch.date,
            }),
    }
}

/// Decide what to do with `branch`.
pub async fn plan_branch_action(
    branch: &Branch,
    filters: &BranchFilters,
    comments: TaggedComments<'_>,
    params: &Params,
    sink: &dyn EventSink,
) -> Result<Plan> {
    for rule in RULES {
        let skip = check_rule(rule, branch, filters, params);
        sink.emit(RunEvent::RuleEvaluated {
            branch: branch.branch_name.clone(),
            rule,
            matched: skip.is_some(),
        });
        if let Some(reason) = skip {
            return Ok(Plan::Skip { reason });
        }
    }

    let tag = stale_tag(&branch.branch_name);
    let stale_comments = comments.comments_with_tag(&branch.commit_id, &tag).await?;

    let Some(last_comment_time) = stale_comments.iter().map(|c| c.created_at).max() else {
        if params.days_before_branch_delete == 0 {
            return Ok(Plan::Remove {
                last_comment_time: None,
                cutoff_time: filters.remove_cutoff,
                comments: vec![],
            });
        }
        return Ok(Plan::MarkStale {
            cutoff_time: filters.mark_cutoff(),
        });
    };

    if last_comment_time >= filters.remove_cutoff {
        return Ok(Plan::KeepStale {
            last_comment_time,
            cutoff_time: filters.remove_cutoff,
        });
    }

    Ok(Plan::Remove {
        last_comment_time: Some(last_comment_time),
        cutoff_time: filters.remove_cutoff,
        comments: stale_comments,
    })
}
