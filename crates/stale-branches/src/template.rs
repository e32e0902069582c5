//! Stale comment templating.
//!
//! Recognised placeholders are `{branchName}`, `{branchUrl}`, `{repoOwner}`,
//! `{repoName}`, `{author}`, `{daysBeforeBranchStale}` and
//! `{daysBeforeBranchDelete}`. Anything else is left as written.

use crate::config::Params;
use crate::types::Repo;

/// Link to a branch's tree view.
pub fn branch_url(server_url: &str, repo: &Repo, branch_name: &str) -> String {
    format!(
        "{}/{}/{}/tree/{}",
        server_url.trim_end_matches('/'),
        urlencoding::encode(&repo.owner),
        urlencoding::encode(&repo.repo),
        urlencoding::encode(branch_name)
    )
}

/// Render the stale comment for a branch.
pub fn format_comment_message(
    template: &str,
    branch_name: &str,
    author: &str,
    params: &Params,
) -> String {
    let url = branch_url(&params.server_url, &params.repo, branch_name);

    template
        .replace("{branchName}", branch_name)
        .replace("{branchUrl}", &url)
        .replace("{repoOwner}", &params.repo.owner)
        .replace("{repoName}", &params.repo.repo)
        .replace("{author}", author)
        .replace(
            "{daysBeforeBranchStale}",
            &params.days_before_branch_stale.to_string(),
        )
        .replace(
            "{daysBeforeBranchDelete}",
            &params.days_before_branch_delete.to_string(),
        )
}
