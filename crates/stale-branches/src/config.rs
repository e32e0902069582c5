//! Run configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Result, StaleBranchError};
use crate::types::Repo;

/// Default stale comment. `{author}` is replaced by the resolved recipient.
pub const DEFAULT_MESSAGE: &str = "@{author} Your branch [{branchName}]({branchUrl}) hasn't been updated in the last 60 days and is marked as stale. It will be removed in a week.\r\nIf you want to keep this branch around, delete this comment or add new commits to this branch.";
pub const DEFAULT_PROTECTED_BRANCHES: &str = "^(master|main)$";
pub const DEFAULT_OPERATIONS_PER_RUN: usize = 10;
pub const DEFAULT_DAYS_BEFORE_DELETE: u32 = 7;
pub const DEFAULT_DAYS_BEFORE_STALE: u32 = 90;
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Settings for one sweep over a repository's branches.
#[derive(Debug, Clone)]
pub struct Params {
    pub repo: Repo,
    /// Log what would happen without touching the repository.
    pub dry_run: bool,
    pub days_before_branch_stale: u32,
    /// Grace period between marking a branch and removing it.
    pub days_before_branch_delete: u32,
    pub stale_comment_message: String,
    /// Branches matching this are never touched.
    pub protected_branches_regex: Option<String>,
    /// When set, only branches matching this are considered.
    pub allowed_branches_regex: Option<String>,
    pub protected_authors_regex: Option<String>,
    pub protected_organization_name: Option<String>,
    pub exempt_protected_branches: bool,
    /// Cap on mark/remove operations per run.
    pub operations_per_run: usize,
    pub default_recipient: Option<String>,
    /// Process branches whose author is not linked to an account.
    pub ignore_unknown_authors: bool,
    /// Leave branches with open pull requests alone.
    pub ignore_branches_with_open_prs: bool,
    /// Username to display name used in stale comments.
    pub remap_authors: HashMap<String, String>,
    /// Base URL for branch links in comments.
    pub server_url: String,
    /// Pause before posting a comment.
    pub comment_delay: Duration,
    /// Pause before deleting a branch.
    pub delete_delay: Duration,
}

impl Params {
    /// Defaults for the given repository.
    #[must_use]
    pub fn new(repo: Repo) -> Self {
        Self {
            repo,
            dry_run: false,
            days_before_branch_stale: DEFAULT_DAYS_BEFORE_STALE,
            days_before_branch_delete: DEFAULT_DAYS_BEFORE_DELETE,
            stale_comment_message: DEFAULT_MESSAGE.to_string(),
            protected_branches_regex: Some(DEFAULT_PROTECTED_BRANCHES.to_string()),
            allowed_branches_regex: None,
            protected_authors_regex: None,
            protected_organization_name: None,
            exempt_protected_branches: true,
            operations_per_run: DEFAULT_OPERATIONS_PER_RUN,
            default_recipient: None,
            ignore_unknown_authors: false,
            ignore_branches_with_open_prs: false,
            remap_authors: HashMap::new(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            comment_delay: Duration::ZERO,
            delete_delay: Duration::ZERO,
        }
    }

    /// Check settings that must hold before any remote call.
    pub fn validate(&self) -> Result<()> {
        if self.repo.owner.is_empty() || self.repo.repo.is_empty() {
            return Err(StaleBranchError::config("repository owner and name are required"));
        }

        if self.ignore_unknown_authors && self.default_recipient().is_none() {
            return Err(StaleBranchError::config(
                "a default recipient must be set when unknown authors are ignored",
            ));
        }

        if self.remap_authors.keys().any(|k| k.trim().is_empty()) {
            return Err(StaleBranchError::config("author remap keys must not be empty"));
        }

        Ok(())
    }

    /// Default recipient, treating an empty value as unset.
    pub fn default_recipient(&self) -> Option<&str> {
        self.default_recipient
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Parse the author remap table from a JSON object of strings.
pub fn parse_remap_authors(raw: &str) -> Result<HashMap<String, String>> {
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }

    serde_json::from_str(raw).map_err(|e| {
        StaleBranchError::config(format!(
            "author remap must be a JSON object of username to name: {e}"
        ))
    })
}

/// Treat empty inputs as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        Params::new(Repo::new("github", "octocat"))
    }

    #[test]
    fn test_defaults() {
        let params = params();
        assert_eq!(params.days_before_branch_stale, 90);
        assert_eq!(params.days_before_branch_delete, 7);
        assert_eq!(params.operations_per_run, 10);
        assert_eq!(
            params.protected_branches_regex.as_deref(),
            Some("^(master|main)$")
        );
        assert!(!params.dry_run);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_ignore_unknown_authors_requires_default_recipient() {
        let mut params = params();
        params.ignore_unknown_authors = true;
        assert!(matches!(
            params.validate(),
            Err(StaleBranchError::Config(_))
        ));

        params.default_recipient = Some("  ".to_string());
        assert!(params.validate().is_err());

        params.default_recipient = Some("octocat".to_string());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_missing_repo_is_rejected() {
        let params = Params::new(Repo::new("", "octocat"));
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_parse_remap_authors() {
        let map = parse_remap_authors(r#"{"user1": "Remapped User"}"#).unwrap();
        assert_eq!(map.get("user1").map(String::as_str), Some("Remapped User"));

        assert!(parse_remap_authors("").unwrap().is_empty());
        assert!(parse_remap_authors("[1, 2]").is_err());
        assert!(parse_remap_authors(r#"{"user1": 3}"#).is_err());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some(" ".to_string())), None);
        assert_eq!(non_empty(Some("x".to_string())), Some("x".to_string()));
    }
}
