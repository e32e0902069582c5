//! Comment store port.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::CommitComment;

/// Commit comments and branch refs of one repository.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// All comments on a commit, untagged ones included.
    async fn list_commit_comments(&self, commit_sha: &str) -> Result<Vec<CommitComment>>;

    /// Post a comment on a commit.
    async fn create_commit_comment(&self, commit_sha: &str, body: &str) -> Result<()>;

    async fn delete_commit_comment(&self, comment_id: u64) -> Result<()>;

    /// Delete `<prefix>/<branch_name>`, see [`branch_ref`].
    async fn delete_branch_ref(&self, prefix: &str, branch_name: &str) -> Result<()>;

    /// Names of branches carrying a protection rule.
    async fn list_protected_branches(&self) -> Result<Vec<String>>;
}

/// Ref path relative to `refs/`, e.g. `heads/feature`.
pub fn branch_ref(prefix: &str, branch_name: &str) -> String {
    let namespace = prefix.strip_prefix("refs/").unwrap_or(prefix);
    let namespace = namespace.trim_end_matches('/');

    if namespace.is_empty() {
        branch_name.to_string()
    } else {
        format!("{namespace}/{branch_name}")
    }
}
