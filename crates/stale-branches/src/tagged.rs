//! Tagged commit comments.
//!
//! A tagged comment starts with `[<tag>]`, a blank line, then free text. The
//! stale marker for a branch uses the tag `stale:<branch name>`; comments
//! without that exact prefix are ignored even on the same commit.

use crate::error::Result;
use crate::store::CommentStore;
use crate::types::CommitComment;

/// Tag marking a branch as stale.
pub fn stale_tag(branch_name: &str) -> String {
    format!("stale:{branch_name}")
}

/// Body as stored: `[<tag>]\r\n\r\n<body>`.
pub fn format_tagged_body(tag: &str, body: &str) -> String {
    format!("[{tag}]\r\n\r\n{body}")
}

pub fn has_tag(body: &str, tag: &str) -> bool {
    body.strip_prefix('[')
        .and_then(|rest| rest.strip_prefix(tag))
        .is_some_and(|rest| rest.starts_with(']'))
}

/// Tag-aware view over a [`CommentStore`].
#[derive(Clone, Copy)]
pub struct TaggedComments<'a> {
    store: &'a dyn CommentStore,
}

impl<'a> TaggedComments<'a> {
    pub fn new(store: &'a dyn CommentStore) -> Self {
        Self { store }
    }

    /// Comments on `commit_sha` carrying `tag`.
    pub async fn comments_with_tag(
        &self,
        commit_sha: &str,
        tag: &str,
    ) -> Result<Vec<CommitComment>> {
        let comments = self.store.list_commit_comments(commit_sha).await?;
        Ok(comments
            .into_iter()
            .filter(|c| has_tag(&c.body, tag))
            .collect())
    }

    pub async fn add_tagged_comment(&self, commit_sha: &str, tag: &str, body: &str) -> Result<()> {
        self.store
            .create_commit_comment(commit_sha, &format_tagged_body(tag, body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCommentStore;
    use chrono::Utc;

    #[test]
    fn test_format_tagged_body() {
        assert_eq!(
            format_tagged_body("stale:feature-branch", "Test comment"),
            "[stale:feature-branch]\r\n\r\nTest comment"
        );
    }

    #[test]
    fn test_has_tag_requires_exact_tag() {
        let tag = stale_tag("feature");
        assert!(has_tag("[stale:feature]\r\n\r\nhello", &tag));
        assert!(has_tag("[stale:feature] Comment 1", &tag));
        assert!(!has_tag("[stale:feature-2]\r\n\r\nhello", &tag));
        assert!(!has_tag("[stale:feat]\r\n\r\nhello", &tag));
        assert!(!has_tag("Other comment [stale:feature]", &tag));
        assert!(!has_tag("[stale:feature", &tag));
    }

    #[tokio::test]
    async fn test_filters_comments_by_tag() {
        let store = InMemoryCommentStore::new();
        store.insert_comment("abc123", "[stale:feature-branch] Comment 1", Utc::now());
        store.insert_comment("abc123", "Other comment", Utc::now());
        store.insert_comment("other", "[stale:feature-branch] elsewhere", Utc::now());

        let tagged = TaggedComments::new(&store);
        let comments = tagged
            .comments_with_tag("abc123", &stale_tag("feature-branch"))
            .await
            .unwrap();

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].body, "[stale:feature-branch] Comment 1");
    }

    #[tokio::test]
    async fn test_written_tag_is_read_back() {
        let store = InMemoryCommentStore::new();
        let tagged = TaggedComments::new(&store);
        let tag = stale_tag("feature/x");

        tagged
            .add_tagged_comment("abc123", &tag, "marked")
            .await
            .unwrap();
        tagged
            .add_tagged_comment("abc123", &stale_tag("feature/xy"), "other branch")
            .await
            .unwrap();

        let comments = tagged.comments_with_tag("abc123", &tag).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].body, "[stale:feature/x]\r\n\r\nmarked");
    }
}
