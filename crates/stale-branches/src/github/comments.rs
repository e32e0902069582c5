//! REST side of the adapter: commit comments, refs and protected branches.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::GitHubClient;
use crate::error::Result;
use crate::store::{branch_ref, CommentStore};
use crate::types::CommitComment;

const PER_PAGE: usize = 100;

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitHubBranch {
    name: String,
}

/// Percent-encode each path segment of a ref, keeping the separators.
fn encode_ref(reference: &str) -> String {
    reference
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl GitHubClient {
    /// Fetch every page of a list endpoint.
    async fn get_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query = extra.to_vec();
            query.push(("per_page", PER_PAGE.to_string()));
            query.push(("page", page.to_string()));

            let batch: Vec<T> = self.get_json(url, &query).await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl CommentStore for GitHubClient {
    #[instrument(skip(self))]
    async fn list_commit_comments(&self, commit_sha: &str) -> Result<Vec<CommitComment>> {
        let url = self.repo_url(&format!("/commits/{commit_sha}/comments"));
        self.get_all_pages(&url, &[]).await
    }

    #[instrument(skip(self, body))]
    async fn create_commit_comment(&self, commit_sha: &str, body: &str) -> Result<()> {
        let url = self.repo_url(&format!("/commits/{commit_sha}/comments"));
        Self::send(
            self.request(Method::POST, &url)
                .json(&CreateCommentRequest { body }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_commit_comment(&self, comment_id: u64) -> Result<()> {
        let url = self.repo_url(&format!("/comments/{comment_id}"));
        Self::send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_branch_ref(&self, prefix: &str, branch_name: &str) -> Result<()> {
        let reference = encode_ref(&branch_ref(prefix, branch_name));
        let url = self.repo_url(&format!("/git/refs/{reference}"));
        Self::send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_protected_branches(&self) -> Result<Vec<String>> {
        let url = self.repo_url("/branches");
        let branches: Vec<GitHubBranch> = self
            .get_all_pages(&url, &[("protected", "true".to_string())])
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }
}
