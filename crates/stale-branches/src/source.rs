//! Branch source port and the paging reader built on it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{Branch, Repo};

/// Default number of branches requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Parameters for one page request.
#[derive(Debug, Clone)]
pub struct BranchQuery<'a> {
    pub repo: &'a Repo,
    /// Cursor returned with the previous page.
    pub after: Option<&'a str>,
    /// Organization whose membership is resolved for each author.
    pub organization: Option<&'a str>,
    pub page_size: usize,
}

/// One page of fully resolved branches.
#[derive(Debug, Clone, Default)]
pub struct BranchPage {
    pub branches: Vec<Branch>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Lists the branches under `refs/heads/`, one page per call.
#[async_trait]
pub trait BranchSource: Send + Sync {
    async fn fetch_branch_page(&self, query: &BranchQuery<'_>) -> Result<BranchPage>;
}

/// Walks a [`BranchSource`] page by page, hiding the cursor.
///
/// A reader is single-use: once exhausted or failed it yields nothing more.
/// Create a new one to start over from the first page.
pub struct BranchReader {
    source: Arc<dyn BranchSource>,
    repo: Repo,
    organization: Option<String>,
    page_size: usize,
    cursor: Option<String>,
    has_more: bool,
    pages_read: usize,
}

impl BranchReader {
    pub fn new(source: Arc<dyn BranchSource>, repo: Repo, organization: Option<String>) -> Self {
        Self {
            source,
            repo,
            organization,
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
            has_more: true,
            pages_read: 0,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Whether another call to [`next_batch`](Self::next_batch) may yield branches.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Fetch the next page. Returns `None` once the listing is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Branch>>> {
        if !self.has_more {
            return Ok(None);
        }

        let query = BranchQuery {
            repo: &self.repo,
            after: self.cursor.as_deref(),
            organization: self.organization.as_deref(),
            page_size: self.page_size,
        };

        let page = match self.source.fetch_branch_page(&query).await {
            Ok(page) => page,
            Err(e) => {
                self.has_more = false;
                return Err(e);
            }
        };

        self.pages_read += 1;
        debug!(
            page = self.pages_read,
            branches = page.branches.len(),
            has_next_page = page.has_next_page,
            "Fetched branch page"
        );

        self.has_more = page.has_next_page;
        if self.has_more && page.end_cursor.is_none() {
            warn!("Branch page claims more results but has no cursor, stopping");
            self.has_more = false;
        }
        self.cursor = page.end_cursor;

        Ok(Some(page.branches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StaticBranchSource;
    use chrono::Utc;

    fn branch(name: &str) -> Branch {
        Branch {
            branch_name: name.to_string(),
            prefix: "refs/heads/".to_string(),
            commit_id: format!("sha-{name}"),
            date: Utc::now(),
            author: None,
            is_protected: false,
            open_prs: false,
        }
    }

    #[tokio::test]
    async fn test_reads_all_pages_in_order() {
        let source = StaticBranchSource::new(
            (1..=5).map(|i| branch(&format!("branch{i}"))).collect(),
        );
        let mut reader = BranchReader::new(Arc::new(source), Repo::new("github", "octocat"), None)
            .with_page_size(2);

        let mut names = vec![];
        while let Some(batch) = reader.next_batch().await.unwrap() {
            assert!(batch.len() <= 2);
            names.extend(batch.into_iter().map(|b| b.branch_name));
        }

        assert_eq!(names, ["branch1", "branch2", "branch3", "branch4", "branch5"]);
        assert_eq!(reader.pages_read(), 3);
        assert!(!reader.has_more());
        assert!(reader.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let source = StaticBranchSource::new(vec![]);
        let mut reader = BranchReader::new(Arc::new(source), Repo::new("github", "octocat"), None);

        assert_eq!(reader.next_batch().await.unwrap(), Some(vec![]));
        assert!(reader.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_ends_the_listing() {
        let source = StaticBranchSource::new(vec![branch("a"), branch("b")]).fail_after_pages(1);
        let mut reader = BranchReader::new(Arc::new(source), Repo::new("github", "octocat"), None)
            .with_page_size(1);

        assert!(reader.next_batch().await.unwrap().is_some());
        assert!(reader.next_batch().await.is_err());
        assert!(!reader.has_more());
        assert!(reader.next_batch().await.unwrap().is_none());
    }
}
