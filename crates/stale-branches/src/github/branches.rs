//! GraphQL side of the adapter: the paged branch listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::GitHubClient;
use crate::error::{Result, StaleBranchError};
use crate::source::{BranchPage, BranchQuery, BranchSource};
use crate::types::{Author, Branch};

/// Branches under `refs/heads/` with their tip commit, protection and open
/// pull requests. Organization membership is only resolved when
/// `$withOrganization` is set.
pub const BRANCHES_QUERY: &str = r#"query ($owner: String!, $repo: String!, $after: String, $pageSize: Int!, $organization: String!, $withOrganization: Boolean!) {
  repository(owner: $owner, name: $repo) {
    refs(refPrefix: "refs/heads/", first: $pageSize, after: $after) {
      nodes {
        name
        prefix
        branchProtectionRule {
          id
        }
        associatedPullRequests(states: OPEN) {
          totalCount
        }
        target {
          ... on Commit {
            oid
            author {
              date
              email
              user {
                login
                organization(login: $organization) @include(if: $withOrganization) {
                  id
                }
              }
            }
          }
        }
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BranchesVariables<'a> {
    owner: &'a str,
    repo: &'a str,
    after: Option<&'a str>,
    page_size: usize,
    organization: &'a str,
    with_organization: bool,
}

#[derive(Debug, Deserialize)]
struct BranchesData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    refs: Option<RefConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefConnection {
    #[serde(default)]
    nodes: Vec<Option<RefNode>>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefNode {
    name: String,
    prefix: String,
    branch_protection_rule: Option<IdNode>,
    associated_pull_requests: Option<CountNode>,
    target: Option<CommitNode>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    #[allow(dead_code)]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountNode {
    total_count: u64,
}

/// Fields are absent when the ref points at something other than a commit.
#[derive(Debug, Deserialize)]
struct CommitNode {
    oid: Option<String>,
    author: Option<GitActorNode>,
}

#[derive(Debug, Deserialize)]
struct GitActorNode {
    date: Option<String>,
    email: Option<String>,
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    login: String,
    organization: Option<IdNode>,
}

fn parse_date(raw: &str, branch: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            StaleBranchError::InvalidResponse(format!(
                "branch {branch} has an unparseable commit date {raw:?}: {e}"
            ))
        })
}

/// Convert one ref node; `None` for refs that do not point at a commit.
fn to_branch(node: RefNode) -> Result<Option<Branch>> {
    let Some(CommitNode {
        oid: Some(oid),
        author: Some(actor),
    }) = node.target
    else {
        warn!(branch = %node.name, "Ref does not point at a commit, ignoring");
        return Ok(None);
    };

    let Some(raw_date) = actor.date.as_deref() else {
        return Err(StaleBranchError::InvalidResponse(format!(
            "branch {} has no commit date",
            node.name
        )));
    };
    let date = parse_date(raw_date, &node.name)?;

    let author = actor.user.map(|user| Author {
        username: user.login,
        email: actor.email.filter(|e| !e.is_empty()),
        belongs_to_organization: user.organization.is_some(),
    });

    Ok(Some(Branch {
        branch_name: node.name,
        prefix: node.prefix,
        commit_id: oid,
        date,
        author,
        is_protected: node.branch_protection_rule.is_some(),
        open_prs: node
            .associated_pull_requests
            .is_some_and(|prs| prs.total_count > 0),
    }))
}

fn to_page(data: BranchesData) -> Result<BranchPage> {
    let refs = data
        .repository
        .and_then(|r| r.refs)
        .ok_or_else(|| StaleBranchError::InvalidResponse("repository not found".to_string()))?;

    let mut branches = Vec::with_capacity(refs.nodes.len());
    for node in refs.nodes.into_iter().flatten() {
        if let Some(branch) = to_branch(node)? {
            branches.push(branch);
        }
    }

    Ok(BranchPage {
        branches,
        end_cursor: refs.page_info.end_cursor,
        has_next_page: refs.page_info.has_next_page,
    })
}

#[async_trait]
impl BranchSource for GitHubClient {
    #[instrument(skip(self, query), fields(repo = %query.repo, after = ?query.after))]
    async fn fetch_branch_page(&self, query: &BranchQuery<'_>) -> Result<BranchPage> {
        let variables = BranchesVariables {
            owner: &query.repo.owner,
            repo: &query.repo.repo,
            after: query.after,
            page_size: query.page_size,
            organization: query.organization.unwrap_or_default(),
            with_organization: query.organization.is_some(),
        };

        let data: BranchesData = self.graphql(BRANCHES_QUERY, variables).await?;
        to_page(data)
    }
}
