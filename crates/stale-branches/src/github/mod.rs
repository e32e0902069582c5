//! # GitHub adapter
//!
//! [`GitHubClient`] implements both ports against the GitHub API: commit
//! comments, refs and protected branches go through REST, the branch listing
//! goes through GraphQL.

mod branches;
mod comments;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StaleBranchError};
use crate::types::Repo;

pub use branches::BRANCHES_QUERY;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub API client scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http_client: reqwest::Client,
    api_url: String,
    graphql_url: String,
    repo: Repo,
}

/// GraphQL request body
#[derive(Debug, Serialize)]
struct GraphQLRequest<V: Serialize> {
    query: &'static str,
    variables: V,
}

/// GraphQL response wrapper
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

/// Error payload returned by the REST API.
#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

impl GitHubClient {
    /// Create a client for `repo` against the public GitHub endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(token: &str, repo: Repo) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("stale-branches/1.0"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| StaleBranchError::config("GitHub token is not a valid header value"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: format!("{DEFAULT_API_URL}/graphql"),
            repo,
        })
    }

    /// Point the client at another REST and GraphQL endpoint, e.g. GitHub
    /// Enterprise or a mock server.
    #[must_use]
    pub fn with_urls(mut self, api_url: &str, graphql_url: Option<&str>) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.graphql_url = match graphql_url {
            Some(url) => url.to_string(),
            None => format!("{}/graphql", self.api_url),
        };
        self
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    /// `{api_url}/repos/{owner}/{repo}{path}`
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{path}",
            self.api_url, self.repo.owner, self.repo.repo
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(%method, url, "GitHub request");
        self.http_client.request(method, url)
    }

    /// Send and map non-success statuses to [`StaleBranchError::Api`].
    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        Err(StaleBranchError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = Self::send(self.request(Method::GET, url).query(query)).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Execute a GraphQL query
    async fn graphql<V: Serialize + Send, R: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: V,
    ) -> Result<R> {
        let request = GraphQLRequest { query, variables };
        let response =
            Self::send(self.request(Method::POST, &self.graphql_url).json(&request)).await?;
        let text = response.text().await?;
        let gql_response: GraphQLResponse<R> = serde_json::from_str(&text)?;

        if let Some(errors) = gql_response.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(StaleBranchError::GraphQl(messages.join(", ")));
        }

        gql_response.data.ok_or_else(|| {
            StaleBranchError::InvalidResponse("GraphQL response has no data".to_string())
        })
    }
}
