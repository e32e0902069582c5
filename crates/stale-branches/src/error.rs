//! Error types for the stale branch engine.

use thiserror::Error;

/// Errors raised while configuring or running a stale branch sweep.
#[derive(Debug, Error)]
pub enum StaleBranchError {
    /// Configuration is inconsistent; raised before any remote call.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A configured pattern failed to compile.
    #[error("Invalid {name} pattern: {source}")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub answered with a non-success status
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The GraphQL endpoint reported errors
    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    /// The remote payload was missing data we rely on
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The branch was deleted but some of its stale comments remain
    #[error("Branch deleted but {failed} of {total} stale comments could not be removed")]
    IncompleteCleanup { failed: usize, total: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StaleBranchError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = StaleBranchError> = std::result::Result<T, E>;
