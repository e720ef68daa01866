//! Error types for artifact sources

use std::time::Duration;
use thiserror::Error;

/// Errors talking to an artifact repository
///
/// All of these are transient from a reconciler's point of view: the next
/// pass tries again.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Repository not found: {repo_url}")]
    RepositoryNotFound { repo_url: String },

    #[error("Branch {branch} not found in {repo_url}")]
    BranchNotFound { repo_url: String, branch: String },

    #[error("Chart {name} not found in {repo_url}")]
    ChartNotFound { repo_url: String, name: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request to {repo_url} timed out after {after:?}")]
    Timeout { repo_url: String, after: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog: {0}")]
    Catalog(String),
}

impl From<serde_yaml::Error> for SourceError {
    fn from(e: serde_yaml::Error) -> Self {
        SourceError::Catalog(e.to_string())
    }
}

/// A subscription whose filters cannot be compiled
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Invalid allowTags pattern '{pattern}': {source}")]
    InvalidAllowTags {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    InvalidConstraint(#[from] kargo_core::CoreError),

    #[error("Digest selection for {repo_url} needs a tag to track")]
    MissingPinnedTag { repo_url: String },
}

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;
