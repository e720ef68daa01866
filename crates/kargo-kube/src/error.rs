//! Error types for kargo-kube

use thiserror::Error;

/// Result type for kargo-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during Kubernetes operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Object not found
    #[error("{kind} '{name}' not found{}", in_namespace(.namespace))]
    NotFound {
        kind: &'static str,
        name: String,
        namespace: Option<String>,
    },

    /// Object already exists
    #[error("{kind} '{name}' already exists{}", in_namespace(.namespace))]
    AlreadyExists {
        kind: &'static str,
        name: String,
        namespace: Option<String>,
    },

    /// Listing candidates from an artifact source failed
    #[error("error listing candidates for {subscription}: {source}")]
    Source {
        subscription: String,
        #[source]
        source: kargo_source::SourceError,
    },

    /// A subscription's filters could not be compiled
    #[error(transparent)]
    Selection(#[from] kargo_source::SelectionError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Injected or otherwise opaque store failure
    #[error("store error: {0}")]
    Store(String),
}

fn in_namespace(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!(" in namespace '{}'", ns),
        None => String::new(),
    }
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::NotFound { .. })
            || matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Check if this is a create rejected because the object exists
    ///
    /// Other 409s, such as a stale resourceVersion, are not.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, KubeError::AlreadyExists { .. })
            || matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.reason == "AlreadyExists")
    }
}
