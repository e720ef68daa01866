//! Core error types

use thiserror::Error;

use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid semver constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Failed to parse manifest: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Manifest document {index} has no kind")]
    MissingKind { index: usize },

    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

pub type Result<T> = std::result::Result<T, CoreError>;
