//! CLI error types with exit code handling
//!
//! Every command returns [`CliError`], which knows both how to render itself
//! through miette and which exit code the process should end with.

use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// One or more manifests failed validation
    #[error("Linting failed with {errors} error(s) in {files} file(s)")]
    #[diagnostic(code(kargo::cli::lint))]
    LintFailed { errors: usize, files: usize },

    /// Configuration could not be loaded or is unusable
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kargo::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(kargo::cli::io))]
    Io { message: String },

    /// Cluster connection or watch failure
    #[error("Kubernetes error: {0}")]
    #[diagnostic(code(kargo::cli::kube))]
    Kube(#[from] kargo_kube::KubeError),

    #[error("Internal error: {message}")]
    #[diagnostic(code(kargo::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::LintFailed { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Kube(_) | CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
