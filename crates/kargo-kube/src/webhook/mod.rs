//! Admission webhooks
//!
//! Each webhook exposes `validate_create`, `validate_update` and
//! `validate_delete`. A returned error denies the request; its [`code`]
//! is the HTTP status reported back to the API server.
//!
//! [`code`]: AdmissionError::code

mod project;
mod warehouse;

pub use project::ProjectWebhook;
pub use warehouse::WarehouseWebhook;

use std::time::Duration;
use thiserror::Error;

use kargo_core::ValidationErrors;

/// Why an admission request was denied
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The object itself is malformed
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),

    /// The object is fine but clashes with existing cluster state
    #[error("{message}")]
    Conflict { message: String },

    /// A side effect failed
    #[error("{message}")]
    Internal { message: String },

    #[error("admission request timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),
}

impl AdmissionError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Wrap a store failure with what was being attempted
    pub fn internal(context: impl std::fmt::Display, source: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: format!("{}: {}", context, source),
        }
    }

    /// HTTP status code for the admission response
    pub fn code(&self) -> u16 {
        match self {
            Self::Invalid(_) => 422,
            Self::Conflict { .. } => 409,
            Self::Internal { .. } => 500,
            Self::Timeout(_) => 504,
        }
    }

    /// Reason string, in the vocabulary of Kubernetes status objects
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "Invalid",
            Self::Conflict { .. } => "Conflict",
            Self::Internal { .. } => "InternalError",
            Self::Timeout(_) => "Timeout",
        }
    }
}

pub type AdmissionResult = std::result::Result<(), AdmissionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kargo_core::{FieldError, FieldPath};

    #[test]
    fn test_codes() {
        let invalid = AdmissionError::from(ValidationErrors(vec![FieldError::required(
            FieldPath::new("spec"),
            "required",
        )]));
        assert_eq!(invalid.code(), 422);
        assert_eq!(invalid.reason(), "Invalid");
        assert_eq!(AdmissionError::conflict("taken").code(), 409);
        assert_eq!(AdmissionError::internal("ctx", "boom").code(), 500);
        assert_eq!(AdmissionError::Timeout(Duration::from_secs(1)).code(), 504);
    }

    #[test]
    fn test_messages() {
        let err = AdmissionError::internal("error getting namespace \"team1\"", "connection refused");
        assert_eq!(
            err.to_string(),
            "error getting namespace \"team1\": connection refused"
        );
        assert_eq!(
            AdmissionError::Timeout(Duration::from_millis(1500)).to_string(),
            "admission request timed out after 1s 500ms"
        );
    }
}
