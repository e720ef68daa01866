//! Candidate versions offered by a repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One version a repository offers
///
/// The meaning of the fields depends on the repository kind:
///
/// | kind  | `version`           | `id`        |
/// |-------|---------------------|-------------|
/// | Git   | tag, or commit hash for branch heads | commit hash |
/// | Image | tag                 | digest      |
/// | Chart | chart version       | unused      |
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Commit or build time, when the repository reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// `<os>/<arch>` pairs an image is available for; empty means unknown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,
}

impl Candidate {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the candidate can run on `platform`
    ///
    /// Candidates that do not advertise platforms are assumed to run anywhere.
    pub fn supports_platform(&self, platform: &str) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|p| p == platform)
    }
}
