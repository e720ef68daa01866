//! File-backed source client
//!
//! Reads candidates from a YAML catalog instead of live repositories, for
//! local development and demos:
//!
//! ```yaml
//! repositories:
//!   https://github.com/example/app.git:
//!     defaultBranch: main
//!     branches:
//!       main:
//!         - version: 1a2b3c
//!           id: 1a2b3c
//!           createdAt: 2024-05-01T10:00:00Z
//!     tags:
//!       - version: v1.0.0
//!         id: 9f8e7d
//!   ghcr.io/example/app:
//!     tags:
//!       - version: 1.0.0
//!         id: sha256:abc
//!         platforms: [linux/amd64]
//!   https://charts.example.com:
//!     charts:
//!       app:
//!         - version: 0.3.1
//! ```
//!
//! The catalog is re-read on every listing so edits show up on the next
//! reconciliation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kargo_core::{CommitSelectionStrategy, Subscription};

use crate::candidate::Candidate;
use crate::client::SourceClient;
use crate::error::{Result, SourceError};

/// Catalog file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

/// What one repository offers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryEntry {
    /// Branch used when a Git subscription names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,

    /// Git branch -> commits on it
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branches: BTreeMap<String, Vec<Candidate>>,

    /// Git tags, image tags, or OCI chart versions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Candidate>,

    /// Chart name -> versions, for classic chart repositories
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub charts: BTreeMap<String, Vec<Candidate>>,
}

impl Catalog {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Candidates `subscription` would see
    pub fn candidates_for(&self, subscription: &Subscription) -> Result<Vec<Candidate>> {
        let repo_url = subscription.repo_url();
        let repo = self
            .repositories
            .get(repo_url)
            .ok_or_else(|| SourceError::RepositoryNotFound {
                repo_url: repo_url.to_string(),
            })?;

        match subscription {
            Subscription::Git(git)
                if git.commit_selection_strategy == CommitSelectionStrategy::NewestFromBranch =>
            {
                let branch = if git.branch.is_empty() {
                    repo.default_branch.as_deref().unwrap_or("main")
                } else {
                    git.branch.as_str()
                };
                repo.branches
                    .get(branch)
                    .cloned()
                    .ok_or_else(|| SourceError::BranchNotFound {
                        repo_url: repo_url.to_string(),
                        branch: branch.to_string(),
                    })
            }
            Subscription::Chart(chart) if !chart.name.is_empty() => repo
                .charts
                .get(&chart.name)
                .cloned()
                .ok_or_else(|| SourceError::ChartNotFound {
                    repo_url: repo_url.to_string(),
                    name: chart.name.clone(),
                }),
            _ => Ok(repo.tags.clone()),
        }
    }
}

/// Source client reading a [`Catalog`] from disk
#[derive(Debug, Clone)]
pub struct FileSourceClient {
    path: PathBuf,
}

impl FileSourceClient {
    /// Use the catalog at `path`; it must exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("catalog not found: {}", path.display()),
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Catalog> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Catalog::from_yaml(&content)
    }
}

#[async_trait]
impl SourceClient for FileSourceClient {
    async fn list_candidates(&self, subscription: &Subscription) -> Result<Vec<Candidate>> {
        let catalog = self.load().await?;
        let candidates = catalog.candidates_for(subscription)?;
        tracing::debug!(
            repo = subscription.repo_url(),
            count = candidates.len(),
            "listed catalog candidates"
        );
        Ok(candidates)
    }
}
