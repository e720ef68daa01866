//! Freight: an immutable bundle of artifact versions
//!
//! Freight is content-addressed. Its object name is a SHA256 digest over a
//! canonical rendering of the Warehouse it came from and the artifacts it
//! holds, so two reconciliations that resolve the same versions produce an
//! object with the same name and the second create is a no-op.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::labels::WAREHOUSE_LABEL;

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kargo.akuity.io",
    version = "v1alpha1",
    kind = "Freight",
    plural = "freights",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct FreightSpec {
    /// Warehouse that produced this Freight
    pub warehouse: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<GitCommit>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,
}

/// A specific commit of a Git repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitCommit {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    /// Commit hash
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// A specific version of a container image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(default, rename = "gitRepoURL", skip_serializing_if = "Option::is_none")]
    pub git_repo_url: Option<String>,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// A specific version of a Helm chart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: String,
}

impl FreightSpec {
    /// Content fingerprint: hex SHA256 over the sorted artifact lines
    ///
    /// Independent of the order artifacts were added in.
    pub fn fingerprint(&self) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(
            self.commits.len() + self.images.len() + self.charts.len(),
        );
        for commit in &self.commits {
            lines.push(format!("git:{}:{}", commit.repo_url, commit.id));
        }
        for image in &self.images {
            lines.push(format!(
                "image:{}:{}@{}",
                image.repo_url,
                image.tag,
                image.digest.as_deref().unwrap_or_default()
            ));
        }
        for chart in &self.charts {
            lines.push(format!(
                "chart:{}/{}:{}",
                chart.repo_url,
                chart.name.as_deref().unwrap_or_default(),
                chart.version
            ));
        }
        lines.sort();

        let mut hasher = Sha256::new();
        hasher.update(self.warehouse.as_bytes());
        for line in &lines {
            hasher.update(b"\n");
            hasher.update(line.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Whether this bundle holds no artifacts at all
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.images.is_empty() && self.charts.is_empty()
    }

    /// Build the Freight object, named by its fingerprint
    pub fn into_freight(self, namespace: &str) -> Freight {
        let name = self.fingerprint();
        let mut freight = Freight::new(&name, self);
        freight.metadata.namespace = Some(namespace.to_string());
        freight.metadata.labels = Some(BTreeMap::from([(
            WAREHOUSE_LABEL.to_string(),
            freight.spec.warehouse.clone(),
        )]));
        freight
    }
}
