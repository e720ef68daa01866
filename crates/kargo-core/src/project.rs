//! Project: the unit of tenancy
//!
//! A Project's name doubles as the name of the namespace its other resources
//! live in.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(group = "kargo.akuity.io", version = "v1alpha1", kind = "Project")]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Per-Stage promotion policies; each Stage may appear at most once
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub promotion_policies: Vec<PromotionPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPolicy {
    /// Name of the Stage this policy applies to
    pub stage: String,

    /// Promote new Freight into the Stage without human approval
    #[serde(default)]
    pub auto_promotion_enabled: bool,
}

impl Project {
    /// Name of the namespace backing this Project
    pub fn namespace_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// UID assigned by the API server, if any
    pub fn uid(&self) -> Option<&str> {
        self.metadata.uid.as_deref()
    }
}
