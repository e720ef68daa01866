//! Stage: a promotion target
//!
//! Only the part of the Stage schema the dependency index needs is modelled
//! here: the Argo CD Applications a Stage updates when it is promoted.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(group = "kargo.akuity.io", version = "v1alpha1", kind = "Stage", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    /// How Freight is promoted into this Stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_mechanisms: Option<PromotionMechanisms>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionMechanisms {
    /// Argo CD Applications updated as part of a promotion
    #[serde(default, rename = "argoCDAppUpdates", skip_serializing_if = "Vec::is_empty")]
    pub argocd_app_updates: Vec<ArgoCDAppUpdate>,
}

/// Reference to one Argo CD Application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDAppUpdate {
    pub app_name: String,

    /// Namespace of the Application; empty means Argo CD's own namespace
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_namespace: String,
}

impl ArgoCDAppUpdate {
    /// Application namespace, falling back to `default_namespace`
    pub fn app_namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        if self.app_namespace.is_empty() {
            default_namespace
        } else {
            &self.app_namespace
        }
    }
}

impl Stage {
    /// Argo CD Applications this Stage depends on
    pub fn argocd_app_updates(&self) -> &[ArgoCDAppUpdate] {
        self.spec
            .promotion_mechanisms
            .as_ref()
            .map(|m| m.argocd_app_updates.as_slice())
            .unwrap_or_default()
    }
}
