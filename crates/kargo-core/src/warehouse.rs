//! Warehouse: a source of Freight

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::subscription::Subscription;

/// Describes the artifact sources whose versions are bundled into Freight
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kargo.akuity.io",
    version = "v1alpha1",
    kind = "Warehouse",
    namespaced,
    status = "WarehouseStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseSpec {
    /// Repositories to watch; at least one
    pub subscriptions: Vec<Subscription>,
}

/// Most recently observed state of a Warehouse
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseStatus {
    /// Why the last reconciliation failed; empty after a successful one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// `.metadata.generation` the last successful reconciliation processed
    #[serde(default)]
    pub observed_generation: i64,
}

impl WarehouseStatus {
    /// Status after a failed pass: the message is recorded verbatim and the
    /// observed generation is left where it was
    pub fn failed(previous: &WarehouseStatus, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            observed_generation: previous.observed_generation,
        }
    }

    /// Status after a successful pass against `generation`
    pub fn succeeded(generation: i64) -> Self {
        Self {
            error: String::new(),
            observed_generation: generation,
        }
    }
}

impl Warehouse {
    /// Current status, or the empty status for never-reconciled objects
    pub fn status_or_default(&self) -> WarehouseStatus {
        self.status.clone().unwrap_or_default()
    }

    /// Current spec generation (0 when the API server has not assigned one)
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or_default()
    }

    /// Whether the status describes an older spec than the current one
    pub fn is_status_stale(&self) -> bool {
        self.status_or_default().observed_generation < self.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::GitSubscription;

    fn warehouse(generation: i64, status: Option<WarehouseStatus>) -> Warehouse {
        let mut warehouse = Warehouse::new(
            "main",
            WarehouseSpec {
                subscriptions: vec![Subscription::Git(GitSubscription {
                    repo_url: "https://github.com/example/app.git".to_string(),
                    ..Default::default()
                })],
            },
        );
        warehouse.metadata.generation = Some(generation);
        warehouse.status = status;
        warehouse
    }

    #[test]
    fn test_stale_status() {
        assert!(warehouse(2, None).is_status_stale());
        assert!(warehouse(2, Some(WarehouseStatus::succeeded(1))).is_status_stale());
        assert!(!warehouse(2, Some(WarehouseStatus::succeeded(2))).is_status_stale());
    }

    #[test]
    fn test_failed_keeps_generation() {
        let previous = WarehouseStatus::succeeded(3);
        let failed = WarehouseStatus::failed(&previous, "boom");
        assert_eq!(failed.error, "boom");
        assert_eq!(failed.observed_generation, 3);
    }

    #[test]
    fn test_status_serialization_omits_empty_error() {
        let json = serde_json::to_value(WarehouseStatus::succeeded(4)).unwrap();
        assert_eq!(json, serde_json::json!({ "observedGeneration": 4 }));
    }
}
