//! Object stores
//!
//! Everything the reconcilers and webhooks read from or write to the cluster
//! goes through [`ObjectStore`]:
//! - **KubeStore**: the real API server, via `kube::Api`
//! - **MockStore**: in-memory, for unit tests without a cluster

mod cluster;
mod mock;

pub use cluster::KubeStore;
pub use mock::{MockStore, Operation, OperationCounts};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

use kargo_core::{Freight, Stage, WarehouseStatus};

use crate::error::{KubeError, Result};

/// Result of an idempotent create
///
/// Callers that may be retried treat `AlreadyExists` as success.
#[derive(Debug)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
    Failed(KubeError),
}

impl CreateOutcome {
    /// Classify the result of a plain create call
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Created,
            Err(e) if e.is_already_exists() => Self::AlreadyExists,
            Err(e) => Self::Failed(e),
        }
    }

    /// `Ok(true)` if the object was created by this call, `Ok(false)` if it
    /// was already there
    pub fn into_result(self) -> Result<bool> {
        match self {
            Self::Created => Ok(true),
            Self::AlreadyExists => Ok(false),
            Self::Failed(e) => Err(e),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Cluster operations used by this crate
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get a namespace; `None` if it does not exist
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;

    async fn create_namespace(&self, namespace: &Namespace) -> CreateOutcome;

    /// Make `owner` the only owner of a namespace
    async fn set_namespace_owner(&self, name: &str, owner: &OwnerReference) -> Result<()>;

    async fn create_role_binding(&self, binding: &RoleBinding) -> CreateOutcome;

    /// List Stages across all namespaces
    async fn list_stages(&self) -> Result<Vec<Stage>>;

    /// Merge-patch a single annotation onto a Stage
    async fn patch_stage_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<()>;

    /// Replace the status of a Warehouse
    async fn patch_warehouse_status(
        &self,
        namespace: &str,
        name: &str,
        status: &WarehouseStatus,
    ) -> Result<()>;

    async fn create_freight(&self, freight: &Freight) -> CreateOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_outcome_classification() {
        assert!(matches!(CreateOutcome::from_result(Ok(())), CreateOutcome::Created));

        let exists = KubeError::AlreadyExists {
            kind: "Namespace",
            name: "team1".to_string(),
            namespace: None,
        };
        let outcome = CreateOutcome::from_result(Err(exists));
        assert!(outcome.is_success());
        assert!(!outcome.into_result().unwrap());

        let conflict = KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        }));
        assert!(matches!(
            CreateOutcome::from_result(Err(conflict)),
            CreateOutcome::Failed(_)
        ));

        let outcome = CreateOutcome::from_result(Err(KubeError::Store("boom".to_string())));
        assert!(!outcome.is_success());
        assert!(outcome.into_result().is_err());
    }
}
