//! Kubernetes API backed object store

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Client;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use serde_json::json;

use kargo_core::{Freight, Stage, Warehouse, WarehouseStatus};

use super::{CreateOutcome, ObjectStore};
use crate::error::{KubeError, Result};

/// Object store talking to the API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Connect using the default kubeconfig / in-cluster configuration
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// Create with an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> CreateOutcome {
        let api: Api<Namespace> = Api::all(self.client.clone());
        CreateOutcome::from_result(
            api.create(&PostParams::default(), namespace)
                .await
                .map(|_| ())
                .map_err(KubeError::from),
        )
    }

    async fn set_namespace_owner(&self, name: &str, owner: &OwnerReference) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let patch = json!({ "metadata": { "ownerReferences": [owner] } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn create_role_binding(&self, binding: &RoleBinding) -> CreateOutcome {
        let namespace = binding.metadata.namespace.as_deref().unwrap_or_default();
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        CreateOutcome::from_result(
            api.create(&PostParams::default(), binding)
                .await
                .map(|_| ())
                .map_err(KubeError::from),
        )
    }

    async fn list_stages(&self) -> Result<Vec<Stage>> {
        let api: Api<Stage> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn patch_stage_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let api: Api<Stage> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "metadata": { "annotations": { key: value } } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_warehouse_status(
        &self,
        namespace: &str,
        name: &str,
        status: &WarehouseStatus,
    ) -> Result<()> {
        let api: Api<Warehouse> = Api::namespaced(self.client.clone(), namespace);
        // Both fields are always sent so that an empty error clears the old one
        let patch = json!({
            "status": {
                "error": status.error,
                "observedGeneration": status.observed_generation,
            }
        });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn create_freight(&self, freight: &Freight) -> CreateOutcome {
        let namespace = freight.metadata.namespace.as_deref().unwrap_or_default();
        let api: Api<Freight> = Api::namespaced(self.client.clone(), namespace);
        CreateOutcome::from_result(
            api.create(&PostParams::default(), freight)
                .await
                .map(|_| ())
                .map_err(KubeError::from),
        )
    }
}
