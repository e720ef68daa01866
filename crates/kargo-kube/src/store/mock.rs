//! Mock object store for testing
//!
//! Keeps objects in memory, counts operations and lets tests inject
//! failures for a whole operation or for one named object.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use kargo_core::{Freight, Stage, WarehouseStatus};

use super::{CreateOutcome, ObjectStore};
use crate::error::{KubeError, Result};

/// Operations a test can count or break
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetNamespace,
    CreateNamespace,
    SetNamespaceOwner,
    CreateRoleBinding,
    ListStages,
    PatchStage,
    PatchWarehouseStatus,
    CreateFreight,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub gets: usize,
    pub lists: usize,
    pub creates: usize,
    pub patches: usize,
}

type Key = (String, String);

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, Namespace>,
    role_bindings: BTreeMap<Key, RoleBinding>,
    stages: BTreeMap<Key, Stage>,
    warehouse_statuses: BTreeMap<Key, WarehouseStatus>,
    freight: BTreeMap<Key, Freight>,
}

/// In-memory object store for testing
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<RwLock<State>>,
    /// (operation, object name or None for every object) -> message
    failures: Arc<RwLock<HashMap<(Operation, Option<String>), String>>>,
    delay: Option<Duration>,
    operations: Arc<RwLock<OperationCounts>>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated namespaces
    pub fn with_namespaces(self, namespaces: Vec<Namespace>) -> Self {
        {
            let mut state = self.state.write().unwrap();
            for ns in namespaces {
                let name = ns.metadata.name.clone().unwrap_or_default();
                state.namespaces.insert(name, ns);
            }
        }
        self
    }

    /// Create with pre-populated Stages
    pub fn with_stages(self, stages: Vec<Stage>) -> Self {
        {
            let mut state = self.state.write().unwrap();
            for stage in stages {
                let k = key(
                    stage.metadata.namespace.as_deref().unwrap_or_default(),
                    stage.metadata.name.as_deref().unwrap_or_default(),
                );
                state.stages.insert(k, stage);
            }
        }
        self
    }

    /// Make `operation` fail for every object
    pub fn fail(self, operation: Operation, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert((operation, None), message.to_string());
        self
    }

    /// Make `operation` fail for the object called `name`
    pub fn fail_for(self, operation: Operation, name: &str, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert((operation, Some(name.to_string())), message.to_string());
        self
    }

    /// Sleep this long before every operation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state.read().unwrap().namespaces.get(name).cloned()
    }

    pub fn role_binding(&self, namespace: &str, name: &str) -> Option<RoleBinding> {
        self.state
            .read()
            .unwrap()
            .role_bindings
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn stage(&self, namespace: &str, name: &str) -> Option<Stage> {
        self.state
            .read()
            .unwrap()
            .stages
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn warehouse_status(&self, namespace: &str, name: &str) -> Option<WarehouseStatus> {
        self.state
            .read()
            .unwrap()
            .warehouse_statuses
            .get(&key(namespace, name))
            .cloned()
    }

    /// All Freight in a namespace
    pub fn freight(&self, namespace: &str) -> Vec<Freight> {
        self.state
            .read()
            .unwrap()
            .freight
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, f)| f.clone())
            .collect()
    }

    /// Total number of objects created through the store
    pub fn object_count(&self) -> usize {
        let state = self.state.read().unwrap();
        state.namespaces.len() + state.role_bindings.len() + state.freight.len()
    }

    /// Count the call, wait out any delay and apply injected failures
    async fn enter(&self, operation: Operation, name: &str) -> Result<()> {
        {
            let mut ops = self.operations.write().unwrap();
            match operation {
                Operation::GetNamespace => ops.gets += 1,
                Operation::ListStages => ops.lists += 1,
                Operation::CreateNamespace
                | Operation::CreateRoleBinding
                | Operation::CreateFreight => ops.creates += 1,
                Operation::SetNamespaceOwner
                | Operation::PatchStage
                | Operation::PatchWarehouseStatus => ops.patches += 1,
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failures = self.failures.read().unwrap();
        let message = failures
            .get(&(operation, Some(name.to_string())))
            .or_else(|| failures.get(&(operation, None)));
        match message {
            Some(message) => Err(KubeError::Store(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        self.enter(Operation::GetNamespace, name).await?;
        Ok(self.namespace(name))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> CreateOutcome {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        if let Err(e) = self.enter(Operation::CreateNamespace, &name).await {
            return CreateOutcome::Failed(e);
        }

        let mut state = self.state.write().unwrap();
        if state.namespaces.contains_key(&name) {
            return CreateOutcome::AlreadyExists;
        }
        state.namespaces.insert(name, namespace.clone());
        CreateOutcome::Created
    }

    async fn set_namespace_owner(&self, name: &str, owner: &OwnerReference) -> Result<()> {
        self.enter(Operation::SetNamespaceOwner, name).await?;

        let mut state = self.state.write().unwrap();
        let ns = state
            .namespaces
            .get_mut(name)
            .ok_or_else(|| KubeError::NotFound {
                kind: "Namespace",
                name: name.to_string(),
                namespace: None,
            })?;
        ns.metadata.owner_references = Some(vec![owner.clone()]);
        Ok(())
    }

    async fn create_role_binding(&self, binding: &RoleBinding) -> CreateOutcome {
        let namespace = binding.metadata.namespace.clone().unwrap_or_default();
        let name = binding.metadata.name.clone().unwrap_or_default();
        if let Err(e) = self.enter(Operation::CreateRoleBinding, &name).await {
            return CreateOutcome::Failed(e);
        }

        let mut state = self.state.write().unwrap();
        if !state.namespaces.contains_key(&namespace) {
            return CreateOutcome::Failed(KubeError::NotFound {
                kind: "Namespace",
                name: namespace,
                namespace: None,
            });
        }
        let k = (namespace, name);
        if state.role_bindings.contains_key(&k) {
            return CreateOutcome::AlreadyExists;
        }
        state.role_bindings.insert(k, binding.clone());
        CreateOutcome::Created
    }

    async fn list_stages(&self) -> Result<Vec<Stage>> {
        self.enter(Operation::ListStages, "").await?;
        Ok(self.state.read().unwrap().stages.values().cloned().collect())
    }

    async fn patch_stage_annotation(
        &self,
        namespace: &str,
        name: &str,
        annotation: &str,
        value: &str,
    ) -> Result<()> {
        self.enter(Operation::PatchStage, name).await?;

        let mut state = self.state.write().unwrap();
        let stage = state
            .stages
            .get_mut(&key(namespace, name))
            .ok_or_else(|| KubeError::NotFound {
                kind: "Stage",
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
            })?;
        stage
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(annotation.to_string(), value.to_string());
        Ok(())
    }

    async fn patch_warehouse_status(
        &self,
        namespace: &str,
        name: &str,
        status: &WarehouseStatus,
    ) -> Result<()> {
        self.enter(Operation::PatchWarehouseStatus, name).await?;
        self.state
            .write()
            .unwrap()
            .warehouse_statuses
            .insert(key(namespace, name), status.clone());
        Ok(())
    }

    async fn create_freight(&self, freight: &Freight) -> CreateOutcome {
        let namespace = freight.metadata.namespace.clone().unwrap_or_default();
        let name = freight.metadata.name.clone().unwrap_or_default();
        if let Err(e) = self.enter(Operation::CreateFreight, &name).await {
            return CreateOutcome::Failed(e);
        }

        let mut state = self.state.write().unwrap();
        let k = (namespace, name);
        if state.freight.contains_key(&k) {
            return CreateOutcome::AlreadyExists;
        }
        state.freight.insert(k, freight.clone());
        CreateOutcome::Created
    }
}
