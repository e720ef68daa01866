//! Project admission
//!
//! Creating a Project synchronously provisions its namespace and grants the
//! API server access to Secrets in it, since the objects that follow a
//! Project in a manifest usually live in that namespace.

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

use kargo_core::labels::rbac::{
    API_SERVER_SERVICE_ACCOUNT, RBAC_API_GROUP, SECRET_MANAGER_CLUSTER_ROLE, SECRETS_ROLE_BINDING,
};
use kargo_core::labels::{FINALIZER, LABEL_TRUE, PROJECT_LABEL};
use kargo_core::validation::validate_project_spec;
use kargo_core::{FieldPath, Project};

use super::{AdmissionError, AdmissionResult};
use crate::config::WebhookConfig;
use crate::ownership::classify;
use crate::store::{CreateOutcome, ObjectStore};

/// Validating webhook for Projects
pub struct ProjectWebhook {
    store: Arc<dyn ObjectStore>,
    config: WebhookConfig,
}

impl ProjectWebhook {
    pub fn new(store: Arc<dyn ObjectStore>, config: WebhookConfig) -> Self {
        Self { store, config }
    }

    /// Admit a new Project, provisioning its namespace unless `dry_run`
    pub async fn validate_create(&self, project: &Project, dry_run: bool) -> AdmissionResult {
        validate_project_spec(&FieldPath::new("spec"), &project.spec)?;

        if dry_run {
            return Ok(());
        }

        let deadline = self.config.timeout;
        tokio::time::timeout(deadline, async {
            self.ensure_namespace(project).await?;
            self.ensure_secret_permissions(project).await
        })
        .await
        .map_err(|_| AdmissionError::Timeout(deadline))?
    }

    pub async fn validate_update(&self, _old: &Project, new: &Project) -> AdmissionResult {
        validate_project_spec(&FieldPath::new("spec"), &new.spec)?;
        Ok(())
    }

    pub async fn validate_delete(&self, _project: &Project) -> AdmissionResult {
        Ok(())
    }

    /// Make sure a namespace named after the Project exists and is not
    /// claimed by anything else
    pub async fn ensure_namespace(&self, project: &Project) -> AdmissionResult {
        let name = project.namespace_name();

        let existing = self
            .store
            .get_namespace(name)
            .await
            .map_err(|e| AdmissionError::internal(format!("error getting namespace {:?}", name), e))?;
        if let Some(ns) = existing {
            return self.check_ownership(project, &ns);
        }

        tracing::debug!(project = name, name = name, "namespace does not exist; creating it");
        match self.store.create_namespace(&project_namespace(name)).await {
            CreateOutcome::Created => {
                tracing::debug!(project = name, name = name, "created namespace");
                Ok(())
            }
            CreateOutcome::AlreadyExists => {
                // Lost a race with another creator; judge what it left behind
                let ns = self.store.get_namespace(name).await.map_err(|e| {
                    AdmissionError::internal(format!("error getting namespace {:?}", name), e)
                })?;
                match ns {
                    Some(ns) => self.check_ownership(project, &ns),
                    None => Err(AdmissionError::internal(
                        format!("error creating namespace {:?}", name),
                        "namespace vanished after creation conflict",
                    )),
                }
            }
            CreateOutcome::Failed(e) => Err(AdmissionError::internal(
                format!("error creating namespace {:?}", name),
                e,
            )),
        }
    }

    fn check_ownership(&self, project: &Project, ns: &Namespace) -> AdmissionResult {
        let name = project.namespace_name();
        if classify(Some(ns), project.uid()).is_conflict() {
            tracing::info!(project = name, name = name, "namespace is owned by something else");
            return Err(AdmissionError::conflict(format!(
                "failed to initialize Project {:?} because namespace {:?} already exists",
                name, name
            )));
        }
        tracing::debug!(project = name, name = name, "namespace exists but no conflict was found");
        Ok(())
    }

    /// Bind the secret manager role to the API server in the Project namespace
    pub async fn ensure_secret_permissions(&self, project: &Project) -> AdmissionResult {
        let namespace = project.namespace_name();
        let binding = secrets_role_binding(namespace, &self.config.kargo_namespace);

        match self.store.create_role_binding(&binding).await {
            CreateOutcome::Created => {
                tracing::debug!(
                    project = namespace,
                    namespace,
                    roleBinding = SECRETS_ROLE_BINDING,
                    "granted API server access to manage project secrets"
                );
                Ok(())
            }
            CreateOutcome::AlreadyExists => {
                tracing::debug!(
                    project = namespace,
                    namespace,
                    roleBinding = SECRETS_ROLE_BINDING,
                    "role binding already exists in project namespace"
                );
                Ok(())
            }
            CreateOutcome::Failed(e) => Err(AdmissionError::internal(
                format!(
                    "error creating role binding {:?} in project namespace {:?}",
                    SECRETS_ROLE_BINDING, namespace
                ),
                e,
            )),
        }
    }
}

/// Namespace for a new Project: labeled and finalized, but not yet owned
fn project_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                PROJECT_LABEL.to_string(),
                LABEL_TRUE.to_string(),
            )])),
            finalizers: Some(vec![FINALIZER.to_string()]),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn secrets_role_binding(namespace: &str, kargo_namespace: &str) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(SECRETS_ROLE_BINDING.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: SECRET_MANAGER_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: API_SERVER_SERVICE_ACCOUNT.to_string(),
            namespace: Some(kargo_namespace.to_string()),
            api_group: None,
        }]),
    }
}
