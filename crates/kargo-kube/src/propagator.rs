//! Refresh propagation
//!
//! When an Argo CD Application changes, every Stage that depends on it gets
//! its refresh annotation bumped so that the Stage reconciler runs again.
//! Dependents are patched independently: one failing patch does not stop
//! the others, and the first failure is what the caller sees.

use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use kargo_core::labels::{REFRESH_ANNOTATION, shard_matches};

use crate::error::{KubeError, Result};
use crate::index::{StageIndex, StageRef, app_key};
use crate::store::ObjectStore;

/// An external resource Stages can depend on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncTarget {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl SyncTarget {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Key under which dependents are indexed
    pub fn key(&self) -> String {
        app_key(&self.namespace, &self.name)
    }
}

/// Result of propagating one change
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// The target belongs to another shard and was ignored
    pub skipped: bool,
    pub refreshed: Vec<StageRef>,
    pub failed: Vec<(StageRef, KubeError)>,
}

impl PropagationReport {
    pub fn first_error(&self) -> Option<&KubeError> {
        self.failed.first().map(|(_, e)| e)
    }

    /// The refreshed Stages, or the first failure
    pub fn into_result(self) -> Result<Vec<StageRef>> {
        match self.failed.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(self.refreshed),
        }
    }
}

/// Value for the refresh annotation; differs from every earlier one
pub fn refresh_token() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Bumps the refresh annotation of Stages that depend on a changed target
pub struct RefreshPropagator {
    store: Arc<dyn ObjectStore>,
    index: Arc<RwLock<StageIndex>>,
    shard: Option<String>,
}

impl RefreshPropagator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        index: Arc<RwLock<StageIndex>>,
        shard: Option<String>,
    ) -> Self {
        Self {
            store,
            index,
            shard,
        }
    }

    /// Refresh every dependent of `target`
    pub async fn propagate(&self, target: &SyncTarget) -> PropagationReport {
        let mut report = PropagationReport::default();

        if !shard_matches(self.shard.as_deref(), Some(&target.labels)) {
            tracing::debug!(
                application = %target.name,
                namespace = %target.namespace,
                "skipping Application from another shard"
            );
            report.skipped = true;
            return report;
        }

        // Copy the dependents out so the lock is not held across patches
        let dependents = self.index.read().await.dependents(&target.key());
        let token = refresh_token();

        for stage in dependents {
            match self
                .store
                .patch_stage_annotation(&stage.namespace, &stage.name, REFRESH_ANNOTATION, &token)
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        application = %target.name,
                        stage = %stage.name,
                        namespace = %stage.namespace,
                        "patched Stage to force reconciliation"
                    );
                    report.refreshed.push(stage);
                }
                Err(e) => {
                    tracing::warn!(
                        application = %target.name,
                        stage = %stage.name,
                        namespace = %stage.namespace,
                        error = %e,
                        "failed to refresh Stage"
                    );
                    report.failed.push((stage, e));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockStore, Operation};
    use kargo_core::labels::SHARD_LABEL;
    use kargo_core::{ArgoCDAppUpdate, PromotionMechanisms, Stage, StageSpec};

    fn stage(name: &str, app_namespace: &str, app_name: &str) -> Stage {
        let mut stage = Stage::new(
            name,
            StageSpec {
                promotion_mechanisms: Some(PromotionMechanisms {
                    argocd_app_updates: vec![ArgoCDAppUpdate {
                        app_name: app_name.to_string(),
                        app_namespace: app_namespace.to_string(),
                    }],
                }),
            },
        );
        stage.metadata.namespace = Some("team1".to_string());
        stage
    }

    fn refresh_value(store: &MockStore, name: &str) -> Option<String> {
        store
            .stage("team1", name)?
            .metadata
            .annotations?
            .get(REFRESH_ANNOTATION)
            .cloned()
    }

    fn setup(store: MockStore, stages: Vec<Stage>, shard: Option<&str>) -> RefreshPropagator {
        let mut index = StageIndex::new(shard.map(String::from), "argocd");
        index.rebuild(&stages);
        RefreshPropagator::new(
            Arc::new(store.with_stages(stages)),
            Arc::new(RwLock::new(index)),
            shard.map(String::from),
        )
    }

    #[tokio::test]
    async fn test_refreshes_all_dependents() {
        let store = MockStore::new();
        let stages = vec![
            stage("stage1", "ns1", "app1"),
            stage("stage2", "ns1", "app1"),
            stage("stage3", "ns1", "app2"),
        ];
        let propagator = setup(store.clone(), stages, None);

        let report = propagator.propagate(&SyncTarget::new("ns1", "app1")).await;
        assert_eq!(report.refreshed.len(), 2);
        assert!(report.failed.is_empty());
        assert!(refresh_value(&store, "stage1").is_some());
        assert!(refresh_value(&store, "stage2").is_some());
        assert!(refresh_value(&store, "stage3").is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_still_refreshes_others() {
        let store = MockStore::new().fail_for(Operation::PatchStage, "stage2", "stage2 is gone");
        let stages = vec![stage("stage1", "ns1", "app1"), stage("stage2", "ns1", "app1")];
        let propagator = setup(store.clone(), stages, None);

        let report = propagator.propagate(&SyncTarget::new("ns1", "app1")).await;
        assert_eq!(report.refreshed, vec![StageRef::new("team1", "stage1")]);
        assert!(refresh_value(&store, "stage1").is_some());
        assert!(refresh_value(&store, "stage2").is_none());

        let err = report.into_result().unwrap_err();
        assert_eq!(err.to_string(), "store error: stage2 is gone");
    }

    #[tokio::test]
    async fn test_no_dependents() {
        let store = MockStore::new();
        let propagator = setup(store.clone(), vec![], None);
        let report = propagator.propagate(&SyncTarget::new("ns1", "app1")).await;
        assert!(report.into_result().unwrap().is_empty());
        assert_eq!(store.operation_counts().patches, 0);
    }

    #[tokio::test]
    async fn test_target_from_other_shard_is_skipped() {
        let store = MockStore::new();
        let propagator = setup(store.clone(), vec![stage("stage1", "ns1", "app1")], None);

        let target = SyncTarget::new("ns1", "app1").with_labels(BTreeMap::from([(
            SHARD_LABEL.to_string(),
            "east".to_string(),
        )]));
        let report = propagator.propagate(&target).await;
        assert!(report.skipped);
        assert!(report.into_result().unwrap().is_empty());
        assert!(refresh_value(&store, "stage1").is_none());
    }

    #[tokio::test]
    async fn test_default_argocd_namespace() {
        let store = MockStore::new();
        let propagator = setup(store.clone(), vec![stage("stage1", "", "app1")], None);
        let report = propagator.propagate(&SyncTarget::new("argocd", "app1")).await;
        assert_eq!(report.refreshed.len(), 1);
    }
}
