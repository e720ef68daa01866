//! Watch loops
//!
//! Each loop consumes one `kube::runtime::watcher` stream and hands events
//! to the matching component of `kargo-kube`. Watch errors are retried with
//! the watcher's default backoff; a failing object never stops its loop.

use futures::StreamExt;
use kube::Client;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Event};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use kargo_core::labels::shard_selector;
use kargo_core::{Project, Stage, Warehouse};
use kargo_kube::{
    ObjectStore, ReconcileOutcome, RefreshPropagator, Result, StageIndex, SyncTarget,
    WarehouseReconciler, link_owner,
};

/// Whether a watched Warehouse has changed since its last successful pass
///
/// Status-only updates (including the ones the reconciler itself writes)
/// are left to the periodic resync.
pub fn needs_reconcile(warehouse: &Warehouse) -> bool {
    match &warehouse.status {
        None => true,
        Some(status) => {
            !status.error.is_empty() || status.observed_generation != warehouse.generation()
        }
    }
}

async fn reconcile_one(reconciler: &WarehouseReconciler, warehouse: &Warehouse) {
    let name = warehouse.metadata.name.as_deref().unwrap_or_default();
    let namespace = warehouse.metadata.namespace.as_deref().unwrap_or_default();
    match reconciler.reconcile(warehouse).await {
        // Already logged by the reconciler
        Ok(ReconcileOutcome::Failed { .. } | ReconcileOutcome::FreightCreated { .. }) => {}
        Ok(outcome) => {
            tracing::debug!(warehouse = name, namespace, ?outcome, "reconciled Warehouse");
        }
        Err(e) => {
            tracing::error!(warehouse = name, namespace, error = %e, "error updating Warehouse status");
        }
    }
}

/// Reconcile Warehouses of this shard on change and every `interval`
pub async fn run_warehouses(
    client: Client,
    reconciler: Arc<WarehouseReconciler>,
    shard: Option<String>,
    interval: Duration,
) -> Result<()> {
    let api: Api<Warehouse> = Api::all(client);
    let selector = shard_selector(shard.as_deref());
    let mut events = watcher::watcher(api.clone(), watcher::Config::default().labels(&selector))
        .default_backoff()
        .boxed();

    let mut resync = tokio::time::interval(interval);
    // The watcher's initial listing covers the first round
    resync.tick().await;

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Apply(w) | Event::InitApply(w))) if needs_reconcile(&w) => {
                    reconcile_one(&reconciler, &w).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => tracing::warn!(error = %e, "Warehouse watch error"),
                None => return Ok(()),
            },
            _ = resync.tick() => {
                match api.list(&ListParams::default().labels(&selector)).await {
                    Ok(list) => {
                        tracing::debug!(count = list.items.len(), "resyncing Warehouses");
                        for w in &list.items {
                            reconcile_one(&reconciler, w).await;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "error listing Warehouses"),
                }
            }
        }
    }
}

/// Keeps a [`StageIndex`] in step with a Stage watch
///
/// Objects from an initial or re-listing are buffered and swapped in at
/// once, so lookups never see a half-built index.
pub struct StageIndexer {
    index: Arc<RwLock<StageIndex>>,
    pending: Vec<Stage>,
}

impl StageIndexer {
    pub fn new(index: Arc<RwLock<StageIndex>>) -> Self {
        Self {
            index,
            pending: Vec::new(),
        }
    }

    pub async fn apply(&mut self, event: Event<Stage>) {
        match event {
            Event::Init => self.pending.clear(),
            Event::InitApply(stage) => self.pending.push(stage),
            Event::InitDone => {
                let mut index = self.index.write().await;
                index.rebuild(&self.pending);
                tracing::debug!(stages = index.len(), "rebuilt Stage index");
                self.pending.clear();
            }
            Event::Apply(stage) => self.index.write().await.upsert(&stage),
            Event::Delete(stage) => self.index.write().await.remove(&stage),
        }
    }
}

pub async fn run_stage_index(client: Client, mut indexer: StageIndexer) -> Result<()> {
    let api: Api<Stage> = Api::all(client);
    let mut events = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => indexer.apply(event).await,
            Err(e) => tracing::warn!(error = %e, "Stage watch error"),
        }
    }
    Ok(())
}

/// Argo CD Application, watched without a typed model
pub fn application_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Application"))
}

pub fn sync_target(app: &DynamicObject) -> SyncTarget {
    SyncTarget::new(
        app.metadata.namespace.clone().unwrap_or_default(),
        app.metadata.name.clone().unwrap_or_default(),
    )
    .with_labels(app.metadata.labels.clone().unwrap_or_default())
}

/// Refresh dependent Stages whenever an Application changes
///
/// The initial listing is not propagated; Stages are reconciled on their own
/// at startup.
pub async fn run_applications(client: Client, propagator: Arc<RefreshPropagator>) -> Result<()> {
    let api: Api<DynamicObject> = Api::all_with(client, &application_resource());
    let mut events = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Apply(app)) => {
                let target = sync_target(&app);
                if let Err(e) = propagator.propagate(&target).await.into_result() {
                    tracing::error!(
                        application = %target.name,
                        namespace = %target.namespace,
                        error = %e,
                        "error refreshing dependent Stages"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Application watch error"),
        }
    }
    Ok(())
}

/// Complete the namespace claim of every Project
pub async fn run_projects(client: Client, store: Arc<dyn ObjectStore>) -> Result<()> {
    let api: Api<Project> = Api::all(client);
    let mut events = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Apply(project) | Event::InitApply(project)) => {
                let name = project.namespace_name();
                match link_owner(store.as_ref(), &project).await {
                    Ok(state) if state.is_conflict() => {
                        tracing::warn!(project = name, ?state, "Project namespace is owned by something else");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(project = name, error = %e, "error linking Project namespace");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Project watch error"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kargo_core::{
        ArgoCDAppUpdate, PromotionMechanisms, StageSpec, WarehouseSpec, WarehouseStatus,
    };
    use kargo_kube::StageRef;
    use std::collections::BTreeMap;

    fn stage(name: &str, app: &str) -> Stage {
        let mut stage = Stage::new(
            name,
            StageSpec {
                promotion_mechanisms: Some(PromotionMechanisms {
                    argocd_app_updates: vec![ArgoCDAppUpdate {
                        app_name: app.to_string(),
                        app_namespace: String::new(),
                    }],
                }),
            },
        );
        stage.metadata.namespace = Some("team1".to_string());
        stage
    }

    fn indexer() -> (StageIndexer, Arc<RwLock<StageIndex>>) {
        let index = Arc::new(RwLock::new(StageIndex::new(None, "argocd")));
        (StageIndexer::new(index.clone()), index)
    }

    #[tokio::test]
    async fn test_listing_is_swapped_in_at_once() {
        let (mut indexer, index) = indexer();
        indexer.apply(Event::Apply(stage("old", "app0"))).await;

        indexer.apply(Event::Init).await;
        indexer.apply(Event::InitApply(stage("stage1", "app1"))).await;
        // Still the previous contents until the listing completes
        assert_eq!(index.read().await.dependents("argocd:app0").len(), 1);
        assert!(index.read().await.dependents("argocd:app1").is_empty());

        indexer.apply(Event::InitDone).await;
        let index = index.read().await;
        assert!(index.dependents("argocd:app0").is_empty());
        assert_eq!(
            index.dependents("argocd:app1"),
            vec![StageRef::new("team1", "stage1")]
        );
    }

    #[tokio::test]
    async fn test_apply_and_delete() {
        let (mut indexer, index) = indexer();
        indexer.apply(Event::Apply(stage("stage1", "app1"))).await;
        indexer.apply(Event::Apply(stage("stage2", "app1"))).await;
        indexer.apply(Event::Delete(stage("stage1", "app1"))).await;
        assert_eq!(
            index.read().await.dependents("argocd:app1"),
            vec![StageRef::new("team1", "stage2")]
        );
    }

    #[test]
    fn test_needs_reconcile() {
        let mut w = Warehouse::new("w1", WarehouseSpec { subscriptions: vec![] });
        w.metadata.generation = Some(2);
        assert!(needs_reconcile(&w));

        w.status = Some(WarehouseStatus {
            error: String::new(),
            observed_generation: 2,
        });
        assert!(!needs_reconcile(&w));

        w.metadata.generation = Some(3);
        assert!(needs_reconcile(&w));

        w.status = Some(WarehouseStatus {
            error: "boom".to_string(),
            observed_generation: 3,
        });
        assert!(needs_reconcile(&w));
    }

    #[test]
    fn test_sync_target_from_application() {
        let mut app = DynamicObject::new("app1", &application_resource()).within("argocd");
        app.metadata.labels = Some(BTreeMap::from([(
            "kargo.akuity.io/shard".to_string(),
            "east".to_string(),
        )]));
        let target = sync_target(&app);
        assert_eq!(target.key(), "argocd:app1");
        assert_eq!(target.labels.get("kargo.akuity.io/shard").unwrap(), "east");
    }

    #[test]
    fn test_application_resource() {
        let ar = application_resource();
        assert_eq!(ar.api_version, "argoproj.io/v1alpha1");
        assert_eq!(ar.plural, "applications");
    }
}
