//! Warehouse reconciliation
//!
//! One pass resolves every subscription of a Warehouse to a single version
//! and, when all of them resolve, records the result as a Freight object.
//! Freight is content-addressed, so overlapping passes that resolve the same
//! versions create it once and the other pass sees `AlreadyExists`.
//!
//! The status is written exactly once, as the last step of a pass:
//! - success clears `error` and advances `observedGeneration`
//! - failure sets `error` and leaves `observedGeneration` alone

use std::sync::Arc;
use std::time::Duration;

use kargo_core::{
    Chart, CommitSelectionStrategy, FreightSpec, GitCommit, Image, Subscription, Warehouse,
    WarehouseStatus,
};
use kargo_source::{Candidate, Selector, SourceClient, SourceError};

use crate::error::{KubeError, Result};
use crate::store::{CreateOutcome, ObjectStore};

/// What a reconciliation pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new Freight object was created
    FreightCreated { name: String },
    /// The resolved versions were already recorded
    FreightExists { name: String },
    /// At least one subscription has no qualifying version yet
    NoFreight { unresolved: Vec<String> },
    /// The pass failed; the message is now in `status.error`
    Failed { error: String },
}

/// Reconciles Warehouses into Freight
pub struct WarehouseReconciler {
    store: Arc<dyn ObjectStore>,
    source: Arc<dyn SourceClient>,
    source_timeout: Duration,
}

impl WarehouseReconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        source: Arc<dyn SourceClient>,
        source_timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            source_timeout,
        }
    }

    /// Run one pass over `warehouse`
    ///
    /// Only a failure to write the status is returned as an error; every
    /// other failure ends up in the status and in the outcome.
    pub async fn reconcile(&self, warehouse: &Warehouse) -> Result<ReconcileOutcome> {
        let name = warehouse.metadata.name.as_deref().unwrap_or_default();
        let namespace = warehouse.metadata.namespace.as_deref().unwrap_or_default();
        tracing::debug!(warehouse = name, namespace, "reconciling Warehouse");

        let outcome = match self.resolve(warehouse).await {
            Ok(Resolution::Complete(spec)) => self.record(spec, namespace).await,
            Ok(Resolution::Incomplete(unresolved)) => {
                tracing::debug!(
                    warehouse = name,
                    namespace,
                    ?unresolved,
                    "no qualifying version for some subscriptions"
                );
                ReconcileOutcome::NoFreight { unresolved }
            }
            Err(e) => ReconcileOutcome::Failed {
                error: e.to_string(),
            },
        };

        let status = match &outcome {
            ReconcileOutcome::Failed { error } => {
                tracing::warn!(warehouse = name, namespace, error = %error, "reconciliation failed");
                WarehouseStatus::failed(&warehouse.status_or_default(), error.clone())
            }
            _ => WarehouseStatus::succeeded(warehouse.generation()),
        };
        self.store
            .patch_warehouse_status(namespace, name, &status)
            .await?;

        Ok(outcome)
    }

    /// Pick one version per subscription; the first fetch failure aborts
    async fn resolve(&self, warehouse: &Warehouse) -> Result<Resolution> {
        let mut spec = FreightSpec {
            warehouse: warehouse.metadata.name.clone().unwrap_or_default(),
            ..Default::default()
        };
        let mut unresolved = Vec::new();

        for subscription in &warehouse.spec.subscriptions {
            let selector = Selector::from_subscription(subscription)?;
            let candidates = self.list_candidates(subscription).await?;
            match selector.select(&candidates) {
                Some(chosen) => add_artifact(&mut spec, subscription, chosen),
                None => unresolved.push(subscription.to_string()),
            }
        }

        if unresolved.is_empty() {
            Ok(Resolution::Complete(spec))
        } else {
            Ok(Resolution::Incomplete(unresolved))
        }
    }

    async fn list_candidates(&self, subscription: &Subscription) -> Result<Vec<Candidate>> {
        let listed = tokio::time::timeout(
            self.source_timeout,
            self.source.list_candidates(subscription),
        )
        .await
        .unwrap_or_else(|_| {
            Err(SourceError::Timeout {
                repo_url: subscription.repo_url().to_string(),
                after: self.source_timeout,
            })
        });

        listed.map_err(|source| KubeError::Source {
            subscription: subscription.to_string(),
            source,
        })
    }

    async fn record(&self, spec: FreightSpec, namespace: &str) -> ReconcileOutcome {
        let freight = spec.into_freight(namespace);
        let name = freight.metadata.name.clone().unwrap_or_default();

        match self.store.create_freight(&freight).await {
            CreateOutcome::Created => {
                tracing::info!(
                    warehouse = %freight.spec.warehouse,
                    namespace,
                    freight = %name,
                    "created Freight"
                );
                ReconcileOutcome::FreightCreated { name }
            }
            CreateOutcome::AlreadyExists => {
                tracing::debug!(namespace, freight = %name, "Freight already exists");
                ReconcileOutcome::FreightExists { name }
            }
            CreateOutcome::Failed(e) => ReconcileOutcome::Failed {
                error: format!("error creating Freight {}: {}", name, e),
            },
        }
    }
}

enum Resolution {
    Complete(FreightSpec),
    Incomplete(Vec<String>),
}

/// Record the chosen candidate of one subscription
fn add_artifact(spec: &mut FreightSpec, subscription: &Subscription, chosen: &Candidate) {
    match subscription {
        Subscription::Git(git) => {
            let from_branch =
                git.commit_selection_strategy == CommitSelectionStrategy::NewestFromBranch;
            spec.commits.push(GitCommit {
                repo_url: git.repo_url.clone(),
                id: chosen.id.clone().unwrap_or_else(|| chosen.version.clone()),
                tag: (!from_branch).then(|| chosen.version.clone()),
                branch: (from_branch && !git.branch.is_empty()).then(|| git.branch.clone()),
            });
        }
        Subscription::Image(image) => spec.images.push(Image {
            repo_url: image.repo_url.clone(),
            git_repo_url: (!image.git_repo_url.is_empty()).then(|| image.git_repo_url.clone()),
            tag: chosen.version.clone(),
            digest: chosen.id.clone(),
        }),
        Subscription::Chart(chart) => spec.charts.push(Chart {
            repo_url: chart.repo_url.clone(),
            name: (!chart.name.is_empty()).then(|| chart.name.clone()),
            version: chosen.version.clone(),
        }),
    }
}
