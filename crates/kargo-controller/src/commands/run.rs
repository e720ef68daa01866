//! Run command - start the controllers

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use kargo_kube::{
    ControllerConfig, KubeStore, ObjectStore, RefreshPropagator, StageIndex, WarehouseReconciler,
};
use kargo_source::{FileSourceClient, SourceClient};

use crate::controllers::{self, StageIndexer};
use crate::error::{CliError, Result};

/// Settings given on the command line or through the environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub kargo_namespace: Option<String>,
    pub shard_name: Option<String>,
    pub argocd_namespace: Option<String>,
    pub catalog: Option<PathBuf>,
}

/// Load the config file, if any, and apply `overrides` on top
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<ControllerConfig> {
    let mut config = match path {
        Some(path) => ControllerConfig::load_from(path)
            .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))?,
        None => ControllerConfig::default(),
    };

    if let Some(namespace) = overrides.kargo_namespace {
        config.kargo_namespace = namespace;
    }
    if let Some(shard) = overrides.shard_name {
        config.shard_name = Some(shard);
    }
    if let Some(namespace) = overrides.argocd_namespace {
        config.argocd_namespace = namespace;
    }
    if let Some(catalog) = overrides.catalog {
        config.catalog = Some(catalog);
    }

    config
        .validate()
        .map_err(|e| CliError::config(e.to_string()))?;
    Ok(config)
}

fn open_catalog(config: &ControllerConfig) -> Result<Arc<dyn SourceClient>> {
    let path = config.catalog.as_ref().ok_or_else(|| {
        CliError::config_with_help(
            "no candidate catalog configured",
            "set `catalog` in the config file or pass --catalog",
        )
    })?;
    let client = FileSourceClient::open(path)
        .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))?;
    Ok(Arc::new(client))
}

pub async fn run(config: ControllerConfig) -> Result<()> {
    let source = open_catalog(&config)?;

    let store = KubeStore::new().await?;
    let client = store.client().clone();
    let store: Arc<dyn ObjectStore> = Arc::new(store);

    // Seed the index so propagation works before the Stage watch has synced
    let mut index = StageIndex::new(config.shard_name.clone(), &config.argocd_namespace);
    index.rebuild(&store.list_stages().await?);
    tracing::info!(
        stages = index.len(),
        shard = config.shard().unwrap_or("<none>"),
        "starting controllers"
    );
    let index = Arc::new(RwLock::new(index));

    let reconciler = Arc::new(WarehouseReconciler::new(
        store.clone(),
        source,
        config.source_timeout,
    ));
    let propagator = Arc::new(RefreshPropagator::new(
        store.clone(),
        index.clone(),
        config.shard_name.clone(),
    ));

    let loops = async {
        tokio::try_join!(
            controllers::run_warehouses(
                client.clone(),
                reconciler,
                config.shard_name.clone(),
                config.warehouse_interval,
            ),
            controllers::run_stage_index(client.clone(), StageIndexer::new(index)),
            controllers::run_applications(client.clone(), propagator),
            controllers::run_projects(client, store),
        )
    };

    tokio::select! {
        result = loops => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt, shutting down");
        }
    }
    Ok(())
}
