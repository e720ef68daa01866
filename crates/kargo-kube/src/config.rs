//! Controller configuration
//!
//! Loaded from an optional YAML file; the binary then applies command-line
//! flags and environment variables on top.
//!
//! ```yaml
//! kargoNamespace: kargo
//! shardName: east
//! argocdNamespace: argocd
//! sourceTimeout: 30s
//! admissionTimeout: 10s
//! warehouseInterval: 5m
//! catalog: /etc/kargo/catalog.yaml
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use kargo_core::labels::DEFAULT_ARGOCD_NAMESPACE;

use crate::error::{KubeError, Result};

/// Settings shared by every controller and webhook in the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Namespace the control plane (and its API server account) runs in
    pub kargo_namespace: String,

    /// Shard this instance serves; `None` serves unlabeled objects only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_name: Option<String>,

    /// Namespace for Argo CD Applications a Stage does not qualify
    pub argocd_namespace: String,

    /// Deadline for listing one subscription's candidates
    #[serde(with = "humantime_serde")]
    pub source_timeout: Duration,

    /// Deadline for the side effects of one admission request
    #[serde(with = "humantime_serde")]
    pub admission_timeout: Duration,

    /// How often every Warehouse is reconciled even if nothing changed
    #[serde(with = "humantime_serde")]
    pub warehouse_interval: Duration,

    /// Candidate catalog for the file-backed source client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kargo_namespace: "kargo".to_string(),
            shard_name: None,
            argocd_namespace: DEFAULT_ARGOCD_NAMESPACE.to_string(),
            source_timeout: Duration::from_secs(30),
            admission_timeout: Duration::from_secs(10),
            warehouse_interval: Duration::from_secs(300),
            catalog: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings no component can run with
    pub fn validate(&self) -> Result<()> {
        if self.kargo_namespace.is_empty() {
            return Err(KubeError::InvalidConfig(
                "kargoNamespace must not be empty".to_string(),
            ));
        }
        if self.argocd_namespace.is_empty() {
            return Err(KubeError::InvalidConfig(
                "argocdNamespace must not be empty".to_string(),
            ));
        }
        if matches!(self.shard_name.as_deref(), Some("")) {
            return Err(KubeError::InvalidConfig(
                "shardName must be omitted rather than empty".to_string(),
            ));
        }
        if self.source_timeout.is_zero() || self.admission_timeout.is_zero() {
            return Err(KubeError::InvalidConfig(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.warehouse_interval.is_zero() {
            return Err(KubeError::InvalidConfig(
                "warehouseInterval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shard(&self) -> Option<&str> {
        self.shard_name.as_deref()
    }

    /// The part of the configuration the Project webhook needs
    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            kargo_namespace: self.kargo_namespace.clone(),
            timeout: self.admission_timeout,
        }
    }
}

/// Project webhook settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Namespace of the API server's ServiceAccount
    pub kargo_namespace: String,
    /// Deadline for namespace and role binding provisioning
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        ControllerConfig::default().webhook_config()
    }
}
