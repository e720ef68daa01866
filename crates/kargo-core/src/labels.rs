//! Well-known labels, annotations and finalizers
//!
//! These keys form the contract between the controllers in this workspace
//! and anything else (humans, dashboards, other controllers) that reads or
//! writes Kargo resources.

/// Label marking a namespace as belonging to a Project
pub const PROJECT_LABEL: &str = "kargo.akuity.io/project";

/// Value used for boolean labels
pub const LABEL_TRUE: &str = "true";

/// Finalizer attached to Project namespaces at creation time
pub const FINALIZER: &str = "kargo.akuity.io/finalizer";

/// Label assigning a resource to a controller shard
pub const SHARD_LABEL: &str = "kargo.akuity.io/shard";

/// Label recording which Warehouse produced a piece of Freight
pub const WAREHOUSE_LABEL: &str = "kargo.akuity.io/warehouse";

/// Annotation that forces a Stage to be reconciled when its value changes
pub const REFRESH_ANNOTATION: &str = "kargo.akuity.io/refresh";

/// Namespace Argo CD Applications live in when a Stage does not say otherwise
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "argocd";

/// RBAC granted to the API server inside every Project namespace
pub mod rbac {
    /// Name of the RoleBinding created in each Project namespace
    pub const SECRETS_ROLE_BINDING: &str = "kargo-api-server-manage-project-secrets";
    /// ClusterRole referenced by that RoleBinding
    pub const SECRET_MANAGER_CLUSTER_ROLE: &str = "kargo-secret-manager";
    /// ServiceAccount the API server runs as
    pub const API_SERVER_SERVICE_ACCOUNT: &str = "kargo-api";
    /// API group of ClusterRole references
    pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
}

/// Whether a controller configured with `shard` should handle an object
/// carrying `labels`.
///
/// The unsharded controller handles only unlabeled objects; a named shard
/// handles only objects labeled with its own name.
pub fn shard_matches(
    shard: Option<&str>,
    labels: Option<&std::collections::BTreeMap<String, String>>,
) -> bool {
    let object_shard = labels.and_then(|l| l.get(SHARD_LABEL)).map(String::as_str);
    match (shard, object_shard) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(own), found) => found == Some(own),
    }
}

/// Label selector that restricts a watch to the objects of one shard
pub fn shard_selector(shard: Option<&str>) -> String {
    match shard {
        Some(name) => format!("{}={}", SHARD_LABEL, name),
        None => format!("!{}", SHARD_LABEL),
    }
}
