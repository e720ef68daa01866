//! Project namespace ownership
//!
//! A Project's namespace is claimed in two steps. The admission webhook
//! creates it with the project label and finalizer but without an owner
//! reference: the Project is not persisted until admission completes, and
//! if that takes long enough the garbage collector sees an owner that does
//! not exist, takes the namespace for an orphan and deletes it. Once the
//! Project exists, [`link_owner`] adds the owner reference.
//!
//! ```text
//! Unclaimed --(create with label)--> PendingOwnerLink --(owner ref)--> Linked
//! ```
//!
//! A namespace that fits none of these states belongs to someone else.

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use kargo_core::Project;
use kargo_core::labels::{LABEL_TRUE, PROJECT_LABEL};

use crate::error::Result;
use crate::store::ObjectStore;

/// How a namespace relates to the Project of the same name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceOwnership {
    /// No such namespace
    Unclaimed,
    /// Labeled for a Project, owner reference not yet added
    PendingOwnerLink,
    /// Owned by this Project
    Linked,
    /// Owned by something else
    Conflict(OwnershipConflict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipConflict {
    /// No owners and no project label
    Unlabeled,
    /// More than one owner
    MultipleOwners,
    /// A single owner that is not this Project
    ForeignOwner,
}

impl NamespaceOwnership {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Classify `namespace` with respect to the Project whose UID is `project_uid`
pub fn classify(namespace: Option<&Namespace>, project_uid: Option<&str>) -> NamespaceOwnership {
    let Some(ns) = namespace else {
        return NamespaceOwnership::Unclaimed;
    };

    let owners = ns.metadata.owner_references.as_deref().unwrap_or_default();
    match owners {
        [] => {
            let labeled = ns
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(PROJECT_LABEL))
                .is_some_and(|value| value == LABEL_TRUE);
            if labeled {
                NamespaceOwnership::PendingOwnerLink
            } else {
                NamespaceOwnership::Conflict(OwnershipConflict::Unlabeled)
            }
        }
        [owner] if Some(owner.uid.as_str()) == project_uid => NamespaceOwnership::Linked,
        [_] => NamespaceOwnership::Conflict(OwnershipConflict::ForeignOwner),
        _ => NamespaceOwnership::Conflict(OwnershipConflict::MultipleOwners),
    }
}

/// Owner reference pointing at `project`
pub fn project_owner_reference(project: &Project) -> OwnerReference {
    OwnerReference {
        api_version: Project::api_version(&()).to_string(),
        kind: Project::kind(&()).to_string(),
        name: project.metadata.name.clone().unwrap_or_default(),
        uid: project.metadata.uid.clone().unwrap_or_default(),
        block_owner_deletion: Some(true),
        controller: None,
    }
}

/// Complete the claim on a Project's namespace
///
/// Only a namespace in `PendingOwnerLink` is changed; every other state is
/// returned as found.
pub async fn link_owner(store: &dyn ObjectStore, project: &Project) -> Result<NamespaceOwnership> {
    let name = project.namespace_name();
    let namespace = store.get_namespace(name).await?;
    let ownership = classify(namespace.as_ref(), project.uid());

    if ownership != NamespaceOwnership::PendingOwnerLink || project.uid().is_none() {
        return Ok(ownership);
    }

    store
        .set_namespace_owner(name, &project_owner_reference(project))
        .await?;
    tracing::info!(project = name, namespace = name, "linked namespace to Project");
    Ok(NamespaceOwnership::Linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockStore;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kargo_core::ProjectSpec;
    use std::collections::BTreeMap;

    fn namespace(labeled: bool, owner_uids: &[&str]) -> Namespace {
        let labels = labeled
            .then(|| BTreeMap::from([(PROJECT_LABEL.to_string(), LABEL_TRUE.to_string())]));
        let owners = owner_uids
            .iter()
            .map(|uid| OwnerReference {
                api_version: "kargo.akuity.io/v1alpha1".to_string(),
                kind: "Project".to_string(),
                name: "team1".to_string(),
                uid: uid.to_string(),
                ..Default::default()
            })
            .collect::<Vec<_>>();
        Namespace {
            metadata: ObjectMeta {
                name: Some("team1".to_string()),
                labels,
                owner_references: (!owners.is_empty()).then_some(owners),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn project(uid: Option<&str>) -> Project {
        let mut project = Project::new("team1", ProjectSpec::default());
        project.metadata.uid = uid.map(String::from);
        project
    }

    #[test]
    fn test_classify() {
        let uid = Some("uid-1");
        assert_eq!(classify(None, uid), NamespaceOwnership::Unclaimed);
        assert_eq!(
            classify(Some(&namespace(true, &[])), uid),
            NamespaceOwnership::PendingOwnerLink
        );
        assert_eq!(
            classify(Some(&namespace(false, &["uid-1"])), uid),
            NamespaceOwnership::Linked
        );
        assert_eq!(
            classify(Some(&namespace(false, &[])), uid),
            NamespaceOwnership::Conflict(OwnershipConflict::Unlabeled)
        );
        assert_eq!(
            classify(Some(&namespace(true, &["uid-2"])), uid),
            NamespaceOwnership::Conflict(OwnershipConflict::ForeignOwner)
        );
        assert_eq!(
            classify(Some(&namespace(true, &["uid-1", "uid-2"])), uid),
            NamespaceOwnership::Conflict(OwnershipConflict::MultipleOwners)
        );
    }

    #[test]
    fn test_project_without_uid_never_matches_an_owner() {
        assert!(classify(Some(&namespace(true, &["uid-1"])), None).is_conflict());
    }

    #[test]
    fn test_owner_reference() {
        let owner = project_owner_reference(&project(Some("uid-1")));
        assert_eq!(owner.api_version, "kargo.akuity.io/v1alpha1");
        assert_eq!(owner.kind, "Project");
        assert_eq!(owner.uid, "uid-1");
    }

    #[tokio::test]
    async fn test_link_owner() {
        let store = MockStore::new().with_namespaces(vec![namespace(true, &[])]);
        let project = project(Some("uid-1"));

        let state = link_owner(&store, &project).await.unwrap();
        assert_eq!(state, NamespaceOwnership::Linked);
        let ns = store.namespace("team1").unwrap();
        assert_eq!(ns.metadata.owner_references.unwrap()[0].uid, "uid-1");

        // Already linked: nothing more to do
        assert_eq!(
            link_owner(&store, &project).await.unwrap(),
            NamespaceOwnership::Linked
        );
        assert_eq!(store.operation_counts().patches, 1);
    }

    #[tokio::test]
    async fn test_link_owner_leaves_foreign_namespace_alone() {
        let store = MockStore::new().with_namespaces(vec![namespace(false, &[])]);
        let state = link_owner(&store, &project(Some("uid-1"))).await.unwrap();
        assert!(state.is_conflict());
        assert_eq!(store.operation_counts().patches, 0);
    }
}
