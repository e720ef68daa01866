//! Reverse index from Argo CD Applications to the Stages that use them
//!
//! Keys have the form `<appNamespace>:<appName>`. The index is derived from
//! Stage specs alone and is rebuilt from a full listing or kept current with
//! per-Stage upserts and removals fed by a watch.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kargo_core::Stage;
use kargo_core::labels::shard_matches;

/// Namespaced name of a Stage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageRef {
    pub namespace: String,
    pub name: String,
}

impl StageRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_stage(stage: &Stage) -> Self {
        Self::new(
            stage.metadata.namespace.clone().unwrap_or_default(),
            stage.metadata.name.clone().unwrap_or_default(),
        )
    }
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Index key of an Application
pub fn app_key(namespace: &str, name: &str) -> String {
    format!("{}:{}", namespace, name)
}

/// Index keys of the Applications `stage` depends on
///
/// Stages outside this instance's shard yield no keys.
pub fn stage_index_keys(shard: Option<&str>, argocd_namespace: &str, stage: &Stage) -> Vec<String> {
    if !shard_matches(shard, stage.metadata.labels.as_ref()) {
        return Vec::new();
    }
    stage
        .argocd_app_updates()
        .iter()
        .map(|update| app_key(update.app_namespace_or(argocd_namespace), &update.app_name))
        .collect()
}

/// Application key -> dependent Stages
#[derive(Debug, Clone, Default)]
pub struct StageIndex {
    shard: Option<String>,
    argocd_namespace: String,
    by_app: BTreeMap<String, BTreeSet<StageRef>>,
    /// What each Stage was last indexed under, so updates can drop old keys
    by_stage: BTreeMap<StageRef, Vec<String>>,
}

impl StageIndex {
    pub fn new(shard: Option<String>, argocd_namespace: impl Into<String>) -> Self {
        Self {
            shard,
            argocd_namespace: argocd_namespace.into(),
            ..Default::default()
        }
    }

    /// Replace the whole index with one built from `stages`
    pub fn rebuild<'a>(&mut self, stages: impl IntoIterator<Item = &'a Stage>) {
        self.by_app.clear();
        self.by_stage.clear();
        for stage in stages {
            self.upsert(stage);
        }
    }

    /// Index a created or updated Stage
    pub fn upsert(&mut self, stage: &Stage) {
        let stage_ref = StageRef::from_stage(stage);
        self.remove_ref(&stage_ref);

        let keys = stage_index_keys(self.shard.as_deref(), &self.argocd_namespace, stage);
        if keys.is_empty() {
            return;
        }
        for key in &keys {
            self.by_app
                .entry(key.clone())
                .or_default()
                .insert(stage_ref.clone());
        }
        self.by_stage.insert(stage_ref, keys);
    }

    /// Forget a deleted Stage
    pub fn remove(&mut self, stage: &Stage) {
        self.remove_ref(&StageRef::from_stage(stage));
    }

    fn remove_ref(&mut self, stage_ref: &StageRef) {
        let Some(keys) = self.by_stage.remove(stage_ref) else {
            return;
        };
        for key in keys {
            if let Some(dependents) = self.by_app.get_mut(&key) {
                dependents.remove(stage_ref);
                if dependents.is_empty() {
                    self.by_app.remove(&key);
                }
            }
        }
    }

    /// Stages that depend on the Application with index key `key`
    pub fn dependents(&self, key: &str) -> Vec<StageRef> {
        self.by_app
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_stage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stage.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kargo_core::labels::SHARD_LABEL;
    use kargo_core::{ArgoCDAppUpdate, PromotionMechanisms, StageSpec};

    fn stage(namespace: &str, name: &str, apps: &[(&str, &str)]) -> Stage {
        let mut stage = Stage::new(
            name,
            StageSpec {
                promotion_mechanisms: Some(PromotionMechanisms {
                    argocd_app_updates: apps
                        .iter()
                        .map(|(ns, app)| ArgoCDAppUpdate {
                            app_name: app.to_string(),
                            app_namespace: ns.to_string(),
                        })
                        .collect(),
                }),
            },
        );
        stage.metadata.namespace = Some(namespace.to_string());
        stage
    }

    fn sharded(mut stage: Stage, shard: &str) -> Stage {
        stage
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(SHARD_LABEL.to_string(), shard.to_string());
        stage
    }

    #[test]
    fn test_keys_default_namespace() {
        let s = stage("team1", "test", &[("", "app1"), ("apps", "app2")]);
        assert_eq!(
            stage_index_keys(None, "argocd", &s),
            vec!["argocd:app1".to_string(), "apps:app2".to_string()]
        );
    }

    #[test]
    fn test_keys_respect_shard() {
        let s = sharded(stage("team1", "test", &[("ns1", "app1")]), "east");
        assert!(stage_index_keys(None, "argocd", &s).is_empty());
        assert!(stage_index_keys(Some("west"), "argocd", &s).is_empty());
        assert_eq!(stage_index_keys(Some("east"), "argocd", &s), vec!["ns1:app1"]);
    }

    #[test]
    fn test_rebuild_and_lookup() {
        let stages = vec![
            stage("team1", "stage1", &[("ns1", "app1")]),
            stage("team1", "stage2", &[("ns1", "app1"), ("ns1", "app2")]),
            stage("team2", "other", &[]),
        ];
        let mut index = StageIndex::new(None, "argocd");
        index.rebuild(&stages);

        assert_eq!(
            index.dependents("ns1:app1"),
            vec![StageRef::new("team1", "stage1"), StageRef::new("team1", "stage2")]
        );
        assert_eq!(index.dependents("ns1:app2"), vec![StageRef::new("team1", "stage2")]);
        assert!(index.dependents("ns1:app3").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_upsert_replaces_old_keys() {
        let mut index = StageIndex::new(None, "argocd");
        index.upsert(&stage("team1", "stage1", &[("ns1", "app1")]));
        index.upsert(&stage("team1", "stage1", &[("ns1", "app2")]));

        assert!(index.dependents("ns1:app1").is_empty());
        assert_eq!(index.dependents("ns1:app2"), vec![StageRef::new("team1", "stage1")]);
    }

    #[test]
    fn test_remove() {
        let s = stage("team1", "stage1", &[("ns1", "app1")]);
        let mut index = StageIndex::new(None, "argocd");
        index.upsert(&s);
        index.remove(&s);
        assert!(index.is_empty());
        assert!(index.dependents("ns1:app1").is_empty());
    }

    #[test]
    fn test_relabeled_stage_leaves_shard() {
        let mut index = StageIndex::new(None, "argocd");
        let s = stage("team1", "stage1", &[("ns1", "app1")]);
        index.upsert(&s);
        index.upsert(&sharded(s, "east"));
        assert!(index.dependents("ns1:app1").is_empty());
    }
}
