//! Multi-document manifest parsing
//!
//! Splits a YAML stream (`---` separated) into typed Kargo resources so they
//! can be validated offline, before they ever reach the API server.

use serde::Deserialize;

use crate::error::{CoreError, Result};
use crate::project::Project;
use crate::stage::Stage;
use crate::validation::{FieldPath, ValidationErrors, validate_project_spec, validate_warehouse_spec};
use crate::warehouse::Warehouse;

/// One document of a manifest stream
#[derive(Debug, Clone)]
pub enum Manifest {
    Project(Project),
    Warehouse(Warehouse),
    Stage(Stage),
    /// Any kind not handled here; carried along so callers can report it
    Other { kind: String, name: String },
}

impl Manifest {
    pub fn kind(&self) -> &str {
        match self {
            Self::Project(_) => "Project",
            Self::Warehouse(_) => "Warehouse",
            Self::Stage(_) => "Stage",
            Self::Other { kind, .. } => kind,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Project(p) => p.metadata.name.as_deref().unwrap_or_default(),
            Self::Warehouse(w) => w.metadata.name.as_deref().unwrap_or_default(),
            Self::Stage(s) => s.metadata.name.as_deref().unwrap_or_default(),
            Self::Other { name, .. } => name,
        }
    }

    /// Run the admission checks that apply to this kind
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let spec = FieldPath::new("spec");
        match self {
            Self::Project(p) => validate_project_spec(&spec, &p.spec),
            Self::Warehouse(w) => validate_warehouse_spec(&spec, &w.spec),
            Self::Stage(_) | Self::Other { .. } => Ok(()),
        }
    }
}

#[derive(Deserialize)]
struct TypeMeta {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<NameOnly>,
}

#[derive(Deserialize)]
struct NameOnly {
    #[serde(default)]
    name: Option<String>,
}

/// A Project without a spec is valid and has no promotion policies
fn with_default_spec(mut value: serde_yaml::Value) -> serde_yaml::Value {
    if let Some(map) = value.as_mapping_mut() {
        let key = serde_yaml::Value::from("spec");
        if map.get(&key).is_none_or(serde_yaml::Value::is_null) {
            map.insert(key, serde_yaml::Value::Mapping(Default::default()));
        }
    }
    value
}

/// Parse every non-empty document of a YAML stream
pub fn parse_manifests(content: &str) -> Result<Vec<Manifest>> {
    let mut manifests = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        let meta: TypeMeta = serde_yaml::from_value(value.clone())?;
        let kind = meta.kind.ok_or(CoreError::MissingKind { index })?;
        let manifest = match kind.as_str() {
            "Project" => Manifest::Project(serde_yaml::from_value(with_default_spec(value))?),
            "Warehouse" => Manifest::Warehouse(serde_yaml::from_value(value)?),
            "Stage" => Manifest::Stage(serde_yaml::from_value(value)?),
            _ => Manifest::Other {
                name: meta.metadata.and_then(|m| m.name).unwrap_or_default(),
                kind,
            },
        };
        manifests.push(manifest);
    }

    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = r#"
apiVersion: kargo.akuity.io/v1alpha1
kind: Project
metadata:
  name: team1
spec:
  promotionPolicies:
    - stage: test
      autoPromotionEnabled: true
---
apiVersion: kargo.akuity.io/v1alpha1
kind: Warehouse
metadata:
  name: main
  namespace: team1
spec:
  subscriptions:
    - image:
        repoURL: ghcr.io/example/app
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
---
"#;

    #[test]
    fn test_parse_stream() {
        let manifests = parse_manifests(STREAM).unwrap();
        let kinds: Vec<&str> = manifests.iter().map(Manifest::kind).collect();
        assert_eq!(kinds, vec!["Project", "Warehouse", "ConfigMap"]);
        assert_eq!(manifests[2].name(), "settings");
        assert!(manifests.iter().all(|m| m.validate().is_ok()));
    }

    #[test]
    fn test_project_without_spec() {
        for doc in [
            "kind: Project\nmetadata:\n  name: team1\n",
            "kind: Project\nmetadata:\n  name: team1\nspec:\n",
        ] {
            let manifests = parse_manifests(doc).unwrap();
            let Manifest::Project(project) = &manifests[0] else {
                panic!("expected a Project");
            };
            assert!(project.spec.promotion_policies.is_empty());
            assert!(manifests[0].validate().is_ok());
        }
    }

    #[test]
    fn test_missing_kind() {
        let err = parse_manifests("metadata:\n  name: x\n").unwrap_err();
        assert!(matches!(err, CoreError::MissingKind { index: 0 }));
    }

    #[test]
    fn test_invalid_project_reported() {
        let manifests = parse_manifests(
            r#"
kind: Project
metadata:
  name: team1
spec:
  promotionPolicies:
    - stage: a
    - stage: a
"#,
        )
        .unwrap();
        let err = manifests[0].validate().unwrap_err();
        assert_eq!(err.errors()[0].value.as_deref(), Some("a"));
    }
}
