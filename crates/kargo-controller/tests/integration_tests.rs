//! Integration tests for CLI commands

use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run the controller binary
fn kargo(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_kargo-controller"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute kargo-controller")
}

fn write_manifest(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

mod lint_command {
    use super::*;

    #[test]
    fn test_lint_valid_manifests() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "project.yaml",
            r#"apiVersion: kargo.akuity.io/v1alpha1
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
  name: charts
  namespace: team1
spec:
  subscriptions:
    - chart:
        repoURL: oci://ghcr.io/example/charts/app
        semverConstraint: ">=1.0.0 <2.0.0"
"#,
        );

        let output = kargo(&["lint", &path]);
        assert!(output.status.success(), "Expected success for valid manifests");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Project team1"));
        assert!(stdout.contains("Warehouse charts"));
        assert!(stdout.contains("Linting passed"));
    }

    #[test]
    fn test_lint_reports_field_paths() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "warehouse.yaml",
            r#"kind: Warehouse
metadata:
  name: broken
spec:
  subscriptions:
    - chart:
        repoURL: https://charts.example.com
"#,
        );

        let output = kargo(&["lint", &path]);
        assert_eq!(output.status.code(), Some(2));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("spec.subscriptions[0].chart.name"));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Linting failed with 1 error(s) in 1 file(s)"));
    }

    #[test]
    fn test_lint_missing_file() {
        let output = kargo(&["lint", "/nonexistent/kargo.yaml"]);
        assert!(!output.status.success());
    }
}

mod run_command {
    use super::*;

    #[test]
    fn test_run_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "config.yaml", "shardName: \"\"\n");

        let output = kargo(&["run", "--config", &path]);
        assert_eq!(output.status.code(), Some(78));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Configuration error"));
    }

    #[test]
    fn test_run_requires_catalog() {
        let output = Command::new(env!("CARGO_BIN_EXE_kargo-controller"))
            .args(["run"])
            .env_remove("KARGO_CONFIG")
            .env_remove("KARGO_CATALOG")
            .output()
            .expect("Failed to execute kargo-controller");
        assert_eq!(output.status.code(), Some(78));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("no candidate catalog configured"));
    }
}
