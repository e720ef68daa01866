//! Warehouse admission

use kargo_core::validation::validate_warehouse_spec;
use kargo_core::{FieldPath, Warehouse};

use super::AdmissionResult;

/// Validating webhook for Warehouses; it has no side effects
#[derive(Debug, Clone, Copy, Default)]
pub struct WarehouseWebhook;

impl WarehouseWebhook {
    pub fn new() -> Self {
        Self
    }

    pub async fn validate_create(&self, warehouse: &Warehouse) -> AdmissionResult {
        self.validate(warehouse)
    }

    pub async fn validate_update(&self, _old: &Warehouse, new: &Warehouse) -> AdmissionResult {
        self.validate(new)
    }

    pub async fn validate_delete(&self, _warehouse: &Warehouse) -> AdmissionResult {
        Ok(())
    }

    fn validate(&self, warehouse: &Warehouse) -> AdmissionResult {
        validate_warehouse_spec(&FieldPath::new("spec"), &warehouse.spec)?;
        tracing::debug!(
            warehouse = warehouse.metadata.name.as_deref().unwrap_or_default(),
            "Warehouse spec is valid"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::AdmissionError;
    use kargo_core::{GitSubscription, ImageSubscription, Subscription, WarehouseSpec};

    fn warehouse(subscriptions: Vec<Subscription>) -> Warehouse {
        Warehouse::new("w1", WarehouseSpec { subscriptions })
    }

    #[tokio::test]
    async fn test_valid_warehouse() {
        let w = warehouse(vec![Subscription::Git(GitSubscription {
            repo_url: "https://github.com/example/repo.git".to_string(),
            ..Default::default()
        })]);
        let webhook = WarehouseWebhook::new();
        assert!(webhook.validate_create(&w).await.is_ok());
        assert!(webhook.validate_update(&w, &w).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_warehouse_reports_every_field() {
        let w = warehouse(vec![
            Subscription::Git(GitSubscription {
                repo_url: "ftp://example.com/repo".to_string(),
                ..Default::default()
            }),
            Subscription::Image(ImageSubscription {
                repo_url: "nginx".to_string(),
                allow_tags: "(".to_string(),
                ..Default::default()
            }),
        ]);

        let err = WarehouseWebhook::new().validate_create(&w).await.unwrap_err();
        let AdmissionError::Invalid(errors) = &err else {
            panic!("expected invalid, got {err:?}");
        };
        let paths: Vec<_> = errors.errors().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "spec.subscriptions[0].git.repoURL",
                "spec.subscriptions[1].image.allowTags"
            ]
        );
        assert_eq!(err.code(), 422);
    }

    #[tokio::test]
    async fn test_empty_warehouse_is_rejected() {
        let err = WarehouseWebhook::new()
            .validate_create(&warehouse(vec![]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spec.subscriptions"));
    }

    #[tokio::test]
    async fn test_delete_is_always_allowed() {
        let w = warehouse(vec![]);
        assert!(WarehouseWebhook::new().validate_delete(&w).await.is_ok());
    }
}
