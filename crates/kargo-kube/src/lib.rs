//! Kargo Kube - Kubernetes integration for Kargo
//!
//! This crate provides:
//! - **Object stores**: every cluster read and write behind one trait, backed
//!   by the API server or by memory
//! - **Warehouse reconciler**: turns the latest version of each subscription
//!   into Freight and reports the outcome in the Warehouse status
//! - **Stage index**: maps Argo CD Applications to the Stages that update them
//! - **Refresh propagator**: re-triggers dependent Stages when an Application
//!   changes
//! - **Admission webhooks**: Project namespace provisioning and Warehouse
//!   validation
//! - **Namespace ownership**: the two-step claim of a Project's namespace
//!
//! The webhooks carry no transport. [`ProjectWebhook`] and
//! [`WarehouseWebhook`] are the entry points an admission server mounts:
//! it decodes the `AdmissionReview`, calls `validate_create`,
//! `validate_update` or `validate_delete`, and maps an [`AdmissionError`]
//! to a denial using its `code()` and `reason()`. The controller binary does
//! not serve them; `kargo-controller lint` runs the same field checks
//! offline.

pub mod config;
pub mod error;
pub mod index;
pub mod ownership;
pub mod propagator;
pub mod store;
pub mod warehouse;
pub mod webhook;

pub use config::{ControllerConfig, WebhookConfig};
pub use error::{KubeError, Result};
pub use index::{StageIndex, StageRef, app_key, stage_index_keys};
pub use ownership::{NamespaceOwnership, OwnershipConflict, classify, link_owner};
pub use propagator::{PropagationReport, RefreshPropagator, SyncTarget};
pub use store::{CreateOutcome, KubeStore, MockStore, ObjectStore, Operation, OperationCounts};
pub use warehouse::{ReconcileOutcome, WarehouseReconciler};
pub use webhook::{AdmissionError, ProjectWebhook, WarehouseWebhook};
