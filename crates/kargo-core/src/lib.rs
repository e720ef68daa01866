//! Kargo Core - API types and validation for the Kargo orchestrator
//!
//! This crate provides the foundational types used throughout Kargo:
//! - `Warehouse`: a source of Freight, holding one or more `Subscription`s
//! - `Subscription`: a Git, image or chart repository to watch
//! - `Stage`: a promotion target whose Argo CD dependencies are indexed
//! - `Project`: the tenant resource whose name doubles as its namespace
//! - `Freight`: an immutable, content-addressed bundle of artifact versions
//! - `validation`: field-pathed admission checks for the above

pub mod constraint;
pub mod error;
pub mod freight;
pub mod labels;
pub mod manifest;
pub mod project;
pub mod stage;
pub mod subscription;
pub mod validation;
pub mod warehouse;

pub use constraint::{VersionConstraint, parse_version_lenient};
pub use error::{CoreError, Result};
pub use freight::{Chart, Freight, FreightSpec, GitCommit, Image};
pub use manifest::{Manifest, parse_manifests};
pub use project::{Project, ProjectSpec, PromotionPolicy};
pub use stage::{ArgoCDAppUpdate, PromotionMechanisms, Stage, StageSpec};
pub use subscription::{
    ChartSubscription, CommitSelectionStrategy, GitSubscription, ImageSelectionStrategy,
    ImageSubscription, Subscription, SubscriptionKind, default_platform,
};
pub use validation::{FieldError, FieldErrorKind, FieldPath, ValidationErrors};
pub use warehouse::{Warehouse, WarehouseSpec, WarehouseStatus};

/// API group shared by every Kargo resource
pub const API_GROUP: &str = "kargo.akuity.io";

/// API version shared by every Kargo resource
pub const API_VERSION: &str = "v1alpha1";
