//! Kargo artifact sources
//!
//! This crate turns a [`Subscription`](kargo_core::Subscription) into a
//! concrete artifact version:
//!
//! - **Candidates**: every version a repository currently offers, as
//!   returned by a [`SourceClient`]
//! - **Selection**: a pure, deterministic [`Selector`] that applies the
//!   subscription's filters and strategy to a candidate list
//! - **Clients**: an in-memory client for tests and a YAML catalog client
//!   for local development
//!
//! ## Example
//!
//! ```rust,no_run
//! use kargo_core::{ImageSubscription, Subscription};
//! use kargo_source::{FileSourceClient, Selector, SourceClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sub = Subscription::Image(ImageSubscription {
//!     repo_url: "ghcr.io/example/app".to_string(),
//!     semver_constraint: "^1.0.0".to_string(),
//!     ..Default::default()
//! });
//!
//! let client = FileSourceClient::open("catalog.yaml")?;
//! let candidates = client.list_candidates(&sub).await?;
//! let selected = Selector::from_subscription(&sub)?.select(&candidates);
//! # Ok(())
//! # }
//! ```

pub mod candidate;
pub mod client;
pub mod error;
pub mod file;
pub mod mock;
pub mod selection;

pub use candidate::Candidate;
pub use client::SourceClient;
pub use error::{Result, SelectionError, SourceError};
pub use file::{Catalog, FileSourceClient, RepositoryEntry};
pub use mock::{CallCounts, MockSourceClient};
pub use selection::Selector;
