//! Source client trait

use async_trait::async_trait;
use kargo_core::Subscription;

use crate::candidate::Candidate;
use crate::error::Result;

/// Lists the versions a subscribed repository currently offers
///
/// Implementations talk to the outside world and may fail transiently;
/// they apply no selection rules of their own. What is listed depends on
/// the subscription: branch heads for Git `NewestFromBranch`, tags for
/// every other Git strategy and for images, chart versions for charts.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn list_candidates(&self, subscription: &Subscription) -> Result<Vec<Candidate>>;
}
