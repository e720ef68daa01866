//! In-memory source client for testing
//!
//! Candidates are registered per repository URL. Failures and delays can be
//! injected per repository to exercise error and deadline handling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use kargo_core::Subscription;

use crate::candidate::Candidate;
use crate::client::SourceClient;
use crate::error::{Result, SourceError};

/// In-memory source client
#[derive(Clone, Default)]
pub struct MockSourceClient {
    /// repo URL -> candidates
    candidates: Arc<RwLock<HashMap<String, Vec<Candidate>>>>,
    /// repo URL -> network error message
    failures: Arc<RwLock<HashMap<String, String>>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<CallCounts>>,
}

/// Calls made against the mock, for assertions
#[derive(Debug, Default, Clone)]
pub struct CallCounts {
    pub lists: usize,
    pub by_repo: HashMap<String, usize>,
}

impl MockSourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the candidates offered by `repo_url`
    pub fn with_candidates(self, repo_url: &str, candidates: Vec<Candidate>) -> Self {
        self.set_candidates(repo_url, candidates);
        self
    }

    /// Make every listing of `repo_url` fail with a network error
    pub fn with_failure(self, repo_url: &str, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(repo_url.to_string(), message.to_string());
        self
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the candidates of `repo_url`, e.g. to simulate a new push
    pub fn set_candidates(&self, repo_url: &str, candidates: Vec<Candidate>) {
        self.candidates
            .write()
            .unwrap()
            .insert(repo_url.to_string(), candidates);
    }

    pub fn call_counts(&self) -> CallCounts {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl SourceClient for MockSourceClient {
    async fn list_candidates(&self, subscription: &Subscription) -> Result<Vec<Candidate>> {
        let repo_url = subscription.repo_url();
        {
            let mut calls = self.calls.write().unwrap();
            calls.lists += 1;
            *calls.by_repo.entry(repo_url.to_string()).or_default() += 1;
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failures.read().unwrap().get(repo_url) {
            return Err(SourceError::Network {
                message: message.clone(),
            });
        }

        self.candidates
            .read()
            .unwrap()
            .get(repo_url)
            .cloned()
            .ok_or_else(|| SourceError::RepositoryNotFound {
                repo_url: repo_url.to_string(),
            })
    }
}
