//! Bounded-wait resolution of resources referenced by a job.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::{Dataset, ResourceCache};
use crate::job::{JobId, ModelInfo};
use crate::retry::{poll_until, RetryError, RetryPolicy};

/// Errors raised while resolving a referenced resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The model never became visible within the retry ceiling.
    #[error("Model '{key}' not found after {attempts} attempts")]
    ModelNotFound { key: String, attempts: u32 },

    /// The dataset never became visible within the retry ceiling.
    #[error("Dataset '{key}' not found after {attempts} attempts")]
    DatasetNotFound { key: String, attempts: u32 },

    /// The job was stopped while waiting.
    #[error("Resolution of '{key}' cancelled")]
    Cancelled { key: String },
}

/// A kind of resource a job can reference.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Human-readable kind for logs.
    const KIND: &'static str;

    /// Error for a resource that never appeared.
    fn not_found(key: &JobId, attempts: u32) -> ResolveError;
}

impl Resource for ModelInfo {
    const KIND: &'static str = "model";

    fn not_found(key: &JobId, attempts: u32) -> ResolveError {
        ResolveError::ModelNotFound {
            key: key.to_string(),
            attempts,
        }
    }
}

impl Resource for Dataset {
    const KIND: &'static str = "dataset";

    fn not_found(key: &JobId, attempts: u32) -> ResolveError {
        ResolveError::DatasetNotFound {
            key: key.to_string(),
            attempts,
        }
    }
}

/// Looks up resources, waiting for them to be synchronised.
pub struct Resolver<T: Resource> {
    cache: Arc<dyn ResourceCache<T>>,
    policy: RetryPolicy,
}

impl<T: Resource> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            policy: self.policy,
        }
    }
}

/// Resolver for model resources.
pub type ModelResolver = Resolver<ModelInfo>;

/// Resolver for dataset resources.
pub type DatasetResolver = Resolver<Dataset>;

impl<T: Resource> Resolver<T> {
    pub fn new(cache: Arc<dyn ResourceCache<T>>, policy: RetryPolicy) -> Self {
        Self { cache, policy }
    }

    /// Immediate lookup without waiting.
    pub fn lookup(&self, key: &JobId) -> Option<T> {
        self.cache.lookup(key)
    }

    /// Resolves `key`, polling the cache until it appears.
    ///
    /// # Errors
    ///
    /// A not-found error of the resource's kind once the retry ceiling is
    /// reached, or [`ResolveError::Cancelled`] if `cancel` fires first.
    pub async fn resolve(&self, key: &JobId, cancel: &CancellationToken) -> Result<T, ResolveError> {
        let cache = &self.cache;
        match poll_until(self.policy, cancel, || cache.lookup(key)).await {
            Ok(value) => {
                debug!(kind = T::KIND, key = %key, "Resolved resource");
                Ok(value)
            }
            Err(RetryError::Exhausted { attempts }) => {
                warn!(kind = T::KIND, key = %key, attempts, "Resource never became visible");
                Err(T::not_found(key, attempts))
            }
            Err(RetryError::Cancelled) => Err(ResolveError::Cancelled {
                key: key.to_string(),
            }),
        }
    }
}
