//! Read-only view of resources synchronised from the control plane.

use dashmap::DashMap;
use std::sync::Arc;

use crate::job::JobId;

/// Dataset as published by the dataset sync process.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    /// Sample file format, e.g. `txt`.
    pub format: String,

    /// All samples seen so far, in arrival order. Only ever grows.
    pub samples: Arc<Vec<String>>,
}

impl Dataset {
    pub fn new(format: impl Into<String>, samples: Vec<String>) -> Self {
        Self {
            format: format.into(),
            samples: Arc::new(samples),
        }
    }
}

/// Keyed lookup into a cache populated by an external sync component.
///
/// The controller only reads; it never writes into a resource cache.
pub trait ResourceCache<T>: Send + Sync {
    /// Returns the current value for `key`, if it has been synchronised.
    fn lookup(&self, key: &JobId) -> Option<T>;
}

/// In-memory resource cache backed by a concurrent map.
///
/// The sync side calls [`insert`](Self::insert) / [`remove`](Self::remove);
/// readers go through [`ResourceCache::lookup`].
#[derive(Debug)]
pub struct MemoryCache<T> {
    entries: DashMap<JobId, T>,
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T: Clone> MemoryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes or replaces a resource.
    pub fn insert(&self, key: JobId, value: T) {
        self.entries.insert(key, value);
    }

    /// Withdraws a resource.
    pub fn remove(&self, key: &JobId) -> Option<T> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone + Send + Sync> ResourceCache<T> for MemoryCache<T> {
    fn lookup(&self, key: &JobId) -> Option<T> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }
}
