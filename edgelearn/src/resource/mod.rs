//! Resources a job references: datasets and models.
//!
//! Both are published into local caches by an external sync process whose
//! progress is unordered relative to job creation. Jobs therefore resolve
//! them through a [`Resolver`], which waits a bounded time for them to show.

mod cache;
mod resolver;

pub use cache::{Dataset, MemoryCache, ResourceCache};
pub use resolver::{DatasetResolver, ModelResolver, ResolveError, Resolver, Resource};
