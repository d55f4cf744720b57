//! Edgelearn - edge-side controller for incremental learning jobs
//!
//! An incremental learning job keeps a model current with a dataset that
//! grows on the edge node. The controller cycles each job through
//! train, eval and deploy phases, dispatching the actual work to remote
//! workers and advancing as they report back.
//!
//! # High-Level API
//!
//! [`manager::JobManager`] is the entry point:
//!
//! ```ignore
//! use edgelearn::manager::JobManager;
//!
//! let manager = JobManager::new(store, datasets, models, relay, config);
//! manager.start()?;
//!
//! // Control-plane messages create, update and delete jobs
//! manager.handle_message(message).await?;
//!
//! // Worker reports are routed to their job
//! manager.submit_report(report).await?;
//!
//! manager.shutdown().await;
//! ```

pub mod config;
pub mod controller;
pub mod job;
pub mod logging;
pub mod manager;
pub mod relay;
pub mod resource;
pub mod retry;
pub mod router;
pub mod sample;
pub mod store;
pub mod trigger;

/// Version of the edgelearn library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
