//! Routing of worker reports to job controllers.
//!
//! Workers report asynchronously and in no particular order. All reports go
//! through one queue, drained by a single [`WorkerReportRouter`] loop which
//! relays each report upstream and then applies it to the owning job.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{JobPhaseController, ReportOutcome};
use crate::job::{JobId, WorkerReport};
use crate::relay::MessageRelay;

/// Running jobs by id.
///
/// Guarded by its own lock, never held while a job's state lock is taken.
pub type JobRegistry = Arc<RwLock<HashMap<JobId, Arc<JobPhaseController>>>>;

/// Delivers worker reports to the controllers they belong to.
pub struct WorkerReportRouter {
    registry: JobRegistry,
    relay: Arc<dyn MessageRelay>,
}

impl WorkerReportRouter {
    pub fn new(registry: JobRegistry, relay: Arc<dyn MessageRelay>) -> Self {
        Self { registry, relay }
    }

    /// Routes one report.
    ///
    /// The report is relayed upstream unmodified whether or not a job owns
    /// it. Returns `None` when no job with the owner id is running; such
    /// reports are dropped.
    pub fn route(&self, report: &WorkerReport) -> Option<ReportOutcome> {
        let owner = report.owner_id();

        if let Err(e) = self
            .relay
            .send(report.raw().clone(), &report.upstream_header())
        {
            warn!(job = %owner, worker = %report.name, error = %e, "Failed to relay worker report");
        }

        let job = self.registry.read().get(&owner).cloned();
        match job {
            Some(job) => Some(job.handle_report(report)),
            None => {
                debug!(job = %owner, worker = %report.name, "No job for worker report, dropping");
                None
            }
        }
    }

    /// Drains `reports` until shutdown or until every sender is gone.
    pub async fn run(self, mut reports: mpsc::Receiver<WorkerReport>, shutdown: CancellationToken) {
        info!("Worker report router starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Worker report router shutting down");
                    break;
                }

                report = reports.recv() => {
                    match report {
                        Some(report) => {
                            self.route(&report);
                        }
                        None => {
                            info!("Worker report channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }
}
