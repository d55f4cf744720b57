//! Application of worker reports to job state.

use tracing::{debug, info, warn};

use super::JobPhaseController;
use crate::job::{ModelInfo, Phase, WorkerReport, WorkerStatus};

/// What happened to a routed worker report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The report updated the job.
    Applied,
    /// The report was for another phase, or a kind of work this job never
    /// runs, and was ignored.
    PhaseMismatch { current: Phase, reported: String },
    /// The report carried a status this controller does not know and was
    /// ignored.
    UnknownStatus { status: String },
}

impl JobPhaseController {
    /// Applies a worker report to this job.
    ///
    /// Reports for a phase other than the current one are ignored. Otherwise
    /// the worker status is taken from the report, and on completion the
    /// results are recorded: trained artifacts by format after training, the
    /// (new, old) pair after evaluation.
    pub fn handle_report(&self, report: &WorkerReport) -> ReportOutcome {
        let models = parse_models(report);

        let mut state = self.state.lock();
        if report.phase() != Some(state.phase) {
            warn!(
                job = %self.id,
                worker = %report.name,
                phase = %state.phase,
                reported = %report.kind,
                "Ignoring report for another phase"
            );
            return ReportOutcome::PhaseMismatch {
                current: state.phase,
                reported: report.kind.clone(),
            };
        }

        let Some(status) = report.worker_status() else {
            warn!(
                job = %self.id,
                worker = %report.name,
                status = %report.status,
                "Ignoring report with unknown worker status"
            );
            return ReportOutcome::UnknownStatus {
                status: report.status.clone(),
            };
        };

        state.worker_status = status;
        debug!(
            job = %self.id,
            worker = %report.name,
            phase = %state.phase,
            status = %status,
            "Applied worker status"
        );

        if status == WorkerStatus::Completed {
            match state.phase {
                Phase::Train => {
                    let trained = &mut state.train_model.trained_model;
                    trained.clear();
                    for model in models.into_iter().filter(|m| !m.format.is_empty()) {
                        trained.insert(model.format, model.url);
                    }
                    info!(job = %self.id, artifacts = trained.len(), "Recorded trained artifacts");
                }
                Phase::Eval => {
                    info!(job = %self.id, results = models.len(), "Recorded evaluation results");
                    state.eval_results = models;
                }
                Phase::Deploy => {}
            }
        }

        ReportOutcome::Applied
    }
}

fn parse_models(report: &WorkerReport) -> Vec<ModelInfo> {
    let results = match report.results() {
        Ok(results) => results,
        Err(e) => {
            warn!(worker = %report.name, error = %e, "Malformed worker results, ignoring");
            return Vec::new();
        }
    };

    results
        .into_iter()
        .map(|result| {
            let metrics = result.parse_metrics().unwrap_or_else(|e| {
                warn!(
                    worker = %report.name,
                    url = %result.url,
                    error = %e,
                    "Malformed worker metrics, ignoring"
                );
                Default::default()
            });
            ModelInfo::new(result.format, result.url).with_metrics(metrics)
        })
        .collect()
}
