//! Per-job phase controller.
//!
//! A [`JobPhaseController`] drives one incremental learning job through the
//! train, eval and deploy cycle. It owns three kinds of activity that all
//! meet at the job's state lock:
//!
//! - the phase tick, run every [`ControllerConfig::tick_interval`]
//! - dataset ingestion, run every [`ControllerConfig::dataset_interval`]
//! - worker reports, applied by the router as they arrive
//!
//! # Lifecycle
//!
//! ```text
//! new() ── creates output dirs
//!   │
//! run() ── resolves dataset + models (bounded wait)
//!   ├── spawns ingestion loop
//!   └── tick loop until cancelled
//! ```
//!
//! Cancelling the job's token stops both loops; `run` returns only after the
//! ingestion loop has exited.

mod config;
mod error;
mod output;
mod phase;
mod report;
mod state;

pub use config::{
    ControllerConfig, DEFAULT_DATASET_INTERVAL, DEFAULT_REPORT_CHANNEL_CAPACITY,
    DEFAULT_TICK_INTERVAL, MIN_INTERVAL,
};
pub use error::ControllerError;
pub use output::{add_prefix, copy_artifact, trim_prefix, write_samples, OutputLayout, TXT_FORMAT};
pub use report::ReportOutcome;
pub use state::JobSnapshot;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job::{
    JobDefinition, JobId, MessageHeader, ModelInfo, Operation, INCREMENTAL_LEARNING_JOB_KIND,
};
use crate::relay::MessageRelay;
use crate::resource::{Dataset, DatasetResolver, ModelResolver, ResolveError};
use crate::sample::IngestStats;

use state::JobState;

/// State machine of a single incremental learning job.
pub struct JobPhaseController {
    id: JobId,
    /// Header of upstream status messages for this job.
    header: MessageHeader,
    layout: OutputLayout,
    relay: Arc<dyn MessageRelay>,
    config: ControllerConfig,
    cancel: CancellationToken,
    state: Mutex<JobState>,
}

impl JobPhaseController {
    /// Creates a controller in `Train`/`Ready`/`Ready` at version 0.
    ///
    /// The output directory tree is created here; a job whose output
    /// directory cannot be created never starts.
    pub fn new(
        definition: JobDefinition,
        relay: Arc<dyn MessageRelay>,
        config: ControllerConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ControllerError> {
        let id = definition.job_id();
        let namespace = definition.metadata.namespace.clone();
        let name = definition.metadata.name.clone();

        let output_dir = add_prefix(config.volume_mount_prefix(), &definition.spec.output_dir);
        let layout = OutputLayout::new(&output_dir);
        layout.create()?;

        let state = JobState::new(definition, config.eval_window_capacity(), output_dir);

        Ok(Self {
            id,
            header: MessageHeader {
                namespace,
                resource_kind: INCREMENTAL_LEARNING_JOB_KIND.to_string(),
                resource_name: name,
                operation: Operation::Status,
            },
            layout,
            relay,
            config,
            cancel,
            state: Mutex::new(state),
        })
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Stops every background task of this job. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current state, copied out under the lock.
    pub fn snapshot(&self) -> JobSnapshot {
        self.state.lock().snapshot(&self.id)
    }

    /// Replaces the job definition of a running job.
    ///
    /// Trigger rules and the train share apply from the next tick and the
    /// next ingestion. The output directory and referenced resources stay as
    /// resolved at start.
    pub fn update_definition(&self, definition: JobDefinition) {
        let mut state = self.state.lock();
        state.definition = definition;
        info!(job = %self.id, "Job definition updated");
    }

    /// Installs the resolved models and the dataset format.
    ///
    /// The trained-model map is seeded with the initial model, so the first
    /// train cycle starts from it.
    pub fn bind_resources(&self, dataset_format: &str, initial: ModelInfo, deployed: ModelInfo) {
        let mut state = self.state.lock();
        state.dataset_format = dataset_format.to_string();
        state
            .train_model
            .trained_model
            .entry(initial.format.clone())
            .or_insert_with(|| initial.url.clone());
        state.train_model.model = initial;
        state.deploy_model = deployed;
    }

    /// Partitions dataset samples that arrived since the last ingestion.
    pub fn ingest(&self, dataset: &Dataset) -> IngestStats {
        let mut state = self.state.lock();
        let train_prob = state.definition.spec.dataset.train_prob;
        let stats = state.samples.ingest(&dataset.samples, train_prob);
        if !dataset.format.is_empty() {
            state.dataset_format = dataset.format.clone();
        }

        if stats.is_empty() {
            warn!(
                job = %self.id,
                dataset = %state.definition.spec.dataset.name,
                "No new data from dataset"
            );
        } else {
            info!(
                job = %self.id,
                train = stats.train,
                eval = stats.eval,
                evicted_windows = stats.evicted_windows,
                train_samples = state.samples.train_samples().len(),
                eval_samples = state.samples.eval_samples().len(),
                "Ingested dataset samples"
            );
        }
        stats
    }

    /// Runs the job until cancelled.
    ///
    /// Resolves the dataset, initial model and deploy model first, each with
    /// a bounded wait. If any of them never shows up the job does not start.
    pub async fn run(self: Arc<Self>, datasets: DatasetResolver, models: ModelResolver) {
        info!(job = %self.id, "Job controller starting");

        let dataset_key = match self.start(&datasets, &models).await {
            Ok(key) => key,
            Err(ControllerError::Resolve(ResolveError::Cancelled { .. })) => {
                info!(job = %self.id, "Job stopped before start");
                return;
            }
            Err(e) => {
                error!(job = %self.id, error = %e, "Failed to start job");
                return;
            }
        };

        let ingestion = tokio::spawn(Arc::clone(&self).ingest_loop(datasets, dataset_key));
        Arc::clone(&self).tick_loop().await;

        if let Err(e) = ingestion.await {
            warn!(job = %self.id, error = %e, "Ingestion task ended abnormally");
        }
        info!(job = %self.id, "Job controller stopped");
    }

    async fn start(
        &self,
        datasets: &DatasetResolver,
        models: &ModelResolver,
    ) -> Result<JobId, ControllerError> {
        let (dataset_key, initial_key, deploy_key) = {
            let state = self.state.lock();
            (
                state.definition.dataset_key(),
                state.definition.initial_model_key(),
                state.definition.deploy_model_key(),
            )
        };

        let dataset = datasets.resolve(&dataset_key, &self.cancel).await?;
        let initial = models.resolve(&initial_key, &self.cancel).await?;
        let deployed = models.resolve(&deploy_key, &self.cancel).await?;

        debug!(
            job = %self.id,
            dataset = %dataset_key,
            initial_model = %initial.url,
            deploy_model = %deployed.url,
            "Resolved job resources"
        );
        self.bind_resources(&dataset.format, initial, deployed);
        Ok(dataset_key)
    }

    async fn ingest_loop(self: Arc<Self>, datasets: DatasetResolver, key: JobId) {
        let mut interval = tokio::time::interval(self.config.dataset_interval());

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(job = %self.id, "Ingestion loop stopping");
                    break;
                }

                _ = interval.tick() => {
                    match datasets.lookup(&key) {
                        Some(dataset) => {
                            self.ingest(&dataset);
                        }
                        None => warn!(job = %self.id, dataset = %key, "Dataset no longer in cache"),
                    }
                }
            }
        }
    }

    /// Ticks on the blocking pool; a tick writes sample files and copies
    /// model artifacts while holding the state lock.
    async fn tick_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(job = %self.id, "Tick loop stopping");
                    break;
                }

                _ = interval.tick() => {
                    let ctrl = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || ctrl.tick()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!(job = %self.id, error = %e, "Phase tick failed"),
                        Err(e) => error!(job = %self.id, error = %e, "Phase tick task panicked"),
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for JobPhaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPhaseController")
            .field("id", &self.id)
            .field("output_dir", &self.layout.root())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::job::sample_definition;
    use crate::relay::{ChannelRelay, OutboundMessage};
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Controller over a temp output dir with a `txt` dataset and `pb` models
    /// bound, reporting into a channel.
    pub(crate) fn controller(
        temp: &TempDir,
    ) -> (Arc<JobPhaseController>, UnboundedReceiver<OutboundMessage>) {
        let (relay, rx) = ChannelRelay::new();
        let output = temp.path().join("out");
        let ctrl = JobPhaseController::new(
            sample_definition(&output.to_string_lossy()),
            Arc::new(relay),
            ControllerConfig::default(),
            CancellationToken::new(),
        )
        .unwrap();
        ctrl.bind_resources(
            "txt",
            ModelInfo::new("pb", "/models/initial.pb"),
            ModelInfo::new("pb", "/models/deploy.pb"),
        );
        (Arc::new(ctrl), rx)
    }

    pub(crate) fn samples(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("img{}.jpg {}", i, i % 2)).collect()
    }
}
