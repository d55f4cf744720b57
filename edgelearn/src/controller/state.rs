//! Mutable per-job state and its read-only snapshot.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::job::{
    JobDefinition, JobId, ModelInfo, Phase, TrainModel, TriggerStatus, WorkerStatus,
};
use crate::sample::SampleWindow;

/// Everything a job controller mutates, guarded by one lock.
#[derive(Debug)]
pub(super) struct JobState {
    pub definition: JobDefinition,
    pub version: u64,
    pub phase: Phase,
    pub worker_status: WorkerStatus,
    pub trigger_status: TriggerStatus,
    /// Time of the last train trigger. Informational only.
    pub trigger_time: Option<DateTime<Utc>>,
    pub train_data_url: Option<PathBuf>,
    pub eval_data_url: Option<PathBuf>,
    pub samples: SampleWindow,
    pub train_model: TrainModel,
    pub deploy_model: ModelInfo,
    /// (new, old) pair from the last completed evaluation.
    pub eval_results: Vec<ModelInfo>,
    pub dataset_format: String,
}

impl JobState {
    pub fn new(definition: JobDefinition, eval_window_capacity: usize, output_url: String) -> Self {
        Self {
            definition,
            version: 0,
            phase: Phase::Train,
            worker_status: WorkerStatus::Ready,
            trigger_status: TriggerStatus::Ready,
            trigger_time: None,
            train_data_url: None,
            eval_data_url: None,
            samples: SampleWindow::new(eval_window_capacity),
            train_model: TrainModel {
                output_url,
                ..Default::default()
            },
            deploy_model: ModelInfo::default(),
            eval_results: Vec::new(),
            dataset_format: String::new(),
        }
    }

    /// Whether the current phase's trigger is still to be evaluated.
    pub fn awaiting_trigger(&self) -> bool {
        self.worker_status == WorkerStatus::Ready && self.trigger_status == TriggerStatus::Ready
    }

    fn reset_status(&mut self) {
        self.worker_status = WorkerStatus::Ready;
        self.trigger_status = TriggerStatus::Ready;
    }

    /// Returns to the start of the train phase.
    pub fn back_task(&mut self) {
        self.phase = Phase::Train;
        self.reset_status();
    }

    /// Leaves the current phase for the next one in the cycle.
    pub fn next_task(&mut self) {
        self.forward_samples();
        self.phase = self.phase.next();
        self.reset_status();
    }

    fn forward_samples(&mut self) {
        match self.phase {
            Phase::Train => self.samples.clear_train(),
            Phase::Eval => {
                self.samples.evict_over_capacity();
            }
            Phase::Deploy => {}
        }
    }

    pub fn snapshot(&self, id: &JobId) -> JobSnapshot {
        JobSnapshot {
            id: id.clone(),
            version: self.version,
            phase: self.phase,
            worker_status: self.worker_status,
            trigger_status: self.trigger_status,
            trigger_time: self.trigger_time,
            numbers_seen: self.samples.numbers_seen(),
            train_sample_count: self.samples.train_samples().len(),
            eval_window_count: self.samples.eval_window_count(),
            eval_sample_count: self.samples.eval_samples().len(),
            base_model: self.train_model.model.clone(),
            trained_models: self.train_model.trained_model.clone(),
            deploy_model: self.deploy_model.clone(),
            eval_result_count: self.eval_results.len(),
            train_data_url: self.train_data_url.clone(),
            eval_data_url: self.eval_data_url.clone(),
        }
    }
}

/// Point-in-time view of a job, for logging and inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub version: u64,
    pub phase: Phase,
    pub worker_status: WorkerStatus,
    pub trigger_status: TriggerStatus,
    pub trigger_time: Option<DateTime<Utc>>,
    pub numbers_seen: usize,
    pub train_sample_count: usize,
    pub eval_window_count: usize,
    pub eval_sample_count: usize,
    pub base_model: ModelInfo,
    pub trained_models: HashMap<String, String>,
    pub deploy_model: ModelInfo,
    pub eval_result_count: usize,
    pub train_data_url: Option<PathBuf>,
    pub eval_data_url: Option<PathBuf>,
}
