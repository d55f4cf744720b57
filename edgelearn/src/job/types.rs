//! Core job types: identifiers, phases, statuses and model references.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Resource kind of incremental learning jobs.
pub const INCREMENTAL_LEARNING_JOB_KIND: &str = "incrementallearningjob";

/// Resource kind of dataset resources.
pub const DATASET_RESOURCE_KIND: &str = "dataset";

/// Resource kind of model resources.
pub const MODEL_RESOURCE_KIND: &str = "model";

/// Unique identifier of a managed resource.
///
/// Built from namespace, name and kind as `namespace/name/kind`, so that
/// resources of different kinds sharing a name never collide.
///
/// # Example
///
/// ```
/// use edgelearn::job::JobId;
///
/// let id = JobId::from_parts("default", "helmet", "incrementallearningjob");
/// assert_eq!(id.as_str(), "default/helmet/incrementallearningjob");
/// ```
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates an identifier from an already-joined key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an identifier from its namespace, name and kind.
    pub fn from_parts(namespace: &str, name: &str, kind: &str) -> Self {
        Self(format!("{}/{}/{}", namespace, name, kind))
    }

    /// Returns the string value of this identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Phase of an incremental learning job.
///
/// ```text
/// Train ──completed──> Eval ──completed──> Deploy ──> Train
///   ^                                                  │
///   └──────────────── worker failed (train) ───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[serde(alias = "Train")]
    Train,
    #[serde(alias = "Eval")]
    Eval,
    #[serde(alias = "Deploy")]
    Deploy,
}

impl Phase {
    /// Returns the phase that follows this one in the cycle.
    pub fn next(self) -> Phase {
        match self {
            Phase::Train => Phase::Eval,
            Phase::Eval => Phase::Deploy,
            Phase::Deploy => Phase::Train,
        }
    }

    /// Lowercase wire name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Eval => "eval",
            Phase::Deploy => "deploy",
        }
    }

    /// Parses a wire name, ignoring case. Workers send `Train`, `Eval`, ...
    pub fn parse(name: &str) -> Option<Phase> {
        [Phase::Train, Phase::Eval, Phase::Deploy]
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the remote worker for the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    #[serde(alias = "Ready")]
    Ready,
    #[serde(alias = "Running")]
    Running,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Failed")]
    Failed,
    #[serde(alias = "Waiting")]
    Waiting,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Ready => "ready",
            WorkerStatus::Running => "running",
            WorkerStatus::Completed => "completed",
            WorkerStatus::Failed => "failed",
            WorkerStatus::Waiting => "waiting",
        }
    }

    /// Parses a wire name, ignoring case.
    pub fn parse(name: &str) -> Option<WorkerStatus> {
        [
            WorkerStatus::Ready,
            WorkerStatus::Running,
            WorkerStatus::Completed,
            WorkerStatus::Failed,
            WorkerStatus::Waiting,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the remote work for the current phase has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerStatus {
    /// Entered the phase, trigger not yet fired.
    Ready,
    /// Trigger fired and the instruction was sent upstream.
    Completed,
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerStatus::Ready => f.write_str("ready"),
            TriggerStatus::Completed => f.write_str("completed"),
        }
    }
}

/// Reference to a model artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Artifact format, e.g. `pb`.
    pub format: String,

    /// Artifact location as seen by workers.
    pub url: String,

    /// Metric name to per-class (or per-window) values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, Vec<f64>>,
}

impl ModelInfo {
    /// Creates a model reference without metrics.
    pub fn new(format: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            url: url.into(),
            metrics: HashMap::new(),
        }
    }

    /// Attaches metrics to this model reference.
    pub fn with_metrics(mut self, metrics: HashMap<String, Vec<f64>>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Training-side model bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct TrainModel {
    /// Base model the next train cycle starts from.
    pub model: ModelInfo,

    /// Format to trained artifact URL, as reported by the train worker.
    pub trained_model: HashMap<String, String>,

    /// Job output directory the artifacts land in.
    pub output_url: String,
}

impl TrainModel {
    /// URL of the trained artifact for the base model's format.
    ///
    /// Falls back to the base model when no artifact of that format has been
    /// reported yet.
    pub fn current_artifact(&self) -> ModelInfo {
        let format = &self.model.format;
        let url = self
            .trained_model
            .get(format)
            .cloned()
            .unwrap_or_else(|| self.model.url.clone());
        ModelInfo::new(format.clone(), url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_from_parts() {
        let id = JobId::from_parts("ns", "job", INCREMENTAL_LEARNING_JOB_KIND);
        assert_eq!(id.as_str(), "ns/job/incrementallearningjob");
        assert_eq!(format!("{:?}", id), "JobId(ns/job/incrementallearningjob)");
    }

    #[test]
    fn test_phase_cycle() {
        assert_eq!(Phase::Train.next(), Phase::Eval);
        assert_eq!(Phase::Eval.next(), Phase::Deploy);
        assert_eq!(Phase::Deploy.next(), Phase::Train);
    }

    #[test]
    fn test_phase_accepts_capitalised_names() {
        let phase: Phase = serde_json::from_str("\"Train\"").unwrap();
        assert_eq!(phase, Phase::Train);
        let phase: Phase = serde_json::from_str("\"eval\"").unwrap();
        assert_eq!(phase, Phase::Eval);
        assert_eq!(serde_json::to_string(&Phase::Deploy).unwrap(), "\"deploy\"");
    }

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(Phase::parse("Deploy"), Some(Phase::Deploy));
        assert_eq!(Phase::parse("EVAL"), Some(Phase::Eval));
        assert_eq!(Phase::parse("inference"), None);
        assert_eq!(WorkerStatus::parse("Running"), Some(WorkerStatus::Running));
        assert_eq!(WorkerStatus::parse("Pending"), None);
    }

    #[test]
    fn test_worker_status_accepts_capitalised_names() {
        let status: WorkerStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(status, WorkerStatus::Completed);
        let status: WorkerStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(status, WorkerStatus::Failed);
    }

    #[test]
    fn test_current_artifact_prefers_trained_model() {
        let mut train = TrainModel {
            model: ModelInfo::new("pb", "/models/base.pb"),
            ..Default::default()
        };
        assert_eq!(train.current_artifact().url, "/models/base.pb");

        train
            .trained_model
            .insert("pb".to_string(), "/out/train/1/model.pb".to_string());
        assert_eq!(train.current_artifact().url, "/out/train/1/model.pb");
    }

    #[test]
    fn test_model_info_skips_empty_metrics() {
        let json = serde_json::to_string(&ModelInfo::new("pb", "/m")).unwrap();
        assert_eq!(json, r#"{"format":"pb","url":"/m"}"#);
    }
}
