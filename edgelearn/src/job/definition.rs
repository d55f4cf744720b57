//! Job definitions as delivered by the control plane.
//!
//! The definition is the declarative part of a job: which dataset to learn
//! from, which models to start from and deploy to, and the trigger rules that
//! gate each phase. Runtime phase state lives in the controller, never here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{
    JobId, DATASET_RESOURCE_KIND, INCREMENTAL_LEARNING_JOB_KIND, MODEL_RESOURCE_KIND,
};

/// Type information of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

/// Identity of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Dataset the job consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub name: String,
    /// Share of newly arrived samples assigned to training (0.0-1.0).
    pub train_prob: f64,
}

/// Reference to a model resource by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
}

/// Train phase settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSpec {
    /// Trigger rule evaluated against `num_of_samples`.
    pub trigger: Value,
}

/// Deploy phase settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploySpec {
    /// Model resource whose artifact gets replaced on deploy.
    pub model: ModelRef,
    /// Trigger rule evaluated against evaluation metrics and their deltas.
    pub trigger: Value,
}

/// Desired state of an incremental learning job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub dataset: DatasetRef,
    pub initial_model: ModelRef,
    pub train_spec: TrainSpec,
    pub deploy_spec: DeploySpec,
    pub output_dir: String,
}

/// Complete job definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: JobSpec,
}

impl JobDefinition {
    /// Identifier of the job this definition describes.
    pub fn job_id(&self) -> JobId {
        JobId::from_parts(
            &self.metadata.namespace,
            &self.metadata.name,
            INCREMENTAL_LEARNING_JOB_KIND,
        )
    }

    /// Cache key of the dataset this job consumes.
    pub fn dataset_key(&self) -> JobId {
        JobId::from_parts(
            &self.metadata.namespace,
            &self.spec.dataset.name,
            DATASET_RESOURCE_KIND,
        )
    }

    /// Cache key of the model the first train cycle starts from.
    pub fn initial_model_key(&self) -> JobId {
        JobId::from_parts(
            &self.metadata.namespace,
            &self.spec.initial_model.name,
            MODEL_RESOURCE_KIND,
        )
    }

    /// Cache key of the model deployments overwrite.
    pub fn deploy_model_key(&self) -> JobId {
        JobId::from_parts(
            &self.metadata.namespace,
            &self.spec.deploy_spec.model.name,
            MODEL_RESOURCE_KIND,
        )
    }
}
