//! Job data model.
//!
//! - [`types`] - identifiers, phases, statuses and model references
//! - [`definition`] - declarative job definitions from the control plane
//! - [`message`] - control-plane messages, worker reports and upstream status

mod definition;
mod message;
mod types;

pub use definition::{
    DatasetRef, DeploySpec, JobDefinition, JobSpec, ModelRef, ObjectMeta, TrainSpec, TypeMeta,
};
pub use message::{
    Message, MessageHeader, Operation, UpstreamMessage, WorkerInput, WorkerReport, WorkerResult,
};
pub use types::{
    JobId, ModelInfo, Phase, TrainModel, TriggerStatus, WorkerStatus, DATASET_RESOURCE_KIND,
    INCREMENTAL_LEARNING_JOB_KIND, MODEL_RESOURCE_KIND,
};

#[cfg(test)]
pub(crate) use definition::tests::sample_definition;
