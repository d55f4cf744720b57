//! Job lifecycle management.
//!
//! [`JobManager`] is the entry point of the controller: control-plane
//! messages create, update and delete jobs; worker reports are queued to the
//! router. Each job runs as its own task, cancelled through a child of the
//! manager's shutdown token.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::controller::{ControllerConfig, ControllerError, JobPhaseController};
use crate::job::{
    JobDefinition, JobId, Message, MessageHeader, Operation, WorkerReport,
    INCREMENTAL_LEARNING_JOB_KIND,
};
use crate::relay::MessageRelay;
use crate::resource::{DatasetResolver, ModelResolver};
use crate::router::{JobRegistry, WorkerReportRouter};
use crate::store::{JobStore, StoreError};

/// Errors raised by the job manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// The message content is not a valid job definition.
    #[error("Invalid job definition: {0}")]
    Definition(#[from] serde_json::Error),

    #[error("Unsupported resource kind '{0}'")]
    UnsupportedKind(String),

    #[error("Unsupported operation '{0}'")]
    UnsupportedOperation(Operation),

    #[error("Worker report channel closed")]
    ReportChannelClosed,

    #[error("Job manager already started")]
    AlreadyStarted,

    /// The definition names a different job than the one it is filed under.
    #[error("Definition for '{actual}' filed under '{expected}'")]
    IdMismatch { expected: JobId, actual: JobId },
}

/// Registry and lifecycle of incremental learning jobs.
pub struct JobManager {
    registry: JobRegistry,
    tasks: Mutex<HashMap<JobId, JoinHandle<()>>>,
    store: Arc<dyn JobStore>,
    datasets: DatasetResolver,
    models: ModelResolver,
    relay: Arc<dyn MessageRelay>,
    config: ControllerConfig,
    shutdown: CancellationToken,
    report_tx: mpsc::Sender<WorkerReport>,
    report_rx: Mutex<Option<mpsc::Receiver<WorkerReport>>>,
    router_task: Mutex<Option<JoinHandle<()>>>,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        datasets: DatasetResolver,
        models: ModelResolver,
        relay: Arc<dyn MessageRelay>,
        config: ControllerConfig,
    ) -> Self {
        let (report_tx, report_rx) = mpsc::channel(config.report_channel_capacity());
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            tasks: Mutex::new(HashMap::new()),
            store,
            datasets,
            models,
            relay,
            config,
            shutdown: CancellationToken::new(),
            report_tx,
            report_rx: Mutex::new(Some(report_rx)),
            router_task: Mutex::new(None),
        }
    }

    /// Starts the worker report router. Must be called within a runtime.
    pub fn start(&self) -> Result<(), ManagerError> {
        let reports = self
            .report_rx
            .lock()
            .take()
            .ok_or(ManagerError::AlreadyStarted)?;
        let router = WorkerReportRouter::new(Arc::clone(&self.registry), Arc::clone(&self.relay));
        let handle = tokio::spawn(router.run(reports, self.shutdown.clone()));
        *self.router_task.lock() = Some(handle);
        info!("Job manager started");
        Ok(())
    }

    /// Dispatches a control-plane message by its header operation.
    pub async fn handle_message(&self, message: Message) -> Result<(), ManagerError> {
        let header = &message.header;
        if header.resource_kind != INCREMENTAL_LEARNING_JOB_KIND {
            return Err(ManagerError::UnsupportedKind(header.resource_kind.clone()));
        }

        let id = header.resource_id();
        match header.operation {
            Operation::Insert => {
                let mut definition: JobDefinition = serde_json::from_value(message.content)?;
                adopt_header_identity(&mut definition, header);
                self.on_create(id, definition)
            }
            Operation::Delete => self.on_delete(&id).await,
            Operation::Status => Err(ManagerError::UnsupportedOperation(Operation::Status)),
        }
    }

    /// Persists the definition and starts the job if it is not running.
    ///
    /// For a running job the definition is updated in place. The definition
    /// must describe the job `id` names.
    pub fn on_create(&self, id: JobId, definition: JobDefinition) -> Result<(), ManagerError> {
        let actual = definition.job_id();
        if actual != id {
            return Err(ManagerError::IdMismatch {
                expected: id,
                actual,
            });
        }

        self.store
            .save(&id, &definition.type_meta, &definition.metadata, &definition.spec)?;

        let mut registry = self.registry.write();
        let running = registry
            .get(&id)
            .filter(|job| !job.is_cancelled())
            .cloned();
        if let Some(job) = running {
            drop(registry);
            job.update_definition(definition);
            return Ok(());
        }

        let job = Arc::new(JobPhaseController::new(
            definition,
            Arc::clone(&self.relay),
            self.config.clone(),
            self.shutdown.child_token(),
        )?);
        registry.insert(id.clone(), Arc::clone(&job));
        drop(registry);

        let handle = tokio::spawn(job.run(self.datasets.clone(), self.models.clone()));
        self.tasks.lock().insert(id.clone(), handle);

        info!(job = %id, "Job created");
        Ok(())
    }

    /// Removes the persisted definition and stops the job.
    ///
    /// The job's tasks have exited before it leaves the registry. Deleting
    /// an unknown job only removes the persisted definition.
    pub async fn on_delete(&self, id: &JobId) -> Result<(), ManagerError> {
        let stored = self.store.delete(id);
        if let Err(e) = &stored {
            error!(job = %id, error = %e, "Failed to delete job definition");
        }

        let job = self.registry.read().get(id).cloned();
        if let Some(job) = job {
            job.cancel();
            let handle = self.tasks.lock().remove(id);
            if let Some(handle) = handle {
                if let Err(e) = handle.await {
                    warn!(job = %id, error = %e, "Job task ended abnormally");
                }
            }

            let mut registry = self.registry.write();
            if registry.get(id).is_some_and(|current| Arc::ptr_eq(current, &job)) {
                registry.remove(id);
            }
            info!(job = %id, "Job deleted");
        }

        stored.map_err(ManagerError::from)
    }

    /// Queues a worker report for routing.
    pub async fn submit_report(&self, report: WorkerReport) -> Result<(), ManagerError> {
        self.report_tx
            .send(report)
            .await
            .map_err(|_| ManagerError::ReportChannelClosed)
    }

    pub fn job(&self, id: &JobId) -> Option<Arc<JobPhaseController>> {
        self.registry.read().get(id).cloned()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.registry.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// Stops every job and the router, waiting for their tasks to exit.
    pub async fn shutdown(&self) {
        info!(jobs = self.len(), "Job manager shutting down");
        self.shutdown.cancel();

        let handles: Vec<(JobId, JoinHandle<()>)> = self.tasks.lock().drain().collect();
        for (id, handle) in handles {
            if let Err(e) = handle.await {
                warn!(job = %id, error = %e, "Job task ended abnormally");
            }
        }

        let router = self.router_task.lock().take();
        if let Some(router) = router {
            if let Err(e) = router.await {
                warn!(error = %e, "Router task ended abnormally");
            }
        }

        self.registry.write().clear();
        info!("Job manager stopped");
    }
}

/// The header names the job; the definition's metadata follows it.
fn adopt_header_identity(definition: &mut JobDefinition, header: &MessageHeader) {
    let metadata = &mut definition.metadata;
    if metadata.namespace != header.namespace || metadata.name != header.resource_name {
        warn!(
            job = %header.resource_id(),
            namespace = %metadata.namespace,
            name = %metadata.name,
            "Definition metadata differs from message header, using header"
        );
        metadata.namespace = header.namespace.clone();
        metadata.name = header.resource_name.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{sample_definition, ModelInfo};
    use crate::relay::ChannelRelay;
    use crate::resource::{Dataset, MemoryCache};
    use crate::retry::RetryPolicy;
    use crate::store::MemoryJobStore;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        manager: JobManager,
        store: Arc<MemoryJobStore>,
        _temp: TempDir,
        output: String,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let datasets: Arc<MemoryCache<Dataset>> = Arc::new(MemoryCache::new());
        let models: Arc<MemoryCache<ModelInfo>> = Arc::new(MemoryCache::new());
        let policy = RetryPolicy::new(Duration::from_millis(10), 3);
        let (relay, _rx) = ChannelRelay::new();
        let manager = JobManager::new(
            store.clone(),
            DatasetResolver::new(datasets, policy),
            ModelResolver::new(models, policy),
            Arc::new(relay),
            ControllerConfig::default(),
        );
        let output = temp.path().join("out").to_string_lossy().into_owned();
        Fixture {
            manager,
            store,
            _temp: temp,
            output,
        }
    }

    fn id() -> JobId {
        JobId::from("default/helmet/incrementallearningjob")
    }

    fn message(operation: Operation, content: serde_json::Value) -> Message {
        Message {
            header: MessageHeader {
                namespace: "default".to_string(),
                resource_kind: INCREMENTAL_LEARNING_JOB_KIND.to_string(),
                resource_name: "helmet".to_string(),
                operation,
            },
            content,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_persists_and_registers() {
        let f = fixture();

        f.manager.on_create(id(), sample_definition(&f.output)).unwrap();

        assert_eq!(f.store.len(), 1);
        assert_eq!(f.manager.job_ids(), vec![id()]);
        f.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_create_updates_definition_in_place() {
        let f = fixture();
        f.manager.on_create(id(), sample_definition(&f.output)).unwrap();
        let first = f.manager.job(&id()).unwrap();

        let mut updated = sample_definition(&f.output);
        updated.spec.dataset.train_prob = 0.9;
        f.manager.on_create(id(), updated).unwrap();

        let second = f.manager.job(&id()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.manager.len(), 1);
        let stored = f.store.load(&id()).unwrap().unwrap();
        assert_eq!(stored.spec.dataset.train_prob, 0.9);
        f.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_stops_and_removes() {
        let f = fixture();
        f.manager.on_create(id(), sample_definition(&f.output)).unwrap();
        let job = f.manager.job(&id()).unwrap();

        f.manager.on_delete(&id()).await.unwrap();

        assert!(job.is_cancelled());
        assert!(f.manager.is_empty());
        assert!(f.store.is_empty());
        f.manager.on_delete(&id()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_message_dispatch() {
        let f = fixture();
        let content = serde_json::to_value(sample_definition(&f.output)).unwrap();

        f.manager
            .handle_message(message(Operation::Insert, content))
            .await
            .unwrap();
        assert_eq!(f.manager.len(), 1);

        f.manager
            .handle_message(message(Operation::Delete, serde_json::Value::Null))
            .await
            .unwrap();
        assert!(f.manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_message_rejects_other_kinds() {
        let f = fixture();
        let mut msg = message(Operation::Insert, serde_json::Value::Null);
        msg.header.resource_kind = "federatedlearningjob".to_string();

        let err = f.manager.handle_message(msg).await.unwrap_err();
        assert!(matches!(err, ManagerError::UnsupportedKind(_)));

        let err = f
            .manager
            .handle_message(message(Operation::Insert, serde_json::json!({"spec": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::Definition(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_header_namespace_names_the_job() {
        let f = fixture();
        let mut content = serde_json::to_value(sample_definition(&f.output)).unwrap();
        content["metadata"] = serde_json::json!({ "name": "helmet" });
        let mut msg = message(Operation::Insert, content);
        msg.header.namespace = "prod".to_string();
        let expected = JobId::from("prod/helmet/incrementallearningjob");

        f.manager.handle_message(msg).await.unwrap();

        assert_eq!(f.manager.job_ids(), vec![expected.clone()]);
        let job = f.manager.job(&expected).unwrap();
        assert_eq!(job.id(), &expected);
        let stored = f.store.load(&expected).unwrap().unwrap();
        assert_eq!(stored.metadata.namespace, "prod");
        f.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejects_definition_of_another_job() {
        let f = fixture();
        let other = JobId::from("prod/helmet/incrementallearningjob");

        let err = f
            .manager
            .on_create(other.clone(), sample_definition(&f.output))
            .unwrap_err();

        match err {
            ManagerError::IdMismatch { expected, actual } => {
                assert_eq!(expected, other);
                assert_eq!(actual, id());
            }
            err => panic!("unexpected error: {err}"),
        }
        assert!(f.manager.is_empty());
        assert!(f.store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_fails() {
        let f = fixture();
        f.manager.start().unwrap();
        assert!(matches!(f.manager.start(), Err(ManagerError::AlreadyStarted)));
        f.manager.shutdown().await;
    }
}
