//! End-to-end job lifecycle through the manager, router and controller.
//!
//! Runs on a paused tokio clock: timers fire as soon as every task is idle.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use edgelearn::controller::ControllerConfig;
use edgelearn::job::{JobId, Message, ModelInfo, Phase, WorkerReport, WorkerStatus};
use edgelearn::manager::JobManager;
use edgelearn::relay::{ChannelRelay, OutboundMessage};
use edgelearn::resource::{Dataset, DatasetResolver, MemoryCache, ModelResolver};
use edgelearn::retry::RetryPolicy;
use edgelearn::store::{JobStore, MemoryJobStore};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const JOB_ID: &str = "default/helmet/incrementallearningjob";

struct Harness {
    manager: JobManager,
    upstream: UnboundedReceiver<OutboundMessage>,
    datasets: Arc<MemoryCache<Dataset>>,
    models: Arc<MemoryCache<ModelInfo>>,
    store: Arc<MemoryJobStore>,
    temp: TempDir,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let datasets: Arc<MemoryCache<Dataset>> = Arc::new(MemoryCache::new());
        let models: Arc<MemoryCache<ModelInfo>> = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryJobStore::new());
        let (relay, upstream) = ChannelRelay::new();
        let config = ControllerConfig::new()
            .with_tick_interval(Duration::from_secs(1))
            .with_dataset_interval(Duration::from_secs(1))
            .with_resolve_policy(RetryPolicy::new(Duration::from_millis(100), 20));

        let manager = JobManager::new(
            store.clone(),
            DatasetResolver::new(datasets.clone(), config.resolve_policy()),
            ModelResolver::new(models.clone(), config.resolve_policy()),
            Arc::new(relay),
            config,
        );
        manager.start().unwrap();

        Self {
            manager,
            upstream,
            datasets,
            models,
            store,
            temp,
        }
    }

    fn path(&self, rel: &str) -> String {
        self.temp.path().join(rel).to_string_lossy().into_owned()
    }

    fn publish_resources(&self, sample_count: usize) {
        let samples = (1..=sample_count)
            .map(|i| format!("images/{}.jpg {}", i, i % 2))
            .collect();
        self.datasets.insert(
            JobId::from("default/helmet-data/dataset"),
            Dataset::new("txt", samples),
        );
        self.models.insert(
            JobId::from("default/initial-model/model"),
            ModelInfo::new("pb", self.path("models/initial.pb")),
        );
        self.models.insert(
            JobId::from("default/deploy-model/model"),
            ModelInfo::new("pb", self.path("models/deployed.pb")),
        );
    }

    fn message(&self, operation: &str) -> Message {
        serde_json::from_value(json!({
            "header": {
                "namespace": "default",
                "resourceKind": "incrementallearningjob",
                "resourceName": "helmet",
                "operation": operation
            },
            "content": {
                "apiVersion": "edgelearn.io/v1alpha1",
                "kind": "IncrementalLearningJob",
                "metadata": { "name": "helmet", "namespace": "default" },
                "spec": {
                    "dataset": { "name": "helmet-data", "trainProb": 0.5 },
                    "initialModel": { "name": "initial-model" },
                    "trainSpec": {
                        "trigger": { "condition": { "operator": ">", "threshold": 10 } }
                    },
                    "deploySpec": {
                        "model": { "name": "deploy-model" },
                        "trigger": {
                            "condition": {
                                "operator": ">",
                                "threshold": 0.0,
                                "metric": "precision_delta"
                            }
                        }
                    },
                    "outputDir": self.path("out")
                }
            }
        }))
        .unwrap()
    }

    /// Next phase status message, skipping relayed worker reports.
    async fn next_status(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(60), self.upstream.recv())
                .await
                .expect("no upstream message within 60s")
                .expect("relay closed");
            if message.content.get("phase").is_some() {
                return message.content;
            }
        }
    }

    async fn report(&self, kind: &str, status: &str, results: Value) {
        let report: WorkerReport = serde_json::from_value(json!({
            "name": format!("helmet-{}-worker", kind.to_lowercase()),
            "namespace": "default",
            "ownerName": "helmet",
            "ownerKind": "incrementallearningjob",
            "kind": kind,
            "status": status,
            "results": results
        }))
        .unwrap();
        self.manager.submit_report(report).await.unwrap();
    }
}

fn write_file(path: &str, content: &[u8]) {
    let path = Path::new(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[tokio::test(start_paused = true)]
async fn full_cycle_train_eval_deploy() {
    let mut h = Harness::new();
    h.publish_resources(30);
    h.manager.handle_message(h.message("insert")).await.unwrap();
    assert_eq!(h.store.len(), 1);

    // Train: 15 of 30 samples buffered, threshold 10
    let train = h.next_status().await;
    assert_eq!(train["phase"], "train");
    assert_eq!(train["status"], "ready");
    assert_eq!(train["input"]["models"][0]["url"], h.path("models/initial.pb"));
    assert_eq!(train["input"]["outputDir"], h.path("out/train/1"));
    let train_data = fs::read_to_string(h.path("out/data/train/1/data.txt")).unwrap();
    assert_eq!(train_data.lines().count(), 15);

    let trained = h.path("out/train/1/model.pb");
    write_file(&trained, b"trained weights");
    write_file(&h.path("models/deployed.pb"), b"old weights");
    h.report("Train", "Completed", json!([{"format": "pb", "url": trained}]))
        .await;

    // Eval: trained artifact against the deployed one
    let eval = h.next_status().await;
    assert_eq!(eval["phase"], "eval");
    assert_eq!(eval["input"]["models"][0]["url"], trained.as_str());
    assert_eq!(eval["input"]["models"][1]["url"], h.path("models/deployed.pb"));
    assert!(Path::new(&h.path("out/data/eval/1/data.txt")).is_file());

    h.report(
        "Eval",
        "Completed",
        json!([
            {"format": "pb", "url": trained, "metrics": {"precision": [0.9, 0.8]}},
            {"format": "pb", "url": h.path("models/deployed.pb"), "metrics": {"precision": [0.7, 0.6]}}
        ]),
    )
    .await;

    // Deploy: precision improved, artifact copied over the deployed model
    let deploy = h.next_status().await;
    assert_eq!(deploy["phase"], "deploy");
    assert_eq!(deploy["status"], "ready");
    assert_eq!(deploy["input"]["models"][0]["url"], trained.as_str());
    assert_eq!(fs::read(h.path("models/deployed.pb")).unwrap(), b"trained weights");

    let job = h.manager.job(&JobId::from(JOB_ID)).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let snap = job.snapshot();
    assert_eq!(snap.phase, Phase::Train);
    assert_eq!(snap.version, 1);
    assert_eq!(snap.train_sample_count, 0);

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_train_worker_retriggers_training() {
    let mut h = Harness::new();
    h.publish_resources(30);
    h.manager.handle_message(h.message("insert")).await.unwrap();

    let first = h.next_status().await;
    assert_eq!(first["input"]["outputDir"], h.path("out/train/1"));

    h.report("Train", "Failed", json!([])).await;

    let retry = h.next_status().await;
    assert_eq!(retry["phase"], "train");
    assert_eq!(retry["status"], "ready");
    assert_eq!(retry["input"]["outputDir"], h.path("out/train/2"));

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn report_for_wrong_phase_is_relayed_but_ignored() {
    let mut h = Harness::new();
    h.publish_resources(30);
    h.manager.handle_message(h.message("insert")).await.unwrap();
    h.next_status().await;

    let raw = json!({
        "name": "helmet-eval-worker",
        "namespace": "default",
        "ownerName": "helmet",
        "ownerKind": "incrementallearningjob",
        "ownerInfo": {"node": "edge-1"},
        "kind": "Eval",
        "status": "Completed",
        "results": []
    });
    h.manager
        .submit_report(WorkerReport::from_value(raw.clone()).unwrap())
        .await
        .unwrap();

    let relayed = tokio::time::timeout(Duration::from_secs(5), h.upstream.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(relayed.content, raw);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let snap = h.manager.job(&JobId::from(JOB_ID)).unwrap().snapshot();
    assert_eq!(snap.phase, Phase::Train);
    assert_eq!(snap.worker_status, WorkerStatus::Ready);

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn report_of_unknown_kind_is_relayed_but_ignored() {
    let mut h = Harness::new();
    h.publish_resources(30);
    h.manager.handle_message(h.message("insert")).await.unwrap();
    h.next_status().await;

    h.report("inference", "Completed", json!([{"format": "pb", "url": "/x"}]))
        .await;

    let relayed = tokio::time::timeout(Duration::from_secs(5), h.upstream.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(relayed.content["kind"], "inference");

    tokio::time::sleep(Duration::from_secs(3)).await;
    let snap = h.manager.job(&JobId::from(JOB_ID)).unwrap().snapshot();
    assert_eq!(snap.phase, Phase::Train);
    assert_eq!(snap.worker_status, WorkerStatus::Ready);

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn missing_model_never_starts_job() {
    let mut h = Harness::new();
    h.datasets.insert(
        JobId::from("default/helmet-data/dataset"),
        Dataset::new("txt", vec!["a".to_string(); 40]),
    );
    h.manager.handle_message(h.message("insert")).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(30), h.upstream.recv()).await;
    assert!(waited.is_err(), "job without its model must not dispatch work");

    let snap = h.manager.job(&JobId::from(JOB_ID)).unwrap().snapshot();
    assert_eq!(snap.version, 0);
    assert_eq!(snap.numbers_seen, 0);

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn delete_then_recreate_starts_from_scratch() {
    let mut h = Harness::new();
    h.publish_resources(30);
    h.manager.handle_message(h.message("insert")).await.unwrap();
    h.next_status().await;
    let id = JobId::from(JOB_ID);
    assert_eq!(h.manager.job(&id).unwrap().snapshot().version, 1);

    h.manager.handle_message(h.message("delete")).await.unwrap();
    assert!(h.manager.job(&id).is_none());
    assert!(h.store.load(&id).unwrap().is_none());

    h.manager.handle_message(h.message("insert")).await.unwrap();
    let snap = h.manager.job(&id).unwrap().snapshot();
    assert_eq!(snap.version, 0);
    assert_eq!(snap.phase, Phase::Train);

    let restarted = h.next_status().await;
    assert_eq!(restarted["input"]["outputDir"], h.path("out/train/1"));

    h.manager.shutdown().await;
}
