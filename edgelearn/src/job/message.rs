//! Wire messages exchanged with the control plane and with workers.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use super::types::{JobId, ModelInfo, Phase, WorkerStatus};

/// Operation carried in a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create or update a resource.
    Insert,
    /// Delete a resource.
    Delete,
    /// Status report sent upstream.
    Status,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert => f.write_str("insert"),
            Operation::Delete => f.write_str("delete"),
            Operation::Status => f.write_str("status"),
        }
    }
}

/// Routing header of a control-plane message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub namespace: String,
    pub resource_kind: String,
    pub resource_name: String,
    pub operation: Operation,
}

impl MessageHeader {
    /// Identifier of the resource this header addresses.
    pub fn resource_id(&self) -> JobId {
        JobId::from_parts(&self.namespace, &self.resource_name, &self.resource_kind)
    }
}

/// Inbound control-plane message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    /// Raw resource payload (a job definition for insert operations).
    #[serde(default)]
    pub content: Value,
}

/// Input handed to a worker for the next piece of remote work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkerInput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelInfo>,
    #[serde(rename = "dataURL", default, skip_serializing_if = "String::is_empty")]
    pub data_url: String,
    #[serde(rename = "outputDir", default, skip_serializing_if = "String::is_empty")]
    pub output_dir: String,
}

/// Status message describing the work a phase requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub phase: Phase,
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<WorkerInput>,
}

impl UpstreamMessage {
    /// Message without worker input.
    pub fn bare(phase: Phase, status: WorkerStatus) -> Self {
        Self {
            phase,
            status,
            input: None,
        }
    }
}

/// One result object from a worker report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub format: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    /// Additional fields are relayed upstream untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkerResult {
    /// Parses the metrics map of this result.
    ///
    /// Absent metrics yield an empty map; malformed metrics are an error
    /// for the caller to log.
    pub fn parse_metrics(&self) -> Result<HashMap<String, Vec<f64>>, serde_json::Error> {
        match &self.metrics {
            None | Some(Value::Null) => Ok(HashMap::new()),
            Some(value) => serde_json::from_value(value.clone()),
        }
    }
}

/// Status/result report sent by a worker.
///
/// Only the owner identity is required to parse. Phase, status and results
/// are interpreted by the owning job, so a report of any worker kind can
/// still be relayed upstream exactly as it was received.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    /// Worker name.
    pub name: String,
    pub namespace: String,
    pub owner_name: String,
    pub owner_kind: String,
    /// Phase the worker ran for, as sent (`Train`, `Eval`, ...).
    pub kind: String,
    /// Worker status, as sent (`Running`, `Completed`, ...).
    pub status: String,
    raw: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportEnvelope {
    name: String,
    namespace: String,
    owner_name: String,
    owner_kind: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    status: String,
}

impl WorkerReport {
    /// Parses the envelope of a report, keeping the original JSON.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let envelope = ReportEnvelope::deserialize(&raw)?;
        Ok(Self {
            name: envelope.name,
            namespace: envelope.namespace,
            owner_name: envelope.owner_name,
            owner_kind: envelope.owner_kind,
            kind: envelope.kind,
            status: envelope.status,
            raw,
        })
    }

    /// The report exactly as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Declared phase, if it is one this controller runs.
    pub fn phase(&self) -> Option<Phase> {
        Phase::parse(&self.kind)
    }

    /// Declared worker status, if known.
    pub fn worker_status(&self) -> Option<WorkerStatus> {
        WorkerStatus::parse(&self.status)
    }

    /// Result objects of the report. Absent results yield an empty list.
    pub fn results(&self) -> Result<Vec<WorkerResult>, serde_json::Error> {
        match self.raw.get("results") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(results) => Vec::<WorkerResult>::deserialize(results),
        }
    }

    /// Identifier of the job owning the reporting worker.
    pub fn owner_id(&self) -> JobId {
        JobId::from_parts(&self.namespace, &self.owner_name, &self.owner_kind)
    }

    /// Header used to relay this report upstream.
    pub fn upstream_header(&self) -> MessageHeader {
        MessageHeader {
            namespace: self.namespace.clone(),
            resource_kind: self.owner_kind.clone(),
            resource_name: self.owner_name.clone(),
            operation: Operation::Status,
        }
    }
}

impl Serialize for WorkerReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkerReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        WorkerReport::from_value(raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worker_report() {
        let json = r#"{
            "name": "helmet-train-1",
            "namespace": "default",
            "ownerName": "helmet",
            "ownerKind": "incrementallearningjob",
            "kind": "Train",
            "status": "Completed",
            "results": [{"format": "pb", "url": "/out/pb"}]
        }"#;
        let report: WorkerReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.phase(), Some(Phase::Train));
        assert_eq!(report.worker_status(), Some(WorkerStatus::Completed));
        assert_eq!(report.results().unwrap().len(), 1);
        assert_eq!(
            report.owner_id().as_str(),
            "default/helmet/incrementallearningjob"
        );
    }

    #[test]
    fn test_report_of_unknown_kind_keeps_original_json() {
        let raw = serde_json::json!({
            "name": "helmet-infer-1",
            "namespace": "default",
            "ownerName": "helmet",
            "ownerKind": "incrementallearningjob",
            "ownerInfo": {"node": "edge-1"},
            "kind": "Inference",
            "status": "Pending",
            "results": [{"format": "pb", "url": "/out/pb", "score": 3}]
        });

        let report = WorkerReport::from_value(raw.clone()).unwrap();

        assert_eq!(report.kind, "Inference");
        assert_eq!(report.phase(), None);
        assert_eq!(report.worker_status(), None);
        assert_eq!(report.raw(), &raw);
        assert_eq!(serde_json::to_value(&report).unwrap(), raw);
    }

    #[test]
    fn test_report_requires_owner_identity() {
        let raw = serde_json::json!({"name": "w", "kind": "Train", "status": "Running"});
        assert!(WorkerReport::from_value(raw).is_err());
    }

    #[test]
    fn test_malformed_results_parse_lazily() {
        let report = WorkerReport::from_value(serde_json::json!({
            "name": "w",
            "namespace": "default",
            "ownerName": "helmet",
            "ownerKind": "incrementallearningjob",
            "kind": "Train",
            "status": "Completed",
            "results": "none"
        }))
        .unwrap();
        assert!(report.results().is_err());
    }

    #[test]
    fn test_parse_metrics() {
        let result: WorkerResult = serde_json::from_value(serde_json::json!({
            "format": "pb",
            "url": "/m",
            "metrics": {"precision": [0.5, 0.75]}
        }))
        .unwrap();
        let metrics = result.parse_metrics().unwrap();
        assert_eq!(metrics["precision"], vec![0.5, 0.75]);
    }

    #[test]
    fn test_malformed_metrics_is_error() {
        let result: WorkerResult = serde_json::from_value(serde_json::json!({
            "format": "pb",
            "url": "/m",
            "metrics": {"precision": "high"}
        }))
        .unwrap();
        assert!(result.parse_metrics().is_err());
    }

    #[test]
    fn test_upstream_message_wire_names() {
        let msg = UpstreamMessage {
            phase: Phase::Train,
            status: WorkerStatus::Ready,
            input: Some(WorkerInput {
                models: vec![ModelInfo::new("pb", "/m")],
                data_url: "/data/train/1/data.txt".to_string(),
                output_dir: "/train/1".to_string(),
            }),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["phase"], "train");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["input"]["dataURL"], "/data/train/1/data.txt");
        assert_eq!(value["input"]["outputDir"], "/train/1");
    }

    #[test]
    fn test_header_resource_id() {
        let header = MessageHeader {
            namespace: "ns".to_string(),
            resource_kind: "incrementallearningjob".to_string(),
            resource_name: "job".to_string(),
            operation: Operation::Insert,
        };
        assert_eq!(header.resource_id().as_str(), "ns/job/incrementallearningjob");
    }
}
