//! Outbound message relay to the control plane.
//!
//! The transport itself lives outside this crate. The controller hands every
//! upstream message to a [`MessageRelay`]: phase outcomes with
//! `operation = status`, and raw worker reports relayed unmodified.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::job::MessageHeader;

/// Errors raised while relaying a message upstream.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The payload could not be serialised.
    #[error("Failed to encode upstream message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport is gone.
    #[error("Upstream channel closed")]
    Closed,
}

/// A message on its way upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub header: MessageHeader,
    pub content: Value,
}

/// Sends messages to the control plane.
pub trait MessageRelay: Send + Sync {
    /// Sends `payload` under `header`.
    fn send(&self, payload: Value, header: &MessageHeader) -> Result<(), RelayError>;
}

/// Serialises `payload` and sends it through `relay`.
pub fn send_json<T: Serialize>(
    relay: &dyn MessageRelay,
    payload: &T,
    header: &MessageHeader,
) -> Result<(), RelayError> {
    relay.send(serde_json::to_value(payload)?, header)
}

/// Relay that forwards messages into a channel drained by the transport.
#[derive(Debug, Clone)]
pub struct ChannelRelay {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelRelay {
    /// Creates a relay and the receiver the transport drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageRelay for ChannelRelay {
    fn send(&self, payload: Value, header: &MessageHeader) -> Result<(), RelayError> {
        self.tx
            .send(OutboundMessage {
                header: header.clone(),
                content: payload,
            })
            .map_err(|_| RelayError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Operation, Phase, UpstreamMessage, WorkerStatus};

    fn header() -> MessageHeader {
        MessageHeader {
            namespace: "default".to_string(),
            resource_kind: "incrementallearningjob".to_string(),
            resource_name: "helmet".to_string(),
            operation: Operation::Status,
        }
    }

    #[test]
    fn test_channel_relay_delivers() {
        let (relay, mut rx) = ChannelRelay::new();
        let msg = UpstreamMessage::bare(Phase::Train, WorkerStatus::Waiting);

        send_json(&relay, &msg, &header()).unwrap();

        let out = rx.try_recv().unwrap();
        assert_eq!(out.header.operation, Operation::Status);
        assert_eq!(out.content["phase"], "train");
        assert_eq!(out.content["status"], "waiting");
    }

    #[test]
    fn test_channel_relay_closed() {
        let (relay, rx) = ChannelRelay::new();
        drop(rx);

        let err = relay.send(Value::Null, &header()).unwrap_err();
        assert!(matches!(err, RelayError::Closed));
    }
}
