//! Settlement Bridge
//!
//! Correlates ledger-side requests with responses produced by an external worker.
//! The ledger side only ever emits a request (an unbounded send that never blocks)
//! and later polls the response store by request id. A [`worker::BridgeWorker`] task
//! owns the settlement client and delivers responses back into the store.
//!
//! Requests and responses also have a JSON signal form, so a bridge running in another
//! process can consume requests and deliver responses the same way.

pub mod responses;
pub mod worker;

use crate::entry::ServiceRequirements;
use crate::error::ApiError;
use crate::types::RequestId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use responses::{DeliveryOutcome, PollStatus, ResponseStore};
pub use worker::BridgeWorker;

/// Process-wide request id counter; ids are never reused
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a request asks the settlement side to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    GetBalance,
    SubmitEscrow,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::GetBalance => "getBalance",
            RequestKind::SubmitEscrow => "submitEscrow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RequestPayload {
    GetBalance {
        address: String,
    },
    SubmitEscrow {
        recipient: String,
        requirements: ServiceRequirements,
    },
}

impl RequestPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestPayload::GetBalance { .. } => RequestKind::GetBalance,
            RequestPayload::SubmitEscrow { .. } => RequestKind::SubmitEscrow,
        }
    }
}

/// Request event emitted towards the settlement side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub request_id: RequestId,
    pub payload: RequestPayload,
}

impl BridgeRequest {
    pub fn to_signal(&self) -> Result<String, ApiError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Successful settlement result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponseValue {
    #[serde(rename_all = "camelCase")]
    Balance {
        address: String,
        #[serde(with = "minor_units")]
        minor_units: u128,
    },
    #[serde(rename_all = "camelCase")]
    Escrow { escrow_ref: String },
}

/// Result or error carried by a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseOutcome {
    Result(ResponseValue),
    Error(String),
}

/// Response event delivered back to the ledger side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub request_id: RequestId,
    #[serde(flatten)]
    pub outcome: ResponseOutcome,
}

/// Handle returned to the caller when a request is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub kind: RequestKind,
}

/// Minor units travel as decimal strings; u128 does not fit a JSON number
mod minor_units {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Bridge limits
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Resolved responses older than this are evicted
    pub response_ttl: Duration,
    /// Maximum number of resolved responses kept
    pub response_capacity: usize,
    /// Maximum concurrent settlement calls in the worker
    pub max_in_flight: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            response_ttl: Duration::from_secs(300),
            response_capacity: 1024,
            max_in_flight: 4,
        }
    }
}

pub type RequestReceiver = mpsc::UnboundedReceiver<BridgeRequest>;

/// Ledger-side end of the bridge
pub struct Bridge {
    sender: mpsc::UnboundedSender<BridgeRequest>,
    responses: Arc<ResponseStore>,
}

impl Bridge {
    /// Create a bridge and the receiver its worker consumes
    pub fn new(config: &BridgeConfig) -> (Self, RequestReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let responses = Arc::new(ResponseStore::new(
            config.response_ttl,
            config.response_capacity,
        ));
        (Self { sender, responses }, receiver)
    }

    pub fn responses(&self) -> &Arc<ResponseStore> {
        &self.responses
    }

    /// Emit a request and return its handle without waiting
    pub fn request(&self, payload: RequestPayload) -> Result<PendingRequest, ApiError> {
        let request_id = next_request_id();
        let kind = payload.kind();
        self.responses.register(request_id, kind);

        if self
            .sender
            .send(BridgeRequest {
                request_id,
                payload,
            })
            .is_err()
        {
            self.responses.abandon(request_id);
            warn!(request_id, kind = kind.as_str(), "Bridge worker is gone, request dropped");
            return Err(ApiError::BridgeError(
                "settlement bridge is not running".to_string(),
            ));
        }

        debug!(request_id, kind = kind.as_str(), "Emitted bridge request");
        Ok(PendingRequest { request_id, kind })
    }

    pub fn poll(&self, request_id: RequestId) -> PollStatus {
        self.responses.poll(request_id)
    }

    pub fn deliver(&self, response: BridgeResponse) -> DeliveryOutcome {
        self.responses.deliver(response)
    }

    /// Deliver a response received as a JSON signal
    pub fn deliver_signal(&self, signal: &str) -> Result<DeliveryOutcome, ApiError> {
        let response: BridgeResponse = serde_json::from_str(signal)?;
        Ok(self.deliver(response))
    }

    /// Stop waiting for a request; a late response is ignored
    pub fn abandon(&self, request_id: RequestId) -> bool {
        self.responses.abandon(request_id)
    }

    /// Wait up to `timeout` for the response to `pending`.
    ///
    /// On timeout the request is abandoned and `BridgeError` returned. An error
    /// outcome from the settlement side is also a `BridgeError`.
    pub async fn wait(
        &self,
        pending: &PendingRequest,
        timeout: Duration,
    ) -> Result<ResponseValue, ApiError> {
        let request_id = pending.request_id;
        match tokio::time::timeout(timeout, self.responses.wait(request_id)).await {
            Ok(outcome) => match outcome? {
                ResponseOutcome::Result(value) => Ok(value),
                ResponseOutcome::Error(message) => Err(ApiError::BridgeError(message)),
            },
            Err(_) => {
                self.abandon(request_id);
                warn!(
                    request_id,
                    kind = pending.kind.as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Bridge request timed out, abandoned"
                );
                Err(ApiError::BridgeError(format!(
                    "{} request {} timed out after {}ms",
                    pending.kind.as_str(),
                    request_id,
                    timeout.as_millis()
                )))
            }
        }
    }
}
