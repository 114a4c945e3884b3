//! Bridge Worker
//!
//! Tokio task that owns the settlement adapter. It consumes request events, calls the
//! adapter with at most `max_in_flight` calls outstanding, and delivers each result
//! into the response store. Calls are never retried.

use super::{
    Bridge, BridgeRequest, BridgeResponse, DeliveryOutcome, RequestPayload, RequestReceiver,
    ResponseOutcome, ResponseStore, ResponseValue,
};
use crate::settlement::SettlementAdapter;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct BridgeWorker {
    receiver: RequestReceiver,
    responses: Arc<ResponseStore>,
    adapter: Arc<dyn SettlementAdapter>,
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
}

impl BridgeWorker {
    pub fn new(
        bridge: &Bridge,
        receiver: RequestReceiver,
        adapter: Arc<dyn SettlementAdapter>,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            receiver,
            responses: Arc::clone(bridge.responses()),
            adapter,
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Run the worker on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process requests until every bridge handle is dropped, then drain in-flight calls
    pub async fn run(mut self) {
        info!(max_in_flight = self.max_in_flight, "Bridge worker started");

        while let Some(request) = self.receiver.recv().await {
            if !self.responses.is_pending(request.request_id) {
                debug!(
                    request_id = request.request_id,
                    "Skipping request abandoned before dispatch"
                );
                continue;
            }

            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Bridge worker semaphore closed");
                    break;
                }
            };
            let adapter = Arc::clone(&self.adapter);
            let responses = Arc::clone(&self.responses);

            tokio::spawn(async move {
                let response = fulfill(adapter.as_ref(), request).await;
                let request_id = response.request_id;
                if responses.deliver(response) != DeliveryOutcome::Accepted {
                    debug!(request_id, "Settlement result arrived after request was dropped");
                }
                drop(permit);
            });
        }

        // Wait for in-flight calls before reporting shutdown
        let _ = self
            .semaphore
            .acquire_many(self.max_in_flight as u32)
            .await;
        info!("Bridge worker stopped");
    }
}

/// Call the adapter for one request and wrap the outcome as a response
pub async fn fulfill(adapter: &dyn SettlementAdapter, request: BridgeRequest) -> BridgeResponse {
    let request_id = request.request_id;
    let kind = request.payload.kind();
    let outcome = match request.payload {
        RequestPayload::GetBalance { address } => match adapter.get_balance(&address).await {
            Ok(minor_units) => ResponseOutcome::Result(ResponseValue::Balance {
                address,
                minor_units,
            }),
            Err(e) => ResponseOutcome::Error(e.to_string()),
        },
        RequestPayload::SubmitEscrow {
            recipient,
            requirements,
        } => match adapter.submit_escrow(&recipient, &requirements).await {
            Ok(escrow_ref) => ResponseOutcome::Result(ResponseValue::Escrow { escrow_ref }),
            Err(e) => ResponseOutcome::Error(e.to_string()),
        },
    };

    if let ResponseOutcome::Error(message) = &outcome {
        warn!(request_id, kind = kind.as_str(), error = %message, "Settlement call failed");
    } else {
        debug!(request_id, kind = kind.as_str(), "Settlement call completed");
    }
    BridgeResponse {
        request_id,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeConfig, PollStatus};
    use crate::entry::ServiceRequirements;
    use crate::settlement::{SettlementError, SimulatedSettlement};
    use std::time::Duration;

    const WALLET: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1";

    #[tokio::test]
    async fn worker_resolves_balance_requests() {
        let (bridge, rx) = Bridge::new(&BridgeConfig::default());
        let chain = Arc::new(SimulatedSettlement::new().with_balance(WALLET, 7));
        let handle = BridgeWorker::new(&bridge, rx, chain, 2).spawn();

        let pending = bridge
            .request(RequestPayload::GetBalance { address: WALLET.to_string() })
            .unwrap();
        let value = bridge.wait(&pending, Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            value,
            ResponseValue::Balance { address: WALLET.to_string(), minor_units: 7 }
        );

        drop(bridge);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn adapter_errors_become_error_outcomes() {
        let chain = SimulatedSettlement::new();
        chain.fail_with(Some(SettlementError::Rpc("connection refused".to_string())));
        let response = fulfill(
            &chain,
            BridgeRequest {
                request_id: 9,
                payload: RequestPayload::SubmitEscrow {
                    recipient: WALLET.to_string(),
                    requirements: ServiceRequirements::new(),
                },
            },
        )
        .await;
        assert_eq!(response.request_id, 9);
        assert!(matches!(response.outcome, ResponseOutcome::Error(msg) if msg.contains("connection refused")));
        assert_eq!(chain.escrow_calls(), 1);
    }

    #[tokio::test]
    async fn abandoned_requests_are_not_dispatched() {
        let (bridge, rx) = Bridge::new(&BridgeConfig::default());
        let chain = Arc::new(SimulatedSettlement::new());
        let pending = bridge
            .request(RequestPayload::SubmitEscrow {
                recipient: WALLET.to_string(),
                requirements: ServiceRequirements::new(),
            })
            .unwrap();
        bridge.abandon(pending.request_id);

        let handle = BridgeWorker::new(&bridge, rx, Arc::clone(&chain) as Arc<dyn SettlementAdapter>, 1).spawn();
        drop(bridge);
        handle.await.unwrap();

        assert_eq!(chain.escrow_calls(), 0);
    }

    #[tokio::test]
    async fn late_results_after_abandon_are_ignored() {
        let (bridge, rx) = Bridge::new(&BridgeConfig::default());
        let chain = Arc::new(SimulatedSettlement::new());
        chain.set_delay(Some(Duration::from_millis(50)));
        let handle = BridgeWorker::new(&bridge, rx, Arc::clone(&chain) as Arc<dyn SettlementAdapter>, 1).spawn();

        let pending = bridge
            .request(RequestPayload::SubmitEscrow {
                recipient: WALLET.to_string(),
                requirements: ServiceRequirements::new(),
            })
            .unwrap();
        assert!(bridge.wait(&pending, Duration::from_millis(5)).await.is_err());

        drop(bridge);
        handle.await.unwrap();
        assert_eq!(chain.escrow_calls(), 1);
    }

    #[tokio::test]
    async fn poll_sees_pending_then_ready() {
        let (bridge, rx) = Bridge::new(&BridgeConfig::default());
        let chain = Arc::new(SimulatedSettlement::new());
        chain.set_delay(Some(Duration::from_millis(20)));
        let _handle = BridgeWorker::new(&bridge, rx, Arc::clone(&chain) as Arc<dyn SettlementAdapter>, 1).spawn();

        let pending = bridge
            .request(RequestPayload::GetBalance { address: WALLET.to_string() })
            .unwrap();
        assert_eq!(bridge.poll(pending.request_id), PollStatus::Pending);

        for _ in 0..100 {
            if bridge.poll(pending.request_id) != PollStatus::Pending {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(bridge.poll(pending.request_id), PollStatus::Ready(_)));
    }
}
