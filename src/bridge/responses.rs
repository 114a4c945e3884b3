//! Response Store
//!
//! Bounded store of bridge responses keyed by request id. An id is accepted for
//! delivery only while it is pending, so each request resolves at most once; repeats
//! and responses for abandoned or never-issued ids are ignored. Resolved responses
//! expire after a TTL and the oldest are dropped first once capacity is reached.

use super::{BridgeResponse, RequestKind, ResponseOutcome};
use crate::error::ApiError;
use crate::types::RequestId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Result of handing a response to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// First response for a pending request
    Accepted,
    /// The request was already resolved; ignored
    Duplicate,
    /// The request was abandoned, evicted or never issued; ignored
    Unknown,
}

/// State of a request as seen by a poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Ready(ResponseOutcome),
    NotFound,
}

#[derive(Debug)]
struct Resolved {
    outcome: ResponseOutcome,
    received_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    pending: HashMap<RequestId, RequestKind>,
    resolved: HashMap<RequestId, Resolved>,
    /// Resolution order, oldest first; may hold ids already taken or evicted
    order: VecDeque<RequestId>,
}

impl Inner {
    fn evict_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut evicted = 0;
        while let Some(id) = self.order.front().copied() {
            match self.resolved.get(&id) {
                Some(entry) if now.duration_since(entry.received_at) < ttl => break,
                Some(_) => {
                    self.resolved.remove(&id);
                    evicted += 1;
                }
                None => {}
            }
            self.order.pop_front();
        }
        evicted
    }

    fn evict_oldest(&mut self) -> Option<RequestId> {
        while let Some(id) = self.order.pop_front() {
            if self.resolved.remove(&id).is_some() {
                return Some(id);
            }
        }
        None
    }
}

pub struct ResponseStore {
    inner: Mutex<Inner>,
    notify: Notify,
    ttl: Duration,
    capacity: usize,
}

impl ResponseStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Mark a freshly issued request as awaiting its response
    pub fn register(&self, request_id: RequestId, kind: RequestKind) {
        self.inner.lock().pending.insert(request_id, kind);
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.inner.lock().pending.contains_key(&request_id)
    }

    /// Accept a response if, and only if, its request is still pending
    pub fn deliver(&self, response: BridgeResponse) -> DeliveryOutcome {
        let request_id = response.request_id;
        let now = Instant::now();
        let outcome = {
            let mut inner = self.inner.lock();
            inner.evict_expired(now, self.ttl);

            if inner.resolved.contains_key(&request_id) {
                DeliveryOutcome::Duplicate
            } else if inner.pending.remove(&request_id).is_none() {
                DeliveryOutcome::Unknown
            } else {
                if inner.resolved.len() >= self.capacity {
                    if let Some(evicted) = inner.evict_oldest() {
                        debug!(request_id = evicted, "Evicted oldest bridge response");
                    }
                }
                inner.resolved.insert(
                    request_id,
                    Resolved {
                        outcome: response.outcome,
                        received_at: now,
                    },
                );
                inner.order.push_back(request_id);
                DeliveryOutcome::Accepted
            }
        };

        match outcome {
            DeliveryOutcome::Accepted => {
                debug!(request_id, "Bridge response accepted");
                self.notify.notify_waiters();
            }
            DeliveryOutcome::Duplicate => {
                debug!(request_id, "Duplicate bridge response ignored");
            }
            DeliveryOutcome::Unknown => {
                warn!(request_id, "Bridge response for unknown request ignored");
            }
        }
        outcome
    }

    pub fn poll(&self, request_id: RequestId) -> PollStatus {
        let mut inner = self.inner.lock();
        inner.evict_expired(Instant::now(), self.ttl);
        if let Some(entry) = inner.resolved.get(&request_id) {
            PollStatus::Ready(entry.outcome.clone())
        } else if inner.pending.contains_key(&request_id) {
            PollStatus::Pending
        } else {
            PollStatus::NotFound
        }
    }

    /// Remove and return a resolved response
    pub fn take(&self, request_id: RequestId) -> Option<ResponseOutcome> {
        self.inner
            .lock()
            .resolved
            .remove(&request_id)
            .map(|entry| entry.outcome)
    }

    /// Forget a pending request. Returns `false` if it was not pending.
    pub fn abandon(&self, request_id: RequestId) -> bool {
        let removed = self.inner.lock().pending.remove(&request_id).is_some();
        if removed {
            debug!(request_id, "Abandoned bridge request");
            self.notify.notify_waiters();
        }
        removed
    }

    /// Wait until `request_id` resolves, consuming its response.
    ///
    /// Fails with `NotFound` if the id is neither pending nor resolved, including when
    /// it is abandoned while waiting.
    pub async fn wait(&self, request_id: RequestId) -> Result<ResponseOutcome, ApiError> {
        loop {
            let notified = self.notify.notified();
            if let Some(result) = self.resolve(request_id) {
                return result;
            }
            notified.await;
        }
    }

    /// Take the response or report that none can arrive, under one lock.
    /// `None` while the request is still pending.
    fn resolve(&self, request_id: RequestId) -> Option<Result<ResponseOutcome, ApiError>> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.resolved.remove(&request_id) {
            return Some(Ok(entry.outcome));
        }
        if inner.pending.contains_key(&request_id) {
            return None;
        }
        Some(Err(ApiError::NotFound(format!(
            "bridge request {}",
            request_id
        ))))
    }

    /// Drop resolved responses older than the TTL; returns how many were dropped
    pub fn evict_expired(&self) -> usize {
        let evicted = self.inner.lock().evict_expired(Instant::now(), self.ttl);
        if evicted > 0 {
            debug!(evicted, "Evicted expired bridge responses");
        }
        evicted
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.inner.lock().resolved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ResponseValue;

    fn escrow(request_id: RequestId, escrow_ref: &str) -> BridgeResponse {
        BridgeResponse {
            request_id,
            outcome: ResponseOutcome::Result(ResponseValue::Escrow {
                escrow_ref: escrow_ref.to_string(),
            }),
        }
    }

    fn store() -> ResponseStore {
        ResponseStore::new(Duration::from_secs(60), 16)
    }

    #[test]
    fn second_delivery_is_duplicate() {
        let store = store();
        store.register(1, RequestKind::SubmitEscrow);
        assert_eq!(store.deliver(escrow(1, "0xaa")), DeliveryOutcome::Accepted);
        assert_eq!(store.deliver(escrow(1, "0xbb")), DeliveryOutcome::Duplicate);

        match store.poll(1) {
            PollStatus::Ready(ResponseOutcome::Result(ResponseValue::Escrow { escrow_ref })) => {
                assert_eq!(escrow_ref, "0xaa")
            }
            other => panic!("unexpected poll status: {:?}", other),
        }
    }

    #[test]
    fn never_issued_ids_are_unknown() {
        let store = store();
        assert_eq!(store.deliver(escrow(42, "0xaa")), DeliveryOutcome::Unknown);
        assert_eq!(store.poll(42), PollStatus::NotFound);
        assert_eq!(store.resolved_count(), 0);
    }

    #[test]
    fn abandoned_ids_ignore_late_responses() {
        let store = store();
        store.register(1, RequestKind::GetBalance);
        assert!(store.abandon(1));
        assert!(!store.abandon(1));
        assert_eq!(store.deliver(escrow(1, "0xaa")), DeliveryOutcome::Unknown);
        assert_eq!(store.poll(1), PollStatus::NotFound);
    }

    #[test]
    fn responses_resolve_independently_of_order() {
        let store = store();
        for id in 1..=3 {
            store.register(id, RequestKind::SubmitEscrow);
        }
        store.deliver(escrow(3, "0x03"));
        store.deliver(escrow(1, "0x01"));
        assert!(matches!(store.poll(1), PollStatus::Ready(_)));
        assert_eq!(store.poll(2), PollStatus::Pending);
        assert!(matches!(store.poll(3), PollStatus::Ready(_)));
    }

    #[test]
    fn capacity_drops_oldest_resolved_first() {
        let store = ResponseStore::new(Duration::from_secs(60), 2);
        for id in 1..=3 {
            store.register(id, RequestKind::SubmitEscrow);
        }
        store.deliver(escrow(1, "0x01"));
        store.deliver(escrow(2, "0x02"));
        store.deliver(escrow(3, "0x03"));

        assert_eq!(store.resolved_count(), 2);
        assert_eq!(store.poll(1), PollStatus::NotFound);
        assert!(matches!(store.poll(2), PollStatus::Ready(_)));
        assert!(matches!(store.poll(3), PollStatus::Ready(_)));
    }

    #[test]
    fn expired_responses_are_evicted() {
        let store = ResponseStore::new(Duration::from_millis(10), 16);
        store.register(1, RequestKind::SubmitEscrow);
        store.register(2, RequestKind::SubmitEscrow);
        store.deliver(escrow(1, "0x01"));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.poll(1), PollStatus::NotFound);
        // Pending requests never expire
        assert_eq!(store.poll(2), PollStatus::Pending);
    }

    #[test]
    fn take_consumes_the_response() {
        let store = store();
        store.register(1, RequestKind::SubmitEscrow);
        store.deliver(escrow(1, "0x01"));
        assert!(store.take(1).is_some());
        assert!(store.take(1).is_none());
        assert_eq!(store.poll(1), PollStatus::NotFound);
    }

    #[tokio::test]
    async fn abandoning_wakes_waiters() {
        let store = std::sync::Arc::new(store());
        store.register(1, RequestKind::GetBalance);

        let waiter = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.wait(1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.abandon(1);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_never_misses_a_concurrent_delivery() {
        let store = std::sync::Arc::new(store());
        for id in 1..=2_000u64 {
            store.register(id, RequestKind::SubmitEscrow);
            let deliverer = {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || store.deliver(escrow(id, "0x01")))
            };
            let result = store.wait(id).await;
            assert_eq!(deliverer.join().unwrap(), DeliveryOutcome::Accepted);
            assert!(result.is_ok(), "round {}: {:?}", id, result);
        }
    }
}
