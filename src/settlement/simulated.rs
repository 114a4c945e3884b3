//! In-process settlement chain.
//!
//! Deterministic stand-in for the real chain: balances live in a map and escrow
//! references are derived from the request content and a nonce. Failure and latency
//! can be injected so bridge timeouts and errors can be exercised.

use super::{SettlementAdapter, SettlementError};
use crate::entry::ServiceRequirements;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SimulatedSettlement {
    balances: RwLock<HashMap<String, u128>>,
    escrow_nonce: AtomicU64,
    escrow_calls: AtomicUsize,
    failure: RwLock<Option<SettlementError>>,
    delay: RwLock<Option<Duration>>,
}

impl SimulatedSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the balance of `address` (addresses compare case-insensitively)
    pub fn set_balance(&self, address: &str, minor_units: u128) {
        self.balances
            .write()
            .insert(address.to_ascii_lowercase(), minor_units);
    }

    pub fn with_balance(self, address: &str, minor_units: u128) -> Self {
        self.set_balance(address, minor_units);
        self
    }

    /// Make every subsequent call fail with `error`; `None` restores normal operation
    pub fn fail_with(&self, error: Option<SettlementError>) {
        *self.failure.write() = error;
    }

    /// Delay every subsequent call by `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Number of escrow submissions received, including failed ones
    pub fn escrow_calls(&self) -> usize {
        self.escrow_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) -> Result<(), SettlementError> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.read().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SettlementAdapter for SimulatedSettlement {
    async fn submit_escrow(
        &self,
        recipient: &str,
        requirements: &ServiceRequirements,
    ) -> Result<String, SettlementError> {
        self.escrow_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;

        let nonce = self.escrow_nonce.fetch_add(1, Ordering::SeqCst);
        let payload = serde_json::to_vec(requirements)
            .map_err(|e| SettlementError::InvalidResponse(e.to_string()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"acp-simulated-escrow");
        hasher.update(recipient.to_ascii_lowercase().as_bytes());
        hasher.update(&(payload.len() as u64).to_le_bytes());
        hasher.update(&payload);
        hasher.update(&nonce.to_le_bytes());
        let escrow_ref = format!("0x{}", hex::encode(hasher.finalize().as_bytes()));

        debug!(recipient, nonce, escrow_ref = %escrow_ref, "Simulated escrow submitted");
        Ok(escrow_ref)
    }

    async fn get_balance(&self, address: &str) -> Result<u128, SettlementError> {
        self.simulate_latency().await?;
        Ok(self
            .balances
            .read()
            .get(&address.to_ascii_lowercase())
            .copied()
            .unwrap_or(0))
    }
}
