//! Settlement Adapter
//!
//! Interface to the external settlement chain. The ledger side never calls an adapter
//! directly; requests reach it through the bridge worker, which is the only place
//! where blocking network I/O happens.

pub mod rpc;
pub mod simulated;

use crate::entry::ServiceRequirements;
use async_trait::async_trait;
use thiserror::Error;

pub use rpc::JsonRpcSettlement;
pub use simulated::SimulatedSettlement;

/// Decimals used by the settlement chain's native unit unless configured otherwise
pub const DEFAULT_DECIMALS: u32 = 18;

/// Errors raised by a settlement adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rejected by settlement chain: {0}")]
    Rejected(String),
}

/// External settlement chain
#[async_trait]
pub trait SettlementAdapter: Send + Sync {
    /// Lock funds for a job and return the escrow transaction reference (0x + 64 hex)
    async fn submit_escrow(
        &self,
        recipient: &str,
        requirements: &ServiceRequirements,
    ) -> Result<String, SettlementError>;

    /// Balance of `address` in minor units
    async fn get_balance(&self, address: &str) -> Result<u128, SettlementError>;
}

/// Render minor units as a decimal string with at least one fractional digit.
///
/// `format_decimal(0, 18) == "0.0"`, `format_decimal(1_500_000_000_000_000_000, 18) == "1.5"`.
pub fn format_decimal(minor_units: u128, decimals: u32) -> String {
    if decimals == 0 {
        return format!("{}.0", minor_units);
    }
    let scale = 10u128.checked_pow(decimals);
    let (whole, fraction) = match scale {
        Some(scale) => (minor_units / scale, minor_units % scale),
        // More decimals than u128 can scale: everything is fractional
        None => (0, minor_units),
    };

    let mut fraction = format!("{:0width$}", fraction, width = decimals as usize);
    while fraction.len() > 1 && fraction.ends_with('0') {
        fraction.pop();
    }
    format!("{}.{}", whole, fraction)
}
