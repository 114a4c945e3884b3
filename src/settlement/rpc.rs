//! JSON-RPC settlement client.

use super::{SettlementAdapter, SettlementError};
use crate::entry::ServiceRequirements;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Settlement chain reached over an Ethereum-style JSON-RPC endpoint
pub struct JsonRpcSettlement {
    client: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl JsonRpcSettlement {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, SettlementError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SettlementError::Rpc(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SettlementError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.rpc_url, "Sending settlement rpc call");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SettlementError::Rpc(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SettlementError::Rpc(format!(
                "{} returned http status {}",
                method, status
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| SettlementError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(err) = parsed.error {
            return Err(SettlementError::Rejected(format!(
                "{} ({}): {}",
                method, err.code, err.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| SettlementError::InvalidResponse(format!("{}: missing result", method)))
    }
}

/// Parse a `0x`-prefixed hex quantity
pub(crate) fn parse_quantity(value: &serde_json::Value) -> Result<u128, SettlementError> {
    let text = value
        .as_str()
        .ok_or_else(|| SettlementError::InvalidResponse(format!("expected hex string, got {}", value)))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| SettlementError::InvalidResponse(format!("missing 0x prefix: {}", text)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| SettlementError::InvalidResponse(format!("bad quantity {}: {}", text, e)))
}

#[async_trait]
impl SettlementAdapter for JsonRpcSettlement {
    async fn submit_escrow(
        &self,
        recipient: &str,
        _requirements: &ServiceRequirements,
    ) -> Result<String, SettlementError> {
        Err(SettlementError::Unsupported(format!(
            "escrow submission to {} requires an escrow contract, none is configured",
            recipient
        )))
    }

    async fn get_balance(&self, address: &str) -> Result<u128, SettlementError> {
        let result = self
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity(&result)
    }
}
