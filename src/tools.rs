//! Tool Surface
//!
//! Async operations exposed to the host agent runtime. This is the only layer that
//! awaits bridge responses: it emits a request through the coordinator, waits up to
//! the configured timeout, and abandons the request when the wait runs out.

use crate::bridge::ResponseValue;
use crate::coordinator::{AgentSummary, Coordinator, JobReceipt, JobView};
use crate::entry::{JobPhase, ServiceRequirements};
use crate::error::ApiError;
use crate::settlement::format_decimal;
use crate::types::hash_to_hex;
use crate::validation::check_wallet_address;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Names accepted by [`AcpTools::dispatch`]
pub const TOOL_NAMES: [&str; 6] = [
    "browse_agents",
    "execute_acp_job",
    "get_wallet_balance",
    "register_agent",
    "get_my_jobs",
    "advance_job",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseArgs {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteJobArgs {
    pub agent_wallet_address: String,
    pub job_offering_name: String,
    #[serde(default)]
    pub service_requirements: ServiceRequirements,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceArgs {
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterArgs {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceArgs {
    pub job_id: String,
    pub phase: String,
    #[serde(default)]
    pub deliverable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub address: String,
    pub balance_minor_units: String,
    pub balance_decimal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub agent_hash: String,
}

pub struct AcpTools {
    coordinator: Arc<Coordinator>,
    request_timeout: Duration,
    decimals: u32,
}

impl AcpTools {
    pub fn new(coordinator: Arc<Coordinator>, request_timeout: Duration, decimals: u32) -> Self {
        Self {
            coordinator,
            request_timeout,
            decimals,
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub async fn browse_agents(&self, query: &str) -> Result<Vec<AgentSummary>, ApiError> {
        self.coordinator.browse_agents(query)
    }

    /// Submit escrow through the bridge, wait for its reference, then record the job.
    ///
    /// Inputs are checked before anything reaches the settlement side. The escrow
    /// submission is issued once and never retried.
    pub async fn execute_acp_job(&self, args: ExecuteJobArgs) -> Result<JobReceipt, ApiError> {
        check_wallet_address("agentWalletAddress", &args.agent_wallet_address)
            .map_err(ApiError::ValidationError)?;
        if args.job_offering_name.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "jobOfferingName must not be empty".to_string(),
            ));
        }
        if let Some(job_id) = &args.job_id {
            if self.coordinator.ledger().heads().contains(job_id)? {
                return Err(ApiError::ValidationError(format!(
                    "jobId '{}' already exists",
                    job_id
                )));
            }
        }

        let pending = self
            .coordinator
            .request_escrow(&args.agent_wallet_address, &args.service_requirements)?;
        let escrow_ref = match self
            .coordinator
            .bridge()
            .wait(&pending, self.request_timeout)
            .await?
        {
            ResponseValue::Escrow { escrow_ref } => escrow_ref,
            other => {
                return Err(ApiError::BridgeError(format!(
                    "escrow request {} received {:?}",
                    pending.request_id, other
                )))
            }
        };
        debug!(request_id = pending.request_id, escrow = %escrow_ref, "Escrow confirmed");

        let receipt = self.coordinator.execute_acp_job(
            &args.agent_wallet_address,
            &args.job_offering_name,
            args.service_requirements,
            &escrow_ref,
            args.job_id,
        );
        if let Err(e) = &receipt {
            warn!(escrow = %escrow_ref, error = %e, "Escrow submitted but job was not recorded");
        }
        receipt
    }

    /// Balance of `address`, or of the caller's wallet when none is given
    pub async fn get_wallet_balance(
        &self,
        address: Option<&str>,
    ) -> Result<WalletBalance, ApiError> {
        let address = address.unwrap_or(&self.coordinator.caller().wallet_address);
        let pending = self.coordinator.request_wallet_balance(address)?;
        match self
            .coordinator
            .bridge()
            .wait(&pending, self.request_timeout)
            .await?
        {
            ResponseValue::Balance { minor_units, .. } => Ok(WalletBalance {
                address: address.to_string(),
                balance_minor_units: minor_units.to_string(),
                balance_decimal: format_decimal(minor_units, self.decimals),
            }),
            other => Err(ApiError::BridgeError(format!(
                "balance request {} received {:?}",
                pending.request_id, other
            ))),
        }
    }

    /// Register the caller's wallet under `name`
    pub async fn register_agent(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Registration, ApiError> {
        let caller = self.coordinator.caller();
        let hash = self.coordinator.register_agent(
            &caller.wallet_address,
            caller.session_key_id,
            name,
            description,
        )?;
        Ok(Registration {
            agent_hash: hash_to_hex(&hash),
        })
    }

    pub async fn get_my_jobs(&self) -> Result<Vec<JobView>, ApiError> {
        self.coordinator.get_my_jobs()
    }

    pub async fn advance_job(&self, args: AdvanceArgs) -> Result<JobView, ApiError> {
        let phase: JobPhase = args.phase.parse().map_err(ApiError::ValidationError)?;
        self.coordinator
            .advance_job(&args.job_id, phase, args.deliverable)?;
        self.coordinator.current_job(&args.job_id)
    }

    /// Invoke a tool by name with JSON arguments
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Value, ApiError> {
        let args = if args.is_null() { json!({}) } else { args };
        debug!(tool = name, "Dispatching tool call");
        match name {
            "browse_agents" => {
                let args: BrowseArgs = parse_args(name, args)?;
                Ok(serde_json::to_value(self.browse_agents(&args.query).await?)?)
            }
            "execute_acp_job" => {
                let args: ExecuteJobArgs = parse_args(name, args)?;
                Ok(serde_json::to_value(self.execute_acp_job(args).await?)?)
            }
            "get_wallet_balance" => {
                let args: BalanceArgs = parse_args(name, args)?;
                Ok(serde_json::to_value(
                    self.get_wallet_balance(args.address.as_deref()).await?,
                )?)
            }
            "register_agent" => {
                let args: RegisterArgs = parse_args(name, args)?;
                Ok(serde_json::to_value(
                    self.register_agent(&args.name, &args.description).await?,
                )?)
            }
            "get_my_jobs" => Ok(serde_json::to_value(self.get_my_jobs().await?)?),
            "advance_job" => {
                let args: AdvanceArgs = parse_args(name, args)?;
                Ok(serde_json::to_value(self.advance_job(args).await?)?)
            }
            other => Err(ApiError::NotFound(format!(
                "tool '{}' (available: {})",
                other,
                TOOL_NAMES.join(", ")
            ))),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, args: Value) -> Result<T, ApiError> {
    serde_json::from_value(args)
        .map_err(|e| ApiError::ValidationError(format!("invalid arguments for {}: {}", tool, e)))
}

/// JSON error body for a failed tool call
pub fn error_json(err: &ApiError) -> Value {
    json!({
        "error": {
            "kind": err.kind(),
            "message": err.to_string(),
        }
    })
}
