//! Configuration
//!
//! Layered configuration for the coordinator: built-in defaults, the global config file,
//! an optional explicit file and `ACP_*` environment variables (highest precedence).

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

use crate::bridge::BridgeConfig;
use crate::coordinator::CallerIdentity;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::settlement::DEFAULT_DECIMALS;
use crate::validation::check_wallet_address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use facade::ConfigLoader;

const REDACTED: &str = "<redacted>";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcpConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ledger replica settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Conductor endpoint of the peer-to-peer ledger, passed through to the host runtime
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Ledger application id
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Local sled store; None means `$XDG_DATA_HOME/acp/ledger`
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_app_id() -> String {
    "acp".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            app_id: default_app_id(),
            store_path: None,
        }
    }
}

/// Settlement chain and bridge settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Decimals of the native unit
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Signing credential, handed to the settlement side only
    #[serde(default)]
    pub signing_key: Option<String>,

    /// How long the tool surface waits for a bridge response
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_response_ttl_ms")]
    pub response_ttl_ms: u64,

    #[serde(default = "default_response_capacity")]
    pub response_capacity: usize,
}

fn default_rpc_url() -> String {
    "https://mainnet.base.org".to_string()
}

fn default_decimals() -> u32 {
    DEFAULT_DECIMALS
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_in_flight() -> usize {
    4
}

fn default_response_ttl_ms() -> u64 {
    300_000
}

fn default_response_capacity() -> usize {
    1024
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            decimals: default_decimals(),
            signing_key: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_in_flight: default_max_in_flight(),
            response_ttl_ms: default_response_ttl_ms(),
            response_capacity: default_response_capacity(),
        }
    }
}

impl fmt::Debug for SettlementConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementConfig")
            .field("rpc_url", &self.rpc_url)
            .field("decimals", &self.decimals)
            .field("signing_key", &self.signing_key.as_ref().map(|_| REDACTED))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_in_flight", &self.max_in_flight)
            .field("response_ttl_ms", &self.response_ttl_ms)
            .field("response_capacity", &self.response_capacity)
            .finish()
    }
}

impl SettlementConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            response_ttl: Duration::from_millis(self.response_ttl_ms),
            response_capacity: self.response_capacity,
            max_in_flight: self.max_in_flight,
        }
    }
}

/// Identity the coordinator acts as
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub wallet_address: Option<String>,

    #[serde(default)]
    pub session_key_id: u64,
}

impl AcpConfig {
    /// Check the values the coordinator relies on
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(wallet) = &self.agent.wallet_address {
            check_wallet_address("agent.wallet_address", wallet).map_err(ApiError::ConfigError)?;
        }
        if self.settlement.decimals > 38 {
            return Err(ApiError::ConfigError(format!(
                "settlement.decimals must be at most 38, got {}",
                self.settlement.decimals
            )));
        }
        if self.settlement.max_in_flight == 0 {
            return Err(ApiError::ConfigError(
                "settlement.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.settlement.response_capacity == 0 {
            return Err(ApiError::ConfigError(
                "settlement.response_capacity must be at least 1".to_string(),
            ));
        }
        if self.settlement.request_timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "settlement.request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Caller identity from `agent.wallet_address` and `agent.session_key_id`
    pub fn caller_identity(&self) -> Result<CallerIdentity, ApiError> {
        let wallet = self.agent.wallet_address.as_deref().ok_or_else(|| {
            ApiError::ConfigError(
                "agent.wallet_address is not set (config file or ACP_AGENT__WALLET_ADDRESS)"
                    .to_string(),
            )
        })?;
        CallerIdentity::new(wallet, self.agent.session_key_id)
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// Store path, falling back to the XDG data directory
    pub fn store_path(&self) -> Result<PathBuf, ApiError> {
        match &self.ledger.store_path {
            Some(path) => Ok(path.clone()),
            None => paths::default_store_path(),
        }
    }

    /// Copy safe to print: the signing credential is masked
    pub fn redacted(&self) -> AcpConfig {
        let mut config = self.clone();
        if config.settlement.signing_key.is_some() {
            config.settlement.signing_key = Some(REDACTED.to_string());
        }
        config
    }

    /// Render as TOML with the signing credential masked
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(&self.redacted())
            .map_err(|e| ApiError::SerializationError(e.to_string()))
    }
}
