//! CLI Tooling
//!
//! Command-line interface for the ACP coordinator. Every command runs against the local
//! ledger replica; settlement queries go through the bridge worker started with the
//! context.

use crate::bridge::{Bridge, BridgeWorker};
use crate::config::{AcpConfig, ConfigLoader};
use crate::coordinator::Coordinator;
use crate::entry::{JobPhase, ServiceRequirements};
use crate::error::ApiError;
use crate::ledger::Ledger;
use crate::logging::LoggingConfig;
use crate::settlement::{JsonRpcSettlement, SettlementAdapter, SimulatedSettlement};
use crate::tooling::format::{
    format_agents_text, format_balance_text, format_history_text, format_job_text,
    format_jobs_text, format_receipt_text,
};
use crate::tools::{AcpTools, ExecuteJobArgs, Registration};
use crate::types::hash_to_hex;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// ACP CLI - agent commerce coordination over a content-addressed ledger
#[derive(Parser)]
#[command(name = "acp")]
#[command(about = "Register agents, create jobs and track their lifecycle")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Use the in-process simulated settlement chain instead of JSON-RPC
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Act as this wallet address (overrides agent.wallet_address)
    #[arg(long, global = true)]
    pub wallet: Option<String>,

    /// Enable verbose logging (debug level to stderr)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register an agent for discovery
    Register {
        /// Display name
        #[arg(long)]
        name: String,
        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,
        /// Session key id (defaults to agent.session_key_id)
        #[arg(long)]
        session_key_id: Option<u64>,
    },
    /// Find agents by name or description (case-insensitive)
    Browse {
        /// Substring to match; empty lists every agent
        #[arg(default_value = "")]
        query: String,
    },
    /// Job lifecycle commands
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// List the jobs you created, at their latest revision
    Jobs,
    /// Show profiles registered from this wallet
    Profiles,
    /// Query a wallet balance through the settlement bridge
    Balance {
        /// Address to query (defaults to your wallet)
        address: Option<String>,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// Create a job in the requested phase
    Create {
        /// Wallet of the agent providing the service
        #[arg(long)]
        agent_wallet: String,
        /// Name of the job offering
        #[arg(long)]
        offering: String,
        /// Requirement as key=value; the value is parsed as JSON when possible
        #[arg(long = "requirement", value_name = "KEY=VALUE")]
        requirements: Vec<String>,
        /// All requirements as a JSON object
        #[arg(long, conflicts_with = "requirements")]
        requirements_json: Option<String>,
        /// Existing escrow reference; when omitted, escrow is submitted through the bridge
        #[arg(long)]
        escrow_ref: Option<String>,
        /// Job id (generated when omitted)
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Move a job to its next phase
    Advance {
        job_id: String,
        /// requested, negotiation, transaction, completed or rejected
        phase: String,
        /// Deliverable, required when completing
        #[arg(long)]
        deliverable: Option<String>,
    },
    /// Show the latest revision of a job
    Show { job_id: String },
    /// Show every revision of a job, oldest first
    History { job_id: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML (credentials redacted)
    Show,
    /// Print the global config file location
    Path,
}

impl Cli {
    /// Logging config with CLI flags applied over the loaded one
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if self.verbose {
            logging.level = "debug".to_string();
            logging.output = "stderr".to_string();
        }
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

/// Load configuration the way the CLI does: explicit file if given, then `--wallet`
pub fn load_config(cli: &Cli) -> Result<AcpConfig, ApiError> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_with_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(wallet) = &cli.wallet {
        config.agent.wallet_address = Some(wallet.clone());
        config.validate()?;
    }
    Ok(config)
}

/// CLI context: ledger, bridge worker and tool surface for one invocation
pub struct CliContext {
    config: AcpConfig,
    format: OutputFormat,
    ledger: Arc<Ledger>,
    tools: Option<AcpTools>,
    worker: Option<JoinHandle<()>>,
}

impl CliContext {
    /// Open the ledger and start the bridge worker. Must run inside a tokio runtime.
    pub fn new(config: AcpConfig, format: OutputFormat, simulate: bool) -> Result<Self, ApiError> {
        let store_path = config.store_path()?;
        let ledger = Arc::new(Ledger::open(&store_path)?);

        let (tools, worker) = match config.caller_identity() {
            Ok(caller) => {
                let settlement = &config.settlement;
                let adapter: Arc<dyn SettlementAdapter> = if simulate {
                    Arc::new(SimulatedSettlement::new())
                } else {
                    Arc::new(
                        JsonRpcSettlement::new(&settlement.rpc_url, settlement.request_timeout())
                            .map_err(|e| ApiError::ConfigError(e.to_string()))?,
                    )
                };
                let (bridge, receiver) = Bridge::new(&settlement.bridge_config());
                let worker =
                    BridgeWorker::new(&bridge, receiver, adapter, settlement.max_in_flight)
                        .spawn();
                let coordinator =
                    Coordinator::new(Arc::clone(&ledger), Arc::new(bridge), caller);
                let tools = AcpTools::new(
                    Arc::new(coordinator),
                    settlement.request_timeout(),
                    settlement.decimals,
                );
                (Some(tools), Some(worker))
            }
            Err(_) => (None, None),
        };

        info!(
            store = %store_path.display(),
            simulate,
            identity = tools.is_some(),
            "CLI context ready"
        );
        Ok(Self {
            config,
            format,
            ledger,
            tools,
            worker,
        })
    }

    fn tools(&self) -> Result<&AcpTools, ApiError> {
        match &self.tools {
            Some(tools) => Ok(tools),
            None => Err(self
                .config
                .caller_identity()
                .err()
                .unwrap_or_else(|| ApiError::ConfigError("no caller identity".to_string()))),
        }
    }

    fn render<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<String, ApiError> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Text => Ok(text(value)),
        }
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Register {
                name,
                description,
                session_key_id,
            } => {
                let tools = self.tools()?;
                let caller = tools.coordinator().caller();
                let hash = tools.coordinator().register_agent(
                    &caller.wallet_address,
                    session_key_id.unwrap_or(caller.session_key_id),
                    name,
                    description,
                )?;
                let registration = Registration {
                    agent_hash: hash_to_hex(&hash),
                };
                self.render(&registration, |r| {
                    format!("Registered agent {} ({})", name, r.agent_hash)
                })
            }
            Commands::Browse { query } => {
                let agents = self.tools()?.browse_agents(query).await?;
                self.render(&agents, |a| format_agents_text(a))
            }
            Commands::Job { command } => self.execute_job(command).await,
            Commands::Jobs => {
                let jobs = self.tools()?.get_my_jobs().await?;
                self.render(&jobs, |j| format_jobs_text(j))
            }
            Commands::Profiles => {
                let profiles = self.tools()?.coordinator().get_my_profiles()?;
                self.render(&profiles, |p| format_agents_text(p))
            }
            Commands::Balance { address } => {
                let balance = self
                    .tools()?
                    .get_wallet_balance(address.as_deref())
                    .await?;
                self.render(&balance, format_balance_text)
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show => match self.format {
                    OutputFormat::Json => Ok(serde_json::to_string_pretty(&self.config.redacted())?),
                    OutputFormat::Text => self.config.to_toml(),
                },
                ConfigCommands::Path => Ok(crate::config::paths::global_config_path()?
                    .display()
                    .to_string()),
            },
        }
    }

    async fn execute_job(&self, command: &JobCommands) -> Result<String, ApiError> {
        let tools = self.tools()?;
        let coordinator = tools.coordinator();
        match command {
            JobCommands::Create {
                agent_wallet,
                offering,
                requirements,
                requirements_json,
                escrow_ref,
                job_id,
            } => {
                let service_requirements =
                    parse_requirements(requirements, requirements_json.as_deref())?;
                let receipt = match escrow_ref {
                    Some(escrow_ref) => coordinator.execute_acp_job(
                        agent_wallet,
                        offering,
                        service_requirements,
                        escrow_ref,
                        job_id.clone(),
                    )?,
                    None => {
                        tools
                            .execute_acp_job(ExecuteJobArgs {
                                agent_wallet_address: agent_wallet.clone(),
                                job_offering_name: offering.clone(),
                                service_requirements,
                                job_id: job_id.clone(),
                            })
                            .await?
                    }
                };
                self.render(&receipt, format_receipt_text)
            }
            JobCommands::Advance {
                job_id,
                phase,
                deliverable,
            } => {
                let phase: JobPhase = phase.parse().map_err(ApiError::ValidationError)?;
                coordinator.advance_job(job_id, phase, deliverable.clone())?;
                let view = coordinator.current_job(job_id)?;
                self.render(&view, format_job_text)
            }
            JobCommands::Show { job_id } => {
                let view = coordinator.current_job(job_id)?;
                self.render(&view, format_job_text)
            }
            JobCommands::History { job_id } => {
                let history = coordinator.job_history(job_id)?;
                self.render(&history, |h| format_history_text(job_id, h))
            }
        }
    }

    /// Flush the ledger and wait for the bridge worker to drain
    pub async fn shutdown(self) -> Result<(), ApiError> {
        let CliContext {
            ledger,
            tools,
            worker,
            ..
        } = self;
        // Dropping the tools drops the last bridge handle, which stops the worker
        drop(tools);
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        ledger.flush()?;
        Ok(())
    }
}

/// Parse `key=value` requirements, or a JSON object when given
pub fn parse_requirements(
    pairs: &[String],
    json_object: Option<&str>,
) -> Result<ServiceRequirements, ApiError> {
    if let Some(text) = json_object {
        return serde_json::from_str(text).map_err(|e| {
            ApiError::ValidationError(format!("requirements must be a JSON object: {}", e))
        });
    }

    let mut requirements = ServiceRequirements::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            ApiError::ValidationError(format!("requirement '{}' is not KEY=VALUE", pair))
        })?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        requirements.insert(key.trim().to_string(), value);
    }
    Ok(requirements)
}
