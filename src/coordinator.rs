//! Coordinator
//!
//! Public operations over the ledger and the settlement bridge, executed on behalf of
//! one caller identity. Ledger operations complete synchronously; settlement queries
//! only emit a bridge request and hand back a pending handle.

use crate::bridge::{
    Bridge, PendingRequest, PollStatus, RequestKind, RequestPayload, ResponseOutcome,
    ResponseValue,
};
use crate::entry::{
    caller_identity_hash, AgentEntry, Entry, JobEntry, JobPhase, ServiceRequirements,
};
use crate::error::ApiError;
use crate::ledger::Ledger;
use crate::lifecycle::transition;
use crate::links::{all_agents_anchor, LinkType};
use crate::types::{hash_to_hex, Hash, RecordHash};
use crate::validation::check_wallet_address;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Agent on whose behalf operations run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub wallet_address: String,
    pub session_key_id: u64,
}

impl CallerIdentity {
    pub fn new(wallet_address: impl Into<String>, session_key_id: u64) -> Result<Self, ApiError> {
        let wallet_address = wallet_address.into();
        check_wallet_address("walletAddress", &wallet_address).map_err(ApiError::ValidationError)?;
        Ok(Self {
            wallet_address,
            session_key_id,
        })
    }

    /// Base hash for the caller's profile and job links
    pub fn hash(&self) -> Hash {
        caller_identity_hash(&self.wallet_address)
    }
}

/// Agent as returned by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent_hash: String,
    pub wallet_address: String,
    pub session_key_id: u64,
    pub name: String,
    pub description: String,
    pub registered_at: u64,
}

impl AgentSummary {
    fn new(hash: &RecordHash, agent: AgentEntry) -> Self {
        Self {
            agent_hash: hash_to_hex(hash),
            wallet_address: agent.wallet_address,
            session_key_id: agent.session_key_id,
            name: agent.name,
            description: agent.description,
            registered_at: agent.registered_at,
        }
    }

    fn matches(&self, query: &str) -> bool {
        query.is_empty()
            || self.name.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
    }
}

/// Result of creating a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReceipt {
    pub job_hash: String,
    pub job_id: String,
    pub escrow_ref: String,
    pub phase: JobPhase,
}

/// Latest revision of a job with the hash it is stored under
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_hash: String,
    #[serde(flatten)]
    pub job: JobEntry,
}

pub struct Coordinator {
    ledger: Arc<Ledger>,
    bridge: Arc<Bridge>,
    caller: CallerIdentity,
    job_seq: AtomicU64,
}

impl Coordinator {
    pub fn new(ledger: Arc<Ledger>, bridge: Arc<Bridge>, caller: CallerIdentity) -> Self {
        Self {
            ledger,
            bridge,
            caller,
            job_seq: AtomicU64::new(0),
        }
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Register an agent for discovery. Every call creates a new record.
    pub fn register_agent(
        &self,
        wallet_address: &str,
        session_key_id: u64,
        name: &str,
        description: &str,
    ) -> Result<RecordHash, ApiError> {
        let agent = AgentEntry {
            wallet_address: wallet_address.to_string(),
            session_key_id,
            name: name.to_string(),
            description: description.to_string(),
            registered_at: unix_seconds(),
        };

        let author = self.caller.hash();
        let hash = self.ledger.commit_entry(&author, Entry::Agent(agent))?;
        self.ledger.link(&all_agents_anchor(), LinkType::AllAgents, &hash)?;
        self.ledger.link(&author, LinkType::AgentToProfile, &hash)?;

        info!(
            agent = %hex::encode(hash),
            name,
            wallet = wallet_address,
            "Registered agent"
        );
        Ok(hash)
    }

    /// Registered agents whose name or description contains `query`, case-insensitively,
    /// in registration order
    pub fn browse_agents(&self, query: &str) -> Result<Vec<AgentSummary>, ApiError> {
        let query = query.to_lowercase();
        let mut agents = Vec::new();
        for hash in self.ledger.get_links(&all_agents_anchor(), LinkType::AllAgents)? {
            if let Some(summary) = self.get_agent(&hash)? {
                if summary.matches(&query) {
                    agents.push(summary);
                }
            }
        }
        debug!(query = %query, matches = agents.len(), "Browsed agents");
        Ok(agents)
    }

    pub fn get_agent(&self, agent_hash: &RecordHash) -> Result<Option<AgentSummary>, ApiError> {
        Ok(self
            .ledger
            .get_record(agent_hash)?
            .and_then(|record| match record.entry {
                Entry::Agent(agent) => Some(AgentSummary::new(agent_hash, agent)),
                Entry::Job(_) => None,
            }))
    }

    /// Agents registered by the caller
    pub fn get_my_profiles(&self) -> Result<Vec<AgentSummary>, ApiError> {
        let mut profiles = Vec::new();
        for hash in self
            .ledger
            .get_links(&self.caller.hash(), LinkType::AgentToProfile)?
        {
            if let Some(summary) = self.get_agent(&hash)? {
                profiles.push(summary);
            }
        }
        Ok(profiles)
    }

    /// Record a new job in `requested` against an escrow that already exists.
    ///
    /// `job_id` is generated when not supplied; a supplied id must be unused.
    pub fn execute_acp_job(
        &self,
        agent_wallet_address: &str,
        job_offering_name: &str,
        service_requirements: ServiceRequirements,
        escrow_ref: &str,
        job_id: Option<String>,
    ) -> Result<JobReceipt, ApiError> {
        let job_id = match job_id {
            Some(id) => id,
            None => self.generate_job_id(),
        };
        let job = JobEntry::requested(
            job_id.clone(),
            agent_wallet_address.to_string(),
            job_offering_name.to_string(),
            service_requirements,
            escrow_ref.to_string(),
            unix_seconds(),
        );

        let author = self.caller.hash();
        let hash = self.ledger.create_job(&author, job)?;
        self.ledger.link(&author, LinkType::AgentToJobs, &hash)?;

        info!(
            job = %hex::encode(hash),
            job_id = %job_id,
            offering = job_offering_name,
            escrow = escrow_ref,
            "Created job"
        );
        Ok(JobReceipt {
            job_hash: hash_to_hex(&hash),
            job_id,
            escrow_ref: escrow_ref.to_string(),
            phase: JobPhase::Requested,
        })
    }

    fn generate_job_id(&self) -> String {
        let seq = self.job_seq.fetch_add(1, Ordering::Relaxed);
        format!("job_{}_{}", chrono::Utc::now().timestamp_micros(), seq)
    }

    /// Latest revision of every job the caller created, in creation order
    pub fn get_my_jobs(&self) -> Result<Vec<JobView>, ApiError> {
        let mut jobs = Vec::new();
        for hash in self
            .ledger
            .get_links(&self.caller.hash(), LinkType::AgentToJobs)?
        {
            let record = match self.ledger.get_record(&hash)? {
                Some(record) => record,
                None => continue,
            };
            if let Entry::Job(initial) = record.entry {
                jobs.push(self.current_job(&initial.job_id)?);
            }
        }
        Ok(jobs)
    }

    /// The job revision stored at `job_hash`, if it is one
    pub fn get_job(&self, job_hash: &RecordHash) -> Result<Option<JobEntry>, ApiError> {
        Ok(self
            .ledger
            .get_record(job_hash)?
            .and_then(|record| match record.entry {
                Entry::Job(job) => Some(job),
                Entry::Agent(_) => None,
            }))
    }

    pub fn current_job(&self, job_id: &str) -> Result<JobView, ApiError> {
        let (hash, job) = self.ledger.job_head(job_id)?;
        Ok(JobView {
            job_hash: hash_to_hex(&hash),
            job,
        })
    }

    /// Every revision of a job, oldest first
    pub fn job_history(&self, job_id: &str) -> Result<Vec<JobEntry>, ApiError> {
        self.ledger.job_history(job_id)
    }

    /// Move a job to `phase` by appending a revision on top of its current head
    pub fn advance_job(
        &self,
        job_id: &str,
        phase: JobPhase,
        deliverable: Option<String>,
    ) -> Result<RecordHash, ApiError> {
        let (head_hash, head) = self.ledger.job_head(job_id)?;
        let from = head.phase;
        let next = transition(&head, head_hash, phase, deliverable)?;
        let hash = self.ledger.append_revision(&self.caller.hash(), next)?;

        info!(
            job_id,
            from = from.as_str(),
            to = phase.as_str(),
            revision = %hex::encode(hash),
            "Advanced job"
        );
        Ok(hash)
    }

    /// Emit a balance query for `address` without waiting for it
    pub fn request_wallet_balance(&self, address: &str) -> Result<PendingRequest, ApiError> {
        check_wallet_address("address", address).map_err(ApiError::ValidationError)?;
        self.bridge.request(RequestPayload::GetBalance {
            address: address.to_string(),
        })
    }

    /// Balance in minor units once the response has arrived, `None` while pending
    pub fn poll_wallet_balance(&self, pending: &PendingRequest) -> Result<Option<u128>, ApiError> {
        expect_kind(pending, RequestKind::GetBalance)?;
        match self.poll_value(pending)? {
            Some(ResponseValue::Balance { minor_units, .. }) => Ok(Some(minor_units)),
            Some(other) => Err(unexpected_response(pending, &other)),
            None => Ok(None),
        }
    }

    /// Emit an escrow submission in favour of `recipient` without waiting for it
    pub fn request_escrow(
        &self,
        recipient: &str,
        requirements: &ServiceRequirements,
    ) -> Result<PendingRequest, ApiError> {
        check_wallet_address("agentWalletAddress", recipient).map_err(ApiError::ValidationError)?;
        self.bridge.request(RequestPayload::SubmitEscrow {
            recipient: recipient.to_string(),
            requirements: requirements.clone(),
        })
    }

    /// Escrow reference once the response has arrived, `None` while pending
    pub fn poll_escrow(&self, pending: &PendingRequest) -> Result<Option<String>, ApiError> {
        expect_kind(pending, RequestKind::SubmitEscrow)?;
        match self.poll_value(pending)? {
            Some(ResponseValue::Escrow { escrow_ref }) => Ok(Some(escrow_ref)),
            Some(other) => Err(unexpected_response(pending, &other)),
            None => Ok(None),
        }
    }

    fn poll_value(&self, pending: &PendingRequest) -> Result<Option<ResponseValue>, ApiError> {
        match self.bridge.poll(pending.request_id) {
            PollStatus::Pending => Ok(None),
            PollStatus::Ready(ResponseOutcome::Result(value)) => Ok(Some(value)),
            PollStatus::Ready(ResponseOutcome::Error(message)) => {
                Err(ApiError::BridgeError(message))
            }
            PollStatus::NotFound => Err(ApiError::NotFound(format!(
                "bridge request {}",
                pending.request_id
            ))),
        }
    }
}

fn expect_kind(pending: &PendingRequest, kind: RequestKind) -> Result<(), ApiError> {
    if pending.kind != kind {
        return Err(ApiError::ValidationError(format!(
            "request {} is a {} request, not {}",
            pending.request_id,
            pending.kind.as_str(),
            kind.as_str()
        )));
    }
    Ok(())
}

fn unexpected_response(pending: &PendingRequest, value: &ResponseValue) -> ApiError {
    ApiError::BridgeError(format!(
        "request {} ({}) received mismatched response {:?}",
        pending.request_id,
        pending.kind.as_str(),
        value
    ))
}

fn unix_seconds() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
