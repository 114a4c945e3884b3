//! Ledger Entries
//!
//! Typed, immutable records for agents and jobs. Entries are content-addressed
//! (see [`id`]) and persisted inside a [`Record`] whose header gives each commit a
//! distinct identity even when two entries carry identical content.

pub mod id;
pub mod record;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use id::{anchor_hash, caller_identity_hash, compute_entry_hash};
pub use record::{Record, RecordHeader};

use crate::types::RecordHash;

/// Opaque service payload, passed through verbatim.
pub type ServiceRequirements = BTreeMap<String, serde_json::Value>;

/// Agent registered for discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEntry {
    /// Settlement-chain wallet address (0x + 40 hex)
    pub wallet_address: String,
    /// Session key under which the agent acts
    pub session_key_id: u64,
    pub name: String,
    pub description: String,
    /// Unix seconds
    pub registered_at: u64,
}

/// Job lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Requested,
    Negotiation,
    Transaction,
    Completed,
    Rejected,
}

impl JobPhase {
    pub const ALL: [JobPhase; 5] = [
        JobPhase::Requested,
        JobPhase::Negotiation,
        JobPhase::Transaction,
        JobPhase::Completed,
        JobPhase::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Requested => "requested",
            JobPhase::Negotiation => "negotiation",
            JobPhase::Transaction => "transaction",
            JobPhase::Completed => "completed",
            JobPhase::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Rejected)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobPhase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = JobPhase::ALL.iter().map(|p| p.as_str()).collect();
                format!("phase must be one of: {}", names.join(", "))
            })
    }
}

/// One revision of a job's provenance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEntry {
    pub job_id: String,
    /// Every phase this job has been in, oldest first; last element equals `phase`
    pub phases: Vec<JobPhase>,
    /// Settlement transaction reference (0x + 64 hex)
    pub escrow_ref: String,
    pub agent_wallet_address: String,
    pub job_offering_name: String,
    pub service_requirements: ServiceRequirements,
    /// Unix seconds, copied unchanged into every revision
    pub created_at: u64,
    pub phase: JobPhase,
    pub deliverable: Option<String>,
    /// Record hash of the revision this one supersedes
    #[serde(default, with = "crate::types::hex_hash::option")]
    pub previous_revision: Option<RecordHash>,
}

impl JobEntry {
    /// Build the initial (`requested`) revision of a job.
    pub fn requested(
        job_id: String,
        agent_wallet_address: String,
        job_offering_name: String,
        service_requirements: ServiceRequirements,
        escrow_ref: String,
        created_at: u64,
    ) -> Self {
        Self {
            job_id,
            phases: vec![JobPhase::Requested],
            escrow_ref,
            agent_wallet_address,
            job_offering_name,
            service_requirements,
            created_at,
            phase: JobPhase::Requested,
            deliverable: None,
            previous_revision: None,
        }
    }

    pub fn is_initial_revision(&self) -> bool {
        self.previous_revision.is_none()
    }
}

/// Entry type tag, carried in record headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Agent,
    Job,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Agent => "agent",
            EntryType::Job => "job",
        }
    }
}

/// Any entry the ledger accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Entry {
    Agent(AgentEntry),
    Job(JobEntry),
}

impl Entry {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Entry::Agent(_) => EntryType::Agent,
            Entry::Job(_) => EntryType::Job,
        }
    }

    pub fn as_agent(&self) -> Option<&AgentEntry> {
        match self {
            Entry::Agent(agent) => Some(agent),
            Entry::Job(_) => None,
        }
    }

    pub fn as_job(&self) -> Option<&JobEntry> {
        match self {
            Entry::Job(job) => Some(job),
            Entry::Agent(_) => None,
        }
    }
}
