//! Validation Engine
//!
//! Pure, deterministic predicates run before a record is accepted into the store.
//! Nothing here performs I/O: any participant holding a copy of the data reaches
//! the same verdict.

use crate::entry::{compute_entry_hash, AgentEntry, Entry, JobEntry, JobPhase, Record};
use crate::error::ApiError;
use crate::lifecycle;
use crate::links::LinkType;
use crate::types::RecordHash;

/// Verdict of a validation predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateOutcome {
    Valid,
    Invalid(String),
}

impl ValidateOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidateOutcome::Valid)
    }

    /// Convert into the caller-facing error type
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            ValidateOutcome::Valid => Ok(()),
            ValidateOutcome::Invalid(reason) => Err(ApiError::ValidationError(reason)),
        }
    }
}

impl From<Result<(), String>> for ValidateOutcome {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => ValidateOutcome::Valid,
            Err(reason) => ValidateOutcome::Invalid(reason),
        }
    }
}

fn is_prefixed_hex(value: &str, hex_len: usize) -> bool {
    value.len() == hex_len + 2
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// `0x` followed by 40 hex digits, any case
pub fn is_wallet_address(value: &str) -> bool {
    is_prefixed_hex(value, 40)
}

/// `0x` followed by 64 hex digits, any case
pub fn is_transaction_ref(value: &str) -> bool {
    is_prefixed_hex(value, 64)
}

/// Check a wallet address, naming the offending field on failure
pub fn check_wallet_address(field: &str, value: &str) -> Result<(), String> {
    if is_wallet_address(value) {
        Ok(())
    } else {
        Err(format!(
            "{} must be a valid wallet address (0x + 40 hex chars), got '{}'",
            field, value
        ))
    }
}

/// Check an escrow reference
pub fn check_escrow_ref(value: &str) -> Result<(), String> {
    if is_transaction_ref(value) {
        Ok(())
    } else {
        Err(format!(
            "escrowRef must be a valid transaction reference (0x + 64 hex chars), got '{}'",
            value
        ))
    }
}

fn check_agent(agent: &AgentEntry) -> Result<(), String> {
    check_wallet_address("walletAddress", &agent.wallet_address)?;
    if agent.name.trim().is_empty() {
        return Err("name cannot be empty".to_string());
    }
    Ok(())
}

fn check_job(job: &JobEntry) -> Result<(), String> {
    check_escrow_ref(&job.escrow_ref)?;
    check_wallet_address("agentWalletAddress", &job.agent_wallet_address)?;

    if job.job_id.trim().is_empty() {
        return Err("jobId cannot be empty".to_string());
    }
    if job.job_offering_name.trim().is_empty() {
        return Err("jobOfferingName cannot be empty".to_string());
    }

    let Some(last) = job.phases.last() else {
        return Err("phases cannot be empty".to_string());
    };
    if *last != job.phase {
        return Err(format!(
            "phase '{}' does not match the last recorded phase '{}'",
            job.phase, last
        ));
    }

    match (job.phase, job.deliverable.as_deref()) {
        (JobPhase::Completed, None) => {
            return Err("completed jobs require a deliverable".to_string());
        }
        (JobPhase::Completed, Some(d)) if d.trim().is_empty() => {
            return Err("completed jobs require a non-empty deliverable".to_string());
        }
        (JobPhase::Completed, Some(_)) => {}
        (phase, Some(_)) => {
            return Err(format!("deliverable must be unset in phase '{}'", phase));
        }
        (_, None) => {}
    }

    if job.is_initial_revision() && job.phases != [JobPhase::Requested] {
        return Err("initial job revision must be in phase 'requested'".to_string());
    }
    if !job.is_initial_revision() && job.phases.len() < 2 {
        return Err("job revision must extend the phase history".to_string());
    }

    Ok(())
}

/// Validate an agent entry
pub fn validate_agent(agent: &AgentEntry) -> ValidateOutcome {
    check_agent(agent).into()
}

/// Validate a single job revision in isolation
pub fn validate_job(job: &JobEntry) -> ValidateOutcome {
    check_job(job).into()
}

/// Validate any entry
pub fn validate_entry(entry: &Entry) -> ValidateOutcome {
    match entry {
        Entry::Agent(agent) => validate_agent(agent),
        Entry::Job(job) => validate_job(job),
    }
}

/// Validate that `next` is a legal successor of `previous`, stored at `previous_hash`.
pub fn validate_revision(
    previous: &JobEntry,
    previous_hash: &RecordHash,
    next: &JobEntry,
) -> ValidateOutcome {
    let check = || -> Result<(), String> {
        check_job(next)?;
        if next.previous_revision.as_ref() != Some(previous_hash) {
            return Err("revision does not reference the current head".to_string());
        }
        if next.job_id != previous.job_id {
            return Err("revision changes jobId".to_string());
        }
        if next.escrow_ref != previous.escrow_ref
            || next.agent_wallet_address != previous.agent_wallet_address
            || next.job_offering_name != previous.job_offering_name
            || next.service_requirements != previous.service_requirements
            || next.created_at != previous.created_at
        {
            return Err("revision changes immutable job fields".to_string());
        }
        let extends_history = next.phases.len() == previous.phases.len() + 1
            && next.phases[..previous.phases.len()] == previous.phases[..];
        if !extends_history {
            return Err("revision must append exactly one phase to the history".to_string());
        }
        if !lifecycle::is_allowed(previous.phase, next.phase) {
            return Err(format!(
                "transition {} -> {} is not allowed",
                previous.phase, next.phase
            ));
        }
        Ok(())
    };
    check().into()
}

/// Validate a record's integrity (header matches entry) and its entry
pub fn validate_record(record: &Record) -> ValidateOutcome {
    if record.header.entry_type != record.entry.entry_type() {
        return ValidateOutcome::Invalid("header entry type does not match entry".to_string());
    }
    if record.header.entry_hash != compute_entry_hash(&record.entry) {
        return ValidateOutcome::Invalid("header entry hash does not match entry".to_string());
    }
    validate_entry(&record.entry)
}

/// Validate that `target` may be linked under `link_type`
pub fn validate_link(link_type: LinkType, target: &Record) -> ValidateOutcome {
    match (link_type, &target.entry) {
        (LinkType::AllAgents | LinkType::AgentToProfile, Entry::Agent(_)) => {
            ValidateOutcome::Valid
        }
        (LinkType::AgentToJobs, Entry::Job(job)) if job.is_initial_revision() => {
            ValidateOutcome::Valid
        }
        (LinkType::AgentToJobs, Entry::Job(_)) => ValidateOutcome::Invalid(
            "AgentToJobs links must target the initial job revision".to_string(),
        ),
        (link_type, entry) => ValidateOutcome::Invalid(format!(
            "{:?} links cannot target {} entries",
            link_type,
            entry.entry_type().as_str()
        )),
    }
}
