//! Content hashing for entries, anchors and caller identities.
//!
//! Every hash is domain-separated and every variable-length field is length-prefixed,
//! so two different entries can never feed the hasher the same byte stream.

use super::{AgentEntry, Entry, JobEntry};
use crate::types::{EntryHash, Hash};

const AGENT_DOMAIN: &[u8] = b"acp:entry:agent:v1";
const JOB_DOMAIN: &[u8] = b"acp:entry:job:v1";
const ANCHOR_DOMAIN: &[u8] = b"acp:anchor:v1";
const CALLER_DOMAIN: &[u8] = b"acp:caller:v1";

fn update_str(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn update_opt_str(hasher: &mut blake3::Hasher, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(&[1]);
            update_str(hasher, v);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn agent_hash(agent: &AgentEntry) -> EntryHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(AGENT_DOMAIN);
    update_str(&mut hasher, &agent.wallet_address);
    hasher.update(&agent.session_key_id.to_le_bytes());
    update_str(&mut hasher, &agent.name);
    update_str(&mut hasher, &agent.description);
    hasher.update(&agent.registered_at.to_le_bytes());
    *hasher.finalize().as_bytes()
}

fn job_hash(job: &JobEntry) -> EntryHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(JOB_DOMAIN);
    update_str(&mut hasher, &job.job_id);
    hasher.update(&(job.phases.len() as u64).to_le_bytes());
    for phase in &job.phases {
        update_str(&mut hasher, phase.as_str());
    }
    update_str(&mut hasher, &job.escrow_ref);
    update_str(&mut hasher, &job.agent_wallet_address);
    update_str(&mut hasher, &job.job_offering_name);
    // serde_json maps are BTreeMap-backed, so the rendering is canonical
    let requirements = serde_json::Value::Object(
        job.service_requirements
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    );
    update_str(&mut hasher, &requirements.to_string());
    hasher.update(&job.created_at.to_le_bytes());
    update_str(&mut hasher, job.phase.as_str());
    update_opt_str(&mut hasher, job.deliverable.as_deref());
    match &job.previous_revision {
        Some(prev) => {
            hasher.update(&[1]);
            hasher.update(prev);
        }
        None => {
            hasher.update(&[0]);
        }
    }
    *hasher.finalize().as_bytes()
}

/// Compute the content hash of an entry
pub fn compute_entry_hash(entry: &Entry) -> EntryHash {
    match entry {
        Entry::Agent(agent) => agent_hash(agent),
        Entry::Job(job) => job_hash(job),
    }
}

/// Hash of a well-known anchor path such as `all_agents`
pub fn anchor_hash(path: &str) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ANCHOR_DOMAIN);
    update_str(&mut hasher, path);
    *hasher.finalize().as_bytes()
}

/// Identity hash of a caller, derived from its wallet address.
///
/// Addresses are case-insensitive, so the lowercase form is hashed.
pub fn caller_identity_hash(wallet_address: &str) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(CALLER_DOMAIN);
    update_str(&mut hasher, &wallet_address.to_ascii_lowercase());
    *hasher.finalize().as_bytes()
}
