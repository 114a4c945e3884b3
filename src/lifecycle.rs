//! Job Lifecycle
//!
//! `requested -> negotiation -> transaction -> completed`, with `rejected` reachable
//! from every non-terminal phase. A transition never edits a job; it produces the
//! next revision, which references the current head.

use crate::entry::{JobEntry, JobPhase};
use crate::error::ApiError;
use crate::types::RecordHash;

/// Whether `from -> to` is an edge of the state machine
pub fn is_allowed(from: JobPhase, to: JobPhase) -> bool {
    use JobPhase::*;
    matches!(
        (from, to),
        (Requested, Negotiation)
            | (Negotiation, Transaction)
            | (Transaction, Completed)
            | (Requested | Negotiation | Transaction, Rejected)
    )
}

/// Phases reachable from `from` in one step
pub fn next_phases(from: JobPhase) -> Vec<JobPhase> {
    JobPhase::ALL
        .iter()
        .copied()
        .filter(|to| is_allowed(from, *to))
        .collect()
}

/// Build the revision that moves `current` (stored at `current_hash`) into `to`.
///
/// Terminal phases and edges outside the state machine fail with
/// `InvalidTransition`. A deliverable is required for `completed` and refused for
/// every other phase.
pub fn transition(
    current: &JobEntry,
    current_hash: RecordHash,
    to: JobPhase,
    deliverable: Option<String>,
) -> Result<JobEntry, ApiError> {
    if !is_allowed(current.phase, to) {
        return Err(ApiError::InvalidTransition {
            job_id: current.job_id.clone(),
            from: current.phase,
            to,
        });
    }

    let deliverable = match to {
        JobPhase::Completed => match deliverable {
            Some(d) if !d.trim().is_empty() => Some(d),
            _ => {
                return Err(ApiError::ValidationError(
                    "completed jobs require a non-empty deliverable".to_string(),
                ))
            }
        },
        _ if deliverable.is_some() => {
            return Err(ApiError::ValidationError(format!(
                "deliverable can only be set when completing a job, not on '{}'",
                to
            )))
        }
        _ => None,
    };

    let mut next = current.clone();
    next.phase = to;
    next.phases.push(to);
    next.deliverable = deliverable;
    next.previous_revision = Some(current_hash);
    Ok(next)
}
