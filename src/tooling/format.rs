//! Format agents, jobs and balances as text.

use crate::coordinator::{AgentSummary, JobReceipt, JobView};
use crate::entry::{JobEntry, JobPhase};
use crate::tools::WalletBalance;
use chrono::{TimeZone, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Phase name colored by how far the job has progressed
pub fn format_phase(phase: JobPhase) -> String {
    match phase {
        JobPhase::Requested => format!("{}", phase.as_str().cyan()),
        JobPhase::Negotiation => format!("{}", phase.as_str().yellow()),
        JobPhase::Transaction => format!("{}", phase.as_str().blue()),
        JobPhase::Completed => format!("{}", phase.as_str().green()),
        JobPhase::Rejected => format!("{}", phase.as_str().red()),
    }
}

fn format_timestamp(unix_seconds: u64) -> String {
    i64::try_from(unix_seconds)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| unix_seconds.to_string())
}

fn short_hash(hex: &str) -> &str {
    &hex[..hex.len().min(12)]
}

pub fn format_agents_text(agents: &[AgentSummary]) -> String {
    if agents.is_empty() {
        return "No agents found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Agent", "Name", "Wallet", "Session", "Registered", "Description"]);
    for agent in agents {
        table.add_row(vec![
            short_hash(&agent.agent_hash).to_string(),
            agent.name.clone(),
            agent.wallet_address.clone(),
            agent.session_key_id.to_string(),
            format_timestamp(agent.registered_at),
            agent.description.clone(),
        ]);
    }
    format!("{}\n\nTotal: {} agent(s)", table, agents.len())
}

pub fn format_jobs_text(jobs: &[JobView]) -> String {
    if jobs.is_empty() {
        return "No jobs found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Job ID", "Offering", "Phase", "Agent wallet", "Created", "Revision"]);
    for view in jobs {
        table.add_row(vec![
            view.job.job_id.clone(),
            view.job.job_offering_name.clone(),
            format_phase(view.job.phase),
            view.job.agent_wallet_address.clone(),
            format_timestamp(view.job.created_at),
            short_hash(&view.job_hash).to_string(),
        ]);
    }
    format!("{}\n\nTotal: {} job(s)", table, jobs.len())
}

pub fn format_job_text(view: &JobView) -> String {
    let job = &view.job;
    let mut out = format!("{}\n\n", format_section_heading(&format!("Job {}", job.job_id)));
    out.push_str(&format!("  Revision:     {}\n", view.job_hash));
    out.push_str(&format!("  Phase:        {}\n", format_phase(job.phase)));
    out.push_str(&format!("  Offering:     {}\n", job.job_offering_name));
    out.push_str(&format!("  Agent wallet: {}\n", job.agent_wallet_address));
    out.push_str(&format!("  Escrow:       {}\n", job.escrow_ref));
    out.push_str(&format!("  Created:      {}\n", format_timestamp(job.created_at)));
    if let Some(deliverable) = &job.deliverable {
        out.push_str(&format!("  Deliverable:  {}\n", deliverable));
    }
    if !job.service_requirements.is_empty() {
        out.push_str("  Requirements:\n");
        for (key, value) in &job.service_requirements {
            out.push_str(&format!("    {} = {}\n", key, value));
        }
    }
    out
}

pub fn format_history_text(job_id: &str, history: &[JobEntry]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Phase", "Deliverable"]);
    for (i, revision) in history.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            format_phase(revision.phase),
            revision.deliverable.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    format!(
        "{}\n\n{}",
        format_section_heading(&format!("History of {}", job_id)),
        table
    )
}

pub fn format_receipt_text(receipt: &JobReceipt) -> String {
    format!(
        "Created job {} ({})\n  Revision: {}\n  Escrow:   {}",
        receipt.job_id,
        format_phase(receipt.phase),
        receipt.job_hash,
        receipt.escrow_ref
    )
}

pub fn format_balance_text(balance: &WalletBalance) -> String {
    format!(
        "{}\n  Balance: {} ({} minor units)",
        balance.address, balance.balance_decimal, balance.balance_minor_units
    )
}
