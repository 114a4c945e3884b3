use super::support::{escrow_ref, offline_coordinator, tools_with, WALLET};
use acp_ledger::entry::{JobPhase, ServiceRequirements};
use acp_ledger::error::ApiError;
use acp_ledger::settlement::SimulatedSettlement;
use acp_ledger::tools::ExecuteJobArgs;
use serde_json::json;
use std::sync::Arc;

fn requirements() -> ServiceRequirements {
    let mut reqs = ServiceRequirements::new();
    reqs.insert("timeframe".to_string(), json!("24h"));
    reqs
}

#[test]
fn job_runs_to_completion_and_stays_terminal() {
    let coordinator = offline_coordinator();
    coordinator
        .register_agent(WALLET, 1, "Alpha", "Market analysis agent")
        .unwrap();

    let receipt = coordinator
        .execute_acp_job(
            WALLET,
            "market_analysis",
            requirements(),
            &escrow_ref(),
            Some("job_e2e".to_string()),
        )
        .unwrap();
    assert_eq!(receipt.phase, JobPhase::Requested);

    let jobs = coordinator.get_my_jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job.phase, JobPhase::Requested);
    assert_eq!(jobs[0].job.service_requirements["timeframe"], json!("24h"));

    coordinator
        .advance_job("job_e2e", JobPhase::Negotiation, None)
        .unwrap();
    coordinator
        .advance_job("job_e2e", JobPhase::Transaction, None)
        .unwrap();
    coordinator
        .advance_job("job_e2e", JobPhase::Completed, Some("report.csv".to_string()))
        .unwrap();

    let current = coordinator.current_job("job_e2e").unwrap();
    assert_eq!(current.job.phase, JobPhase::Completed);
    assert_eq!(current.job.deliverable.as_deref(), Some("report.csv"));

    let history = coordinator.job_history("job_e2e").unwrap();
    let phases: Vec<_> = history.iter().map(|job| job.phase).collect();
    assert_eq!(
        phases,
        vec![
            JobPhase::Requested,
            JobPhase::Negotiation,
            JobPhase::Transaction,
            JobPhase::Completed
        ]
    );

    let err = coordinator
        .advance_job("job_e2e", JobPhase::Negotiation, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidTransition { .. }));
    assert_eq!(coordinator.job_history("job_e2e").unwrap().len(), 4);
}

#[test]
fn revisions_keep_the_original_terms() {
    let coordinator = offline_coordinator();
    coordinator
        .execute_acp_job(
            WALLET,
            "market_analysis",
            requirements(),
            &escrow_ref(),
            Some("job_terms".to_string()),
        )
        .unwrap();
    coordinator
        .advance_job("job_terms", JobPhase::Negotiation, None)
        .unwrap();

    let history = coordinator.job_history("job_terms").unwrap();
    assert_eq!(history[0].job_offering_name, history[1].job_offering_name);
    assert_eq!(history[0].escrow_ref, history[1].escrow_ref);
    assert_eq!(history[0].service_requirements, history[1].service_requirements);
    assert!(history[1].previous_revision.is_some());
}

#[test]
fn data_survives_reopening_the_store() {
    use acp_ledger::bridge::{Bridge, BridgeConfig};
    use acp_ledger::coordinator::{CallerIdentity, Coordinator};
    use acp_ledger::ledger::Ledger;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger");
    let open = |path: &std::path::Path| {
        let ledger = Arc::new(Ledger::open(path).unwrap());
        let (bridge, _rx) = Bridge::new(&BridgeConfig::default());
        Coordinator::new(ledger, Arc::new(bridge), CallerIdentity::new(WALLET, 1).unwrap())
    };

    {
        let coordinator = open(&path);
        coordinator
            .execute_acp_job(
                WALLET,
                "market_analysis",
                requirements(),
                &escrow_ref(),
                Some("job_durable".to_string()),
            )
            .unwrap();
        coordinator
            .advance_job("job_durable", JobPhase::Negotiation, None)
            .unwrap();
        coordinator.ledger().flush().unwrap();
    }

    let coordinator = open(&path);
    let current = coordinator.current_job("job_durable").unwrap();
    assert_eq!(current.job.phase, JobPhase::Negotiation);
    assert_eq!(coordinator.get_my_jobs().unwrap().len(), 1);
}

#[tokio::test]
async fn tool_surface_submits_escrow_then_records_the_job() {
    let chain = Arc::new(SimulatedSettlement::new());
    let tools = tools_with(Arc::clone(&chain));

    let receipt = tools
        .execute_acp_job(ExecuteJobArgs {
            agent_wallet_address: WALLET.to_string(),
            job_offering_name: "market_analysis".to_string(),
            service_requirements: requirements(),
            job_id: None,
        })
        .await
        .unwrap();
    assert_eq!(chain.escrow_calls(), 1);
    assert!(receipt.job_id.starts_with("job_"));
    assert_eq!(receipt.escrow_ref.len(), 66);

    let out = tools
        .dispatch(
            "advance_job",
            json!({ "jobId": receipt.job_id, "phase": "negotiation" }),
        )
        .await
        .unwrap();
    assert_eq!(out["phase"], "negotiation");

    let jobs = tools.dispatch("get_my_jobs", json!({})).await.unwrap();
    assert_eq!(jobs.as_array().unwrap().len(), 1);
}
