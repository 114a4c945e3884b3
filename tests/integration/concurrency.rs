use super::support::{escrow_ref, offline_coordinator, WALLET};
use acp_ledger::entry::{JobPhase, ServiceRequirements};
use acp_ledger::error::ApiError;
use acp_ledger::store::EntryStore;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn racing_transitions_from_the_same_head_commit_once() {
    let coordinator = Arc::new(offline_coordinator());
    coordinator
        .execute_acp_job(
            WALLET,
            "market_analysis",
            ServiceRequirements::new(),
            &escrow_ref(),
            Some("job_race".to_string()),
        )
        .unwrap();

    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));
    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator.advance_job("job_race", JobPhase::Negotiation, None)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);

    // Every loser saw a head that had already moved
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(ApiError::InvalidTransition { .. })));
    }

    let history = coordinator.job_history("job_race").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].phase, JobPhase::Negotiation);
    assert!(history[1].previous_revision.is_some());
}

#[test]
fn concurrent_job_creation_links_every_job() {
    let coordinator = Arc::new(offline_coordinator());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                coordinator
                    .execute_acp_job(
                        WALLET,
                        "market_analysis",
                        ServiceRequirements::new(),
                        &escrow_ref(),
                        Some(format!("job_{}", i)),
                    )
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(coordinator.get_my_jobs().unwrap().len(), 8);
}

#[test]
fn racing_creators_of_one_job_id_leave_a_single_record() {
    for round in 0..16 {
        let coordinator = Arc::new(offline_coordinator());
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));
        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.execute_acp_job(
                        WALLET,
                        "market_analysis",
                        ServiceRequirements::new(),
                        &escrow_ref(),
                        Some("job_dup".to_string()),
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "round {}", round);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(result, Err(ApiError::ValidationError(_))));
        }
        assert_eq!(coordinator.ledger().store().len(), 1, "round {}", round);
        assert_eq!(coordinator.get_my_jobs().unwrap().len(), 1);
    }
}
