use super::support::{escrow_ref, offline_coordinator, WALLET};
use acp_ledger::entry::{JobPhase, ServiceRequirements};
use acp_ledger::error::ApiError;
use acp_ledger::lifecycle::{is_allowed, next_phases};
use acp_ledger::links::{all_agents_anchor, LinkType};
use acp_ledger::store::EntryStore;
use acp_ledger::validation::{is_transaction_ref, is_wallet_address};
use proptest::prelude::*;

fn phase() -> impl Strategy<Value = JobPhase> {
    prop::sample::select(JobPhase::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn malformed_wallets_create_no_entry(wallet in "(0x)?[0-9a-fA-F]{0,39}|0x[0-9a-fA-F]{41,44}|0x[g-z]{40}") {
        prop_assume!(!is_wallet_address(&wallet));
        let coordinator = offline_coordinator();
        let result = coordinator.execute_acp_job(
            &wallet,
            "market_analysis",
            ServiceRequirements::new(),
            &escrow_ref(),
            None,
        );
        prop_assert!(matches!(result, Err(ApiError::ValidationError(_))));
        prop_assert!(coordinator.ledger().store().is_empty());
    }

    #[test]
    fn malformed_wallets_register_no_agent(wallet in "(0x)?[0-9a-fA-F]{0,39}|0x[0-9a-fA-F]{41,44}|0x[g-z]{40}") {
        prop_assume!(!is_wallet_address(&wallet));
        let coordinator = offline_coordinator();
        let result = coordinator.register_agent(&wallet, 1, "Alpha", "Market analysis agent");
        prop_assert!(matches!(result, Err(ApiError::ValidationError(_))));
        prop_assert!(coordinator.ledger().store().is_empty());
        prop_assert!(coordinator
            .ledger()
            .get_links(&all_agents_anchor(), LinkType::AllAgents)
            .unwrap()
            .is_empty());
        prop_assert!(coordinator.browse_agents("").unwrap().is_empty());
    }

    #[test]
    fn blank_names_register_no_agent(name in "[ \t]{0,8}") {
        let coordinator = offline_coordinator();
        let result = coordinator.register_agent(WALLET, 1, &name, "");
        prop_assert!(matches!(result, Err(ApiError::ValidationError(_))));
        prop_assert!(coordinator.ledger().store().is_empty());
        prop_assert!(coordinator.get_my_profiles().unwrap().is_empty());
    }

    #[test]
    fn malformed_escrow_refs_create_no_entry(escrow in "(0x)?[0-9a-f]{0,63}|0x[0-9a-f]{65,70}") {
        prop_assume!(!is_transaction_ref(&escrow));
        let coordinator = offline_coordinator();
        let result = coordinator.execute_acp_job(
            WALLET,
            "market_analysis",
            ServiceRequirements::new(),
            &escrow,
            None,
        );
        prop_assert!(matches!(result, Err(ApiError::ValidationError(_))));
        prop_assert!(coordinator.ledger().store().is_empty());
    }

    #[test]
    fn well_formed_addresses_are_accepted(body in "[0-9a-fA-F]{40}") {
        let wallet = format!("0x{}", body);
        prop_assert!(is_wallet_address(&wallet));
    }

    #[test]
    fn terminal_phases_have_no_exits(from in phase(), to in phase()) {
        if from.is_terminal() {
            prop_assert!(!is_allowed(from, to));
            prop_assert!(next_phases(from).is_empty());
        }
    }

    #[test]
    fn disallowed_transitions_leave_history_unchanged(to in phase()) {
        let coordinator = offline_coordinator();
        coordinator
            .execute_acp_job(
                WALLET,
                "market_analysis",
                ServiceRequirements::new(),
                &escrow_ref(),
                Some("job_prop".to_string()),
            )
            .unwrap();
        coordinator.advance_job("job_prop", JobPhase::Rejected, None).unwrap();

        let deliverable = (to == JobPhase::Completed).then(|| "report.csv".to_string());
        let result = coordinator.advance_job("job_prop", to, deliverable);
        prop_assert!(matches!(result, Err(ApiError::InvalidTransition { .. })), "{:?}", result);
        prop_assert_eq!(coordinator.job_history("job_prop").unwrap().len(), 2);
    }
}
