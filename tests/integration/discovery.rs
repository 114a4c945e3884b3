use super::support::{offline_coordinator, OTHER_WALLET, WALLET};

#[test]
fn browse_matches_name_and_description_case_insensitively() {
    let coordinator = offline_coordinator();
    coordinator
        .register_agent(WALLET, 1, "Trading Bot Alpha", "Executes swaps on request")
        .unwrap();
    coordinator
        .register_agent(OTHER_WALLET, 2, "Research Desk", "Writes market reports")
        .unwrap();

    let names = |query: &str| -> Vec<String> {
        coordinator
            .browse_agents(query)
            .unwrap()
            .into_iter()
            .map(|agent| agent.name)
            .collect()
    };

    assert_eq!(names("trading"), vec!["Trading Bot Alpha"]);
    assert_eq!(names("BOT"), vec!["Trading Bot Alpha"]);
    assert_eq!(names("swaps"), vec!["Trading Bot Alpha"]);
    assert_eq!(names("market"), vec!["Research Desk"]);
    assert!(names("analysis").is_empty());
    assert_eq!(names(""), vec!["Trading Bot Alpha", "Research Desk"]);
}

#[test]
fn profiles_are_scoped_to_the_caller() {
    let coordinator = offline_coordinator();
    let mine = coordinator
        .register_agent(WALLET, 1, "Alpha", "")
        .unwrap();

    let profiles = coordinator.get_my_profiles().unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].agent_hash, hex::encode(mine));

    let fetched = coordinator.get_agent(&mine).unwrap().unwrap();
    assert_eq!(fetched.name, "Alpha");
}

#[test]
fn registering_twice_creates_two_records() {
    let coordinator = offline_coordinator();
    let first = coordinator.register_agent(WALLET, 1, "Alpha", "").unwrap();
    let second = coordinator.register_agent(WALLET, 1, "Alpha", "").unwrap();
    assert_ne!(first, second);
    assert_eq!(coordinator.browse_agents("alpha").unwrap().len(), 2);
}
