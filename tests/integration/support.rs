use acp_ledger::bridge::{Bridge, BridgeConfig, BridgeWorker};
use acp_ledger::coordinator::{CallerIdentity, Coordinator};
use acp_ledger::ledger::Ledger;
use acp_ledger::settlement::{SettlementAdapter, SimulatedSettlement};
use acp_ledger::tools::AcpTools;
use std::sync::Arc;
use std::time::Duration;

pub const WALLET: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1";
pub const OTHER_WALLET: &str = "0x8ba1f109551bD432803012645Ac136ddd64DBA72";

pub fn escrow_ref() -> String {
    format!("0x{}", "1".repeat(64))
}

/// Coordinator over a temporary ledger with no bridge worker attached
pub fn offline_coordinator() -> Coordinator {
    let ledger = Arc::new(Ledger::temporary().unwrap());
    let (bridge, _rx) = Bridge::new(&BridgeConfig::default());
    let caller = CallerIdentity::new(WALLET, 1).unwrap();
    Coordinator::new(ledger, Arc::new(bridge), caller)
}

/// Tool surface backed by a spawned worker over `chain`
pub fn tools_with(chain: Arc<SimulatedSettlement>) -> AcpTools {
    let ledger = Arc::new(Ledger::temporary().unwrap());
    let (bridge, rx) = Bridge::new(&BridgeConfig::default());
    BridgeWorker::new(&bridge, rx, chain as Arc<dyn SettlementAdapter>, 4).spawn();
    let caller = CallerIdentity::new(WALLET, 1).unwrap();
    let coordinator = Arc::new(Coordinator::new(ledger, Arc::new(bridge), caller));
    AcpTools::new(coordinator, Duration::from_secs(5), 18)
}
