use acp_ledger::bridge::{
    Bridge, BridgeConfig, BridgeResponse, DeliveryOutcome, PollStatus, RequestPayload,
    ResponseOutcome, ResponseValue,
};
use acp_ledger::error::ApiError;
use std::time::Duration;

const WALLET: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1";

fn balance_request() -> RequestPayload {
    RequestPayload::GetBalance {
        address: WALLET.to_string(),
    }
}

fn balance_response(request_id: u64, minor_units: u128) -> BridgeResponse {
    BridgeResponse {
        request_id,
        outcome: ResponseOutcome::Result(ResponseValue::Balance {
            address: WALLET.to_string(),
            minor_units,
        }),
    }
}

#[tokio::test]
async fn emitted_request_carries_its_id() {
    let (bridge, mut rx) = Bridge::new(&BridgeConfig::default());
    let pending = bridge.request(balance_request()).unwrap();
    let request = rx.recv().await.unwrap();
    assert_eq!(request.request_id, pending.request_id);
    assert!(matches!(bridge.poll(pending.request_id), PollStatus::Pending));
}

#[tokio::test]
async fn first_response_wins_and_duplicates_are_ignored() {
    let (bridge, _rx) = Bridge::new(&BridgeConfig::default());
    let pending = bridge.request(balance_request()).unwrap();

    assert_eq!(
        bridge.deliver(balance_response(pending.request_id, 5)),
        DeliveryOutcome::Accepted
    );
    assert_eq!(
        bridge.deliver(balance_response(pending.request_id, 9)),
        DeliveryOutcome::Duplicate
    );

    let value = bridge.wait(&pending, Duration::from_secs(1)).await.unwrap();
    assert_eq!(
        value,
        ResponseValue::Balance {
            address: WALLET.to_string(),
            minor_units: 5
        }
    );
}

#[tokio::test]
async fn responses_for_unknown_ids_are_dropped() {
    let (bridge, _rx) = Bridge::new(&BridgeConfig::default());
    assert_eq!(
        bridge.deliver(balance_response(u64::MAX, 1)),
        DeliveryOutcome::Unknown
    );
    assert!(matches!(bridge.poll(u64::MAX), PollStatus::NotFound));
}

#[tokio::test]
async fn out_of_order_responses_reach_the_right_requests() {
    let (bridge, _rx) = Bridge::new(&BridgeConfig::default());
    let first = bridge.request(balance_request()).unwrap();
    let second = bridge.request(balance_request()).unwrap();

    bridge.deliver(balance_response(second.request_id, 2));
    bridge.deliver(balance_response(first.request_id, 1));

    let one = bridge.wait(&first, Duration::from_secs(1)).await.unwrap();
    let two = bridge.wait(&second, Duration::from_secs(1)).await.unwrap();
    assert!(matches!(one, ResponseValue::Balance { minor_units: 1, .. }));
    assert!(matches!(two, ResponseValue::Balance { minor_units: 2, .. }));
}

#[tokio::test(start_paused = true)]
async fn timeout_abandons_the_request() {
    let (bridge, _rx) = Bridge::new(&BridgeConfig::default());
    let pending = bridge.request(balance_request()).unwrap();

    let err = bridge
        .wait(&pending, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BridgeError(_)));

    assert_eq!(
        bridge.deliver(balance_response(pending.request_id, 1)),
        DeliveryOutcome::Unknown
    );
}

#[tokio::test]
async fn settlement_errors_surface_as_bridge_errors() {
    let (bridge, _rx) = Bridge::new(&BridgeConfig::default());
    let pending = bridge.request(balance_request()).unwrap();
    bridge.deliver(BridgeResponse {
        request_id: pending.request_id,
        outcome: ResponseOutcome::Error("node unavailable".to_string()),
    });
    let err = bridge.wait(&pending, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, ApiError::BridgeError(msg) if msg.contains("node unavailable")));
}

#[tokio::test]
async fn resolved_responses_are_bounded() {
    let config = BridgeConfig {
        response_capacity: 2,
        ..BridgeConfig::default()
    };
    let (bridge, _rx) = Bridge::new(&config);
    let ids: Vec<_> = (0..3)
        .map(|_| bridge.request(balance_request()).unwrap().request_id)
        .collect();
    for (i, id) in ids.iter().enumerate() {
        bridge.deliver(balance_response(*id, i as u128));
    }

    assert_eq!(bridge.responses().resolved_count(), 2);
    assert!(matches!(bridge.poll(ids[0]), PollStatus::NotFound));
    assert!(matches!(bridge.poll(ids[2]), PollStatus::Ready(_)));
}

#[tokio::test]
async fn signals_round_trip_through_json() {
    let (bridge, mut rx) = Bridge::new(&BridgeConfig::default());
    let pending = bridge.request(balance_request()).unwrap();
    let signal = rx.recv().await.unwrap().to_signal().unwrap();
    assert!(signal.contains(WALLET));

    let response = format!(
        r#"{{"requestId":{},"result":{{"kind":"balance","address":"{}","minorUnits":"1500000000000000000"}}}}"#,
        pending.request_id, WALLET
    );
    assert_eq!(
        bridge.deliver_signal(&response).unwrap(),
        DeliveryOutcome::Accepted
    );
    let value = bridge.wait(&pending, Duration::from_secs(1)).await.unwrap();
    assert!(matches!(
        value,
        ResponseValue::Balance { minor_units: 1_500_000_000_000_000_000, .. }
    ));
}
