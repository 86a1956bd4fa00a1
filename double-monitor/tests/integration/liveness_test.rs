//! ハートビートによる死活判定の統合テスト

use crate::support::nodes::{
    address_of, dead_address, fixed_id_node, healthy_node, node_with_response, EchoNetVersion,
};
use crate::support::wait_until;
use double_monitor::config::MonitorConfig;
use double_monitor::health::{LivenessProber, PingOutcome};
use double_monitor::registry::NodeRegistry;
use double_monitor::types::NodeConfig;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prober(registry: &NodeRegistry) -> LivenessProber {
    let config = MonitorConfig::new(1000, 1, 500).unwrap();
    LivenessProber::new(registry.clone(), &config).unwrap()
}

#[tokio::test]
async fn alive_and_dead_nodes_are_distinguished() {
    let node = healthy_node("999").await;
    let registry = NodeRegistry::in_memory();
    registry
        .register_all(vec![
            NodeConfig::new(address_of(&node), "p", "dev"),
            NodeConfig::new(dead_address(), "p", "dev"),
        ])
        .await
        .unwrap();

    let outcomes = prober(&registry).check_all().await;
    assert_eq!(outcomes, vec![PingOutcome::Accepted, PingOutcome::Failed]);

    let nodes = registry.snapshot().await;
    assert!(nodes[0].alive);
    assert_eq!(nodes[0].last_response_id, 1);
    assert_eq!(nodes[0].network_id.as_deref(), Some("999"));
    assert_eq!(nodes[0].failure_count, 0);

    assert!(!nodes[1].alive);
    assert_eq!(nodes[1].failure_count, 1);
    assert_eq!(nodes[1].network_id, None);
}

#[tokio::test]
async fn request_id_follows_last_response_id() {
    let node = healthy_node("5").await;
    let registry = NodeRegistry::in_memory();
    registry
        .register(NodeConfig::new(address_of(&node), "p", "dev"))
        .await
        .unwrap();
    let prober = prober(&registry);

    for _ in 0..3 {
        prober.check_all().await;
    }

    let requests = node.received_requests().await.unwrap();
    let ids: Vec<u64> = requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            assert_eq!(body["method"], "net_version");
            assert_eq!(body["jsonrpc"], "2.0");
            assert_eq!(body["params"], json!([]));
            body["id"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(registry.get(0).await.unwrap().last_response_id, 3);
}

#[tokio::test]
async fn stale_response_is_ignored() {
    let node = fixed_id_node(1, "999").await;
    let registry = NodeRegistry::in_memory();
    registry
        .register(NodeConfig::new(address_of(&node), "p", "dev"))
        .await
        .unwrap();
    let prober = prober(&registry);

    assert_eq!(prober.check_all().await, vec![PingOutcome::Accepted]);
    let accepted = registry.get(0).await.unwrap();

    assert_eq!(prober.check_all().await, vec![PingOutcome::Stale]);
    let after = registry.get(0).await.unwrap();
    assert_eq!(after, accepted);
}

#[tokio::test]
async fn malformed_responses_count_as_failures() {
    let cases = [
        ResponseTemplate::new(500),
        ResponseTemplate::new(200).set_body_string("not json"),
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "result": "1"})),
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1})),
    ];

    for template in cases {
        let node = node_with_response(template).await;
        let registry = NodeRegistry::in_memory();
        registry
            .register(NodeConfig::new(address_of(&node), "p", "dev"))
            .await
            .unwrap();

        assert_eq!(prober(&registry).check_all().await, vec![PingOutcome::Failed]);
        let status = registry.get(0).await.unwrap();
        assert!(!status.alive);
        assert_eq!(status.failure_count, 1);
        assert_eq!(status.last_response_id, 0);
    }
}

#[tokio::test]
async fn success_after_failures_resets_count() {
    let node = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&node)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(EchoNetVersion {
            network_id: "7".to_string(),
        })
        .mount(&node)
        .await;

    let registry = NodeRegistry::in_memory();
    registry
        .register(NodeConfig::new(address_of(&node), "p", "dev"))
        .await
        .unwrap();
    let prober = prober(&registry);

    assert_eq!(prober.check_node(0).await, PingOutcome::Failed);
    assert_eq!(prober.check_node(0).await, PingOutcome::Failed);
    let failing = registry.get(0).await.unwrap();
    assert!(!failing.alive);
    assert_eq!(failing.failure_count, 2);

    assert_eq!(prober.check_node(0).await, PingOutcome::Accepted);
    let recovered = registry.get(0).await.unwrap();
    assert!(recovered.alive);
    assert_eq!(recovered.failure_count, 0);
    assert_eq!(recovered.last_response_id, 1);
    assert_eq!(recovered.network_id.as_deref(), Some("7"));
}

#[tokio::test]
async fn max_response_id_is_rejected_and_node_can_still_die() {
    let node = fixed_id_node(u64::MAX, "999").await;
    let registry = NodeRegistry::in_memory();
    registry
        .register(NodeConfig::new(address_of(&node), "p", "dev"))
        .await
        .unwrap();
    let prober = prober(&registry);

    assert_eq!(prober.check_all().await, vec![PingOutcome::Failed]);
    let status = registry.get(0).await.unwrap();
    assert!(!status.alive);
    assert_eq!(status.failure_count, 1);
    assert_eq!(status.last_response_id, 0);

    drop(node);
    assert_eq!(prober.check_all().await, vec![PingOutcome::Failed]);
    let status = registry.get(0).await.unwrap();
    assert!(!status.alive);
    assert_eq!(status.failure_count, 2);
}

#[tokio::test]
async fn hanging_node_does_not_delay_other_nodes() {
    let slow = node_with_response(
        ResponseTemplate::new(200)
            .set_delay(Duration::from_secs(5))
            .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "1"})),
    )
    .await;
    let fast = healthy_node("999").await;
    let registry = NodeRegistry::in_memory();
    registry
        .register_all(vec![
            NodeConfig::new(address_of(&slow), "p", "dev"),
            NodeConfig::new(address_of(&fast), "p", "dev"),
        ])
        .await
        .unwrap();
    let config = MonitorConfig::new(5000, 1, 5000).unwrap();
    let prober = LivenessProber::new(registry.clone(), &config).unwrap();

    let started = Instant::now();
    let handles = prober.spawn_round().await;
    let fast_alive = wait_until(Duration::from_secs(2), || async {
        registry.get(1).await.is_some_and(|n| n.alive)
    })
    .await;

    assert!(fast_alive);
    assert!(started.elapsed() < Duration::from_secs(2));
    let pending = registry.get(0).await.unwrap();
    assert!(!pending.alive);
    assert_eq!(pending.failure_count, 0);
    assert_eq!(pending.last_response_id, 0);

    for handle in handles {
        handle.abort();
    }
}
