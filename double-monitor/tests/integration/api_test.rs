//! Status & Control API の統合テスト（起動したモニターに対してHTTPで検証）

use crate::support::nodes::{address_of, healthy_node, node_with_response};
use crate::support::wait_until;
use double_monitor::api::MONITOR_SERVER_HEADER;
use double_monitor::config::MonitorConfig;
use double_monitor::registry::NodeRegistry;
use double_monitor::types::{NodeConfig, NodeStatus};
use double_monitor::Monitor;
use reqwest::{header, StatusCode};
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use wiremock::ResponseTemplate;

async fn start_monitor() -> (Monitor, SocketAddr) {
    let monitor = Monitor::new(
        NodeRegistry::in_memory(),
        MonitorConfig::new(1000, 1, 500).unwrap(),
    )
    .unwrap();
    let addr = monitor.start(0).await.unwrap();
    (monitor, addr)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn status(addr: SocketAddr, path: &str) -> Vec<NodeStatus> {
    let response = client()
        .get(format!("http://{}{}", addr, path))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

#[tokio::test]
async fn add_then_status_reports_node_alive() {
    let node = healthy_node("999").await;
    let (monitor, addr) = start_monitor().await;

    let response = client()
        .post(format!("http://{}/add", addr))
        .json(&json!({
            "nodes": [{"address": address_of(&node), "project": "p", "environment": "dev"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "\"Ok\"");

    let became_alive = wait_until(Duration::from_secs(4), || async {
        let nodes = status(addr, "/status").await;
        nodes.len() == 1 && nodes[0].alive
    })
    .await;
    assert!(became_alive);

    let nodes = status(addr, "/status/p/dev").await;
    assert_eq!(nodes[0].network_id.as_deref(), Some("999"));
    assert!(nodes[0].last_response_id >= 1);

    monitor.stop().await;
}

#[tokio::test]
async fn status_filters_by_project_and_environment() {
    let (monitor, addr) = start_monitor().await;
    let response = client()
        .post(format!("http://{}/add", addr))
        .body(
            json!({
                "nodes": [
                    {"address": "127.0.0.1:1", "project": "alpha", "environment": "dev"},
                    {"address": "127.0.0.1:2", "project": "alpha", "environment": "prod"},
                    {"address": "127.0.0.1:3", "project": "beta", "environment": "dev"}
                ]
            })
            .to_string(),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(status(addr, "/status").await.len(), 3);
    assert_eq!(status(addr, "/status/alpha").await.len(), 2);
    let prod = status(addr, "/status/alpha/prod").await;
    assert_eq!(prod.len(), 1);
    assert_eq!(prod[0].config.address, "127.0.0.1:2");
    assert!(status(addr, "/status/gamma").await.is_empty());

    monitor.stop().await;
}

#[tokio::test]
async fn invalid_batch_is_rejected_entirely() {
    let (monitor, addr) = start_monitor().await;

    let response = client()
        .post(format!("http://{}/add", addr))
        .json(&json!({
            "nodes": [
                {"address": "127.0.0.1:1", "project": "p", "environment": "dev"},
                {"project": "p", "environment": "dev"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::SERVER).unwrap(),
        MONITOR_SERVER_HEADER
    );
    assert!(response.text().await.unwrap().starts_with("nodes[1]:"));

    let response = client()
        .post(format!("http://{}/add", addr))
        .json(&json!({"node": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text().await.unwrap(),
        "The field nodes is not an array."
    );

    assert!(status(addr, "/status").await.is_empty());
    monitor.stop().await;
}

#[tokio::test]
async fn every_response_identifies_the_monitor() {
    let (monitor, addr) = start_monitor().await;

    for path in ["/status", "/status/p", "/status/p/dev", "/missing"] {
        let response = client()
            .get(format!("http://{}{}", addr, path))
            .send()
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::SERVER).unwrap(),
            MONITOR_SERVER_HEADER,
            "{}",
            path
        );
    }

    monitor.stop().await;
}

#[tokio::test]
async fn status_answers_while_ping_is_in_flight() {
    let slow = node_with_response(
        ResponseTemplate::new(200)
            .set_delay(Duration::from_secs(5))
            .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "1"})),
    )
    .await;
    let registry = NodeRegistry::in_memory();
    registry
        .register(NodeConfig::new(address_of(&slow), "p", "dev"))
        .await
        .unwrap();
    let monitor = Monitor::new(registry, MonitorConfig::new(5000, 1, 5000).unwrap()).unwrap();
    let addr = monitor.start(0).await.unwrap();

    let ping_sent = wait_until(Duration::from_secs(2), || async {
        slow.received_requests()
            .await
            .is_some_and(|requests| !requests.is_empty())
    })
    .await;
    assert!(ping_sent);

    let started = Instant::now();
    let nodes = status(addr, "/status").await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(nodes.len(), 1);
    assert!(!nodes[0].alive);
    assert_eq!(nodes[0].failure_count, 0);

    monitor.stop().await;
}
