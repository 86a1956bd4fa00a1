//! 永続化と再起動時の復元の統合テスト

use crate::support::sqlite_url;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use double_monitor::api::create_app;
use double_monitor::config::MonitorConfig;
use double_monitor::db::{init_db_pool, NodeStore};
use double_monitor::registry::NodeRegistry;
use double_monitor::types::NodeConfig;
use double_monitor::{AppState, Monitor};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn registered_nodes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = sqlite_url(&dir);

    {
        let pool = init_db_pool(&url).await.unwrap();
        let registry = NodeRegistry::load(NodeStore::new(pool.clone())).await.unwrap();
        let monitor = Monitor::new(registry, MonitorConfig::default()).unwrap();
        let addr = monitor.start(0).await.unwrap();

        let response = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .post(format!("http://{}/add", addr))
            .json(&json!({
                "nodes": [
                    {"address": "127.0.0.1:1", "project": "p", "environment": "dev"},
                    {"address": "127.0.0.1:2", "project": "p", "environment": "prod",
                     "reviveCmd": "geth", "reviveArgs": ["--dev", "--rpc"]}
                ]
            }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        monitor.stop().await;
        pool.close().await;
    }

    let pool = init_db_pool(&url).await.unwrap();
    let registry = NodeRegistry::load(NodeStore::new(pool)).await.unwrap();
    let nodes = registry.snapshot().await;

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].config, NodeConfig::new("127.0.0.1:1", "p", "dev"));
    assert_eq!(
        nodes[1].config,
        NodeConfig::new("127.0.0.1:2", "p", "prod")
            .with_revive("geth", vec!["--dev".to_string(), "--rpc".to_string()])
    );
    for node in &nodes {
        assert!(!node.alive);
        assert_eq!(node.last_response_id, 0);
        assert_eq!(node.failure_count, 0);
    }
}

#[tokio::test]
async fn storage_failure_returns_500_and_registers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_db_pool(&sqlite_url(&dir)).await.unwrap();
    let registry = NodeRegistry::load(NodeStore::new(pool.clone())).await.unwrap();
    pool.close().await;

    let app = create_app(AppState::new(registry.clone()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/add")
                .body(Body::from(
                    json!({"nodes": [{"address": "127.0.0.1:1", "project": "p", "environment": "dev"}]})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(registry.is_empty().await);
}
