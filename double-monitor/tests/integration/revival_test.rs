//! 自動復旧の統合テスト

use crate::support::nodes::dead_address;
use crate::support::wait_until;
use double_monitor::config::MonitorConfig;
use double_monitor::health::LivenessProber;
use double_monitor::registry::NodeRegistry;
use double_monitor::types::NodeConfig;
use std::path::Path;
use std::time::Duration;

fn appending_revive(marker: &Path) -> NodeConfig {
    NodeConfig::new(dead_address(), "p", "dev").with_revive(
        "sh",
        vec![
            "-c".to_string(),
            format!("echo revived >> '{}'", marker.display()),
        ],
    )
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|content| content.lines().count())
        .unwrap_or(0)
}

#[cfg(unix)]
#[tokio::test]
async fn revive_runs_once_tolerance_is_reached() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("revived.log");

    let registry = NodeRegistry::in_memory();
    registry.register(appending_revive(&marker)).await.unwrap();
    let config = MonitorConfig::new(1000, 5, 200).unwrap();
    let prober = LivenessProber::new(registry.clone(), &config).unwrap();

    for _ in 0..4 {
        prober.check_all().await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!marker.exists(), "revived before reaching tolerance");
    assert_eq!(registry.get(0).await.unwrap().last_process_id, None);

    prober.check_all().await;
    assert!(wait_until(Duration::from_secs(3), || async { line_count(&marker) == 1 }).await);

    let status = registry.get(0).await.unwrap();
    assert_eq!(status.failure_count, 5);
    assert!(status.last_process_id.is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn revive_repeats_on_every_failure_past_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("revived.log");

    let registry = NodeRegistry::in_memory();
    registry.register(appending_revive(&marker)).await.unwrap();
    let config = MonitorConfig::new(1000, 2, 200).unwrap();
    let prober = LivenessProber::new(registry.clone(), &config).unwrap();

    for _ in 0..4 {
        prober.check_all().await;
    }

    assert!(wait_until(Duration::from_secs(3), || async { line_count(&marker) == 3 }).await);
}

#[tokio::test]
async fn node_without_revive_cmd_only_counts_failures() {
    let registry = NodeRegistry::in_memory();
    registry
        .register(NodeConfig::new(dead_address(), "p", "dev"))
        .await
        .unwrap();
    let config = MonitorConfig::new(1000, 1, 200).unwrap();
    let prober = LivenessProber::new(registry.clone(), &config).unwrap();

    prober.check_all().await;
    prober.check_all().await;

    let status = registry.get(0).await.unwrap();
    assert_eq!(status.failure_count, 2);
    assert_eq!(status.last_process_id, None);
}

#[tokio::test]
async fn missing_revive_binary_does_not_stop_probing() {
    let registry = NodeRegistry::in_memory();
    registry
        .register(
            NodeConfig::new(dead_address(), "p", "dev")
                .with_revive("double-monitor-no-such-binary", Vec::new()),
        )
        .await
        .unwrap();
    let config = MonitorConfig::new(1000, 1, 200).unwrap();
    let prober = LivenessProber::new(registry.clone(), &config).unwrap();

    prober.check_all().await;
    prober.check_all().await;

    let status = registry.get(0).await.unwrap();
    assert_eq!(status.failure_count, 2);
    assert_eq!(status.last_process_id, None);
}
