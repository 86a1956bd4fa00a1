//! ディスカバリーの統合テスト

use double_monitor::common::error::MonitorError;
use double_monitor::config::MonitorConfig;
use double_monitor::discovery::{find_or_start, scan_for_monitor_in, StartOptions};
use double_monitor::registry::NodeRegistry;
use double_monitor::Monitor;
use std::time::Duration;

const SCAN_TIMEOUT: Duration = Duration::from_millis(500);

#[tokio::test]
async fn scan_finds_running_monitor() {
    let monitor = Monitor::new(NodeRegistry::in_memory(), MonitorConfig::default()).unwrap();
    let port = monitor.start(0).await.unwrap().port();

    assert_eq!(scan_for_monitor_in(port..=port, SCAN_TIMEOUT).await.unwrap(), port);

    monitor.stop().await;
    assert!(matches!(
        scan_for_monitor_in(port..=port, SCAN_TIMEOUT).await,
        Err(MonitorError::MonitorNotFound { .. })
    ));
}

#[tokio::test]
async fn find_or_start_reuses_running_monitor() {
    let monitor = Monitor::new(NodeRegistry::in_memory(), MonitorConfig::default()).unwrap();
    let port = monitor.start(0).await.unwrap().port();

    let mut options = StartOptions::with_program("double-monitor-should-not-be-spawned");
    options.port_range = port..=port;
    options.scan_timeout = SCAN_TIMEOUT;

    let located = find_or_start(&options).await.unwrap();
    assert_eq!(located.port, port);
    assert_eq!(located.spawned_pid, None);

    monitor.stop().await;
}
