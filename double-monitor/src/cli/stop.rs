//! stop サブコマンド
//!
//! 起動中のモニターを停止する。

use crate::discovery::scan_for_monitor;
use crate::lock::{is_process_running, lock_path, read_lock_info, stop_process};
use clap::Args;
use std::time::Duration;

/// stop サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct StopArgs {
    /// Port of the monitor to stop (discovered when omitted)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Timeout in seconds to wait for the monitor to stop
    #[arg(short, long, default_value = "5")]
    pub timeout: u64,
}

/// stop コマンドを実行
pub async fn execute(args: &StopArgs) -> Result<(), anyhow::Error> {
    let port = match args.port {
        Some(port) => port,
        None => scan_for_monitor().await?,
    };

    let lock_info = match read_lock_info(port)? {
        Some(info) => info,
        None => {
            println!("No monitor lock found for port {}", port);
            return Ok(());
        }
    };

    if !is_process_running(lock_info.pid) {
        std::fs::remove_file(lock_path(port))?;
        println!(
            "Warning: Stale lock file found (PID {} not running), cleaned up",
            lock_info.pid
        );
        return Ok(());
    }

    println!(
        "Stopping monitor on port {} (PID: {})...",
        port, lock_info.pid
    );
    stop_process(lock_info.pid)?;

    let timeout = Duration::from_secs(args.timeout);
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if !is_process_running(lock_info.pid) {
            println!("Monitor stopped");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!(
        "Warning: Monitor did not stop within {} seconds. You may need to kill it manually: kill -9 {}",
        args.timeout, lock_info.pid
    );
    Ok(())
}
