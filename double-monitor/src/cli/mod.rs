//! CLI module for double-monitor
//!
//! Provides the daemon-management command-line interface.

pub mod add;
pub mod locate;
pub mod serve;
pub mod status;
pub mod stop;

use clap::{Parser, Subcommand};

/// double-monitor - Node health monitor & discovery daemon
#[derive(Parser, Debug)]
#[command(name = "double-monitor")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    DOUBLE_MONITOR_PORT                    Listen port (default: first free port in 9545-9644)
    DOUBLE_MONITOR_HOST                    Bind address (default: 127.0.0.1)
    DOUBLE_MONITOR_LOG_LEVEL               Log level (default: info)
    DOUBLE_MONITOR_DATABASE_URL            Database URL (default: sqlite:~/.double-monitor/monitor.db)
    DOUBLE_MONITOR_HEARTBEAT_INTERVAL_MS   Ping interval in milliseconds (default: 5000, min: 1000)
    DOUBLE_MONITOR_FAILURE_TOLERANCE       Failed pings before revival (default: 1)
    DOUBLE_MONITOR_PING_TIMEOUT_MS         Per-ping timeout in milliseconds (default: 3000)
    DOUBLE_MONITOR_LOCK_DIR                Directory for daemon lock files
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitor daemon in the foreground
    Serve(serve::ServeArgs),
    /// Show node status from the running monitor
    Status(status::StatusArgs),
    /// Register a node, starting the monitor if needed
    Add(add::AddArgs),
    /// Print the port of the running monitor
    Locate(locate::LocateArgs),
    /// Stop a running monitor
    Stop(stop::StopArgs),
}
