//! locate subcommand
//!
//! Prints the port of the running monitor.

use crate::discovery::{find_or_start, scan_for_monitor, StartOptions};
use clap::Args;

/// Arguments for the locate subcommand
#[derive(Args, Debug, Clone)]
pub struct LocateArgs {
    /// Start a monitor when none is running
    #[arg(long, default_value_t = false)]
    pub start: bool,
}

/// Execute the locate command
pub async fn execute(args: &LocateArgs) -> Result<(), anyhow::Error> {
    let port = if args.start {
        find_or_start(&StartOptions::current_exe()?).await?.port
    } else {
        scan_for_monitor().await?
    };

    println!("{}", port);
    Ok(())
}
