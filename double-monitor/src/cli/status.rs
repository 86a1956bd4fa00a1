//! status subcommand
//!
//! Displays the nodes tracked by the running monitor.

use crate::client::MonitorClient;
use crate::discovery::scan_for_monitor;
use crate::types::node::NodeStatus;
use clap::Args;

/// Arguments for the status subcommand
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Monitor port (discovered when omitted)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Only show nodes of this project
    #[arg(long)]
    pub project: Option<String>,

    /// Only show nodes of this environment (requires --project)
    #[arg(long, requires = "project")]
    pub environment: Option<String>,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs) -> Result<(), anyhow::Error> {
    let port = match args.port {
        Some(port) => port,
        None => scan_for_monitor().await?,
    };

    let client = MonitorClient::new(port)?;
    let nodes = client
        .status(args.project.as_deref(), args.environment.as_deref())
        .await?;

    if nodes.is_empty() {
        println!("No nodes registered");
    } else {
        print!("{}", render_table(&nodes));
    }
    Ok(())
}

/// ノード一覧をタブ区切りの表にする
pub fn render_table(nodes: &[NodeStatus]) -> String {
    let mut out = String::from("ADDRESS\tPROJECT\tENVIRONMENT\tSTATUS\tFAILURES\tNETWORK\tLAST UPDATE\n");
    for node in nodes {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            node.config.address,
            node.config.project,
            node.config.environment,
            if node.alive { "Alive" } else { "Down" },
            node.failure_count,
            node.network_id.as_deref().unwrap_or("-"),
            node.last_update.to_rfc3339(),
        ));
    }
    out
}
