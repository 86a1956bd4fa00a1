//! add サブコマンド
//!
//! ノードを登録する。モニターが起動していなければ起動してから登録する。

use crate::client::MonitorClient;
use crate::discovery::{find_or_start, StartOptions};
use crate::types::node::NodeConfig;
use clap::Args;

/// add サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// RPC address of the node (host:port)
    #[arg(long)]
    pub address: String,

    /// Project the node belongs to
    #[arg(long)]
    pub project: String,

    /// Environment the node belongs to
    #[arg(long)]
    pub environment: String,

    /// Command that restarts the node
    #[arg(long)]
    pub revive_cmd: Option<String>,

    /// Arguments passed to the revive command
    #[arg(long, num_args = 1.., allow_hyphen_values = true, requires = "revive_cmd")]
    pub revive_args: Vec<String>,

    /// Monitor port (discovered or started when omitted)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Database URL for a newly started monitor
    #[arg(long)]
    pub database_url: Option<String>,
}

impl AddArgs {
    /// 引数からノード設定を組み立てる
    pub fn node_config(&self) -> NodeConfig {
        let config = NodeConfig::new(&self.address, &self.project, &self.environment);
        match &self.revive_cmd {
            Some(cmd) => config.with_revive(cmd, self.revive_args.clone()),
            None => config,
        }
    }
}

/// add コマンドを実行
pub async fn execute(args: &AddArgs) -> Result<(), anyhow::Error> {
    let config = args.node_config();
    config.validate()?;

    let port = match args.port {
        Some(port) => port,
        None => {
            let mut options = StartOptions::current_exe()?;
            if let Some(url) = &args.database_url {
                options.extra_args = vec!["--database-url".to_string(), url.clone()];
            }
            let located = find_or_start(&options).await?;
            if let Some(pid) = located.spawned_pid {
                println!("Started monitor on port {} (PID: {})", located.port, pid);
            }
            located.port
        }
    };

    MonitorClient::new(port)?.add_nodes(vec![config]).await?;
    println!("Registered {} with monitor on port {}", args.address, port);
    Ok(())
}
