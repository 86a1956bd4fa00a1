//! double-monitor entry point

use clap::Parser;
use double_monitor::cli::{self, Cli, Commands};
use double_monitor::logging;

#[tokio::main]
async fn main() {
    let parsed = Cli::parse();

    let log_file = match &parsed.command {
        Commands::Serve(args) => args.log_file.clone(),
        _ => None,
    };
    let _log_guard = match logging::init(log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match &parsed.command {
        Commands::Serve(args) => cli::serve::execute(args).await,
        Commands::Status(args) => cli::status::execute(args).await,
        Commands::Add(args) => cli::add::execute(args).await,
        Commands::Locate(args) => cli::locate::execute(args).await,
        Commands::Stop(args) => cli::stop::execute(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
