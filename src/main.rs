use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use suhan::{cli, config, server};

#[derive(Parser)]
#[command(name = "suhan", version, about = "Memory-grounded streaming chat server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Check database health and embedding model consistency
    Doctor,
    /// Show per-account activity
    Stats {
        /// Only this account
        #[arg(long)]
        account: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::AppConfig::load()?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Stats { account } => cli::stats::stats(&config, account)?,
    }

    Ok(())
}
