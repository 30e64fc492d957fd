//! Keiba Auto-Bet CLI
//!
//! Purchases WIN/SHOW tickets on JRA IPAT from an orders file.

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_auto_bet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bet {
            orders,
            headed,
            max_bet,
            chrome,
            url,
            env_file,
        } => cli::run_bet(orders, headed, max_bet, chrome, url, env_file).await,
        Commands::Check { orders, max_bet } => cli::run_check(orders, max_bet),
    }
}
