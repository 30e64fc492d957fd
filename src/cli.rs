//! CLI commands for keiba-auto-bet.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use keiba_auto_bet::{validate_orders, AutoBetConfig, AutoBetter, BetOrder, IpatCredentials};

#[derive(Parser)]
#[command(name = "keiba-auto-bet")]
#[command(version, about = "Keiba-AI: automated ticket purchase on JRA IPAT", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Purchase the orders in a JSON file
    Bet {
        /// Path to orders JSON file
        #[arg(short, long, value_name = "FILE")]
        orders: PathBuf,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Upper bound for the purchase total in yen
        #[arg(long)]
        max_bet: Option<u32>,

        /// Chrome executable path
        #[arg(long, value_name = "PATH")]
        chrome: Option<PathBuf>,

        /// IPAT URL override
        #[arg(long)]
        url: Option<String>,

        /// Env file with IPAT_* credentials (default: .env lookup)
        #[arg(long, value_name = "FILE")]
        env_file: Option<PathBuf>,
    },

    /// Validate an orders file and print its total without purchasing
    Check {
        /// Path to orders JSON file
        #[arg(short, long, value_name = "FILE")]
        orders: PathBuf,

        /// Upper bound for the purchase total in yen
        #[arg(long)]
        max_bet: Option<u32>,
    },
}

/// Parse a JSON array of orders.
///
/// ```json
/// [{"venue": "東京", "race_number": 11, "ticket_type": "win", "horse_number": 3, "amount": 500}]
/// ```
pub fn parse_orders(json: &str) -> anyhow::Result<Vec<BetOrder>> {
    let orders: Vec<BetOrder> = serde_json::from_str(json).context("invalid orders JSON")?;
    Ok(orders)
}

pub fn load_orders(path: &Path) -> anyhow::Result<Vec<BetOrder>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read orders file: {}", path.display()))?;
    parse_orders(&json)
}

/// Run a purchase from an orders file.
pub async fn run_bet(
    orders: PathBuf,
    headed: bool,
    max_bet: Option<u32>,
    chrome: Option<PathBuf>,
    url: Option<String>,
    env_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = AutoBetConfig::load()?;

    // Override with CLI args
    if headed {
        config.headless = false;
    }
    if let Some(max_bet) = max_bet {
        config.max_bet = max_bet;
    }
    if chrome.is_some() {
        config.chrome_path = chrome;
    }
    if let Some(url) = url {
        config.ipat_url = url;
    }

    let orders = load_orders(&orders)?;
    for order in &orders {
        tracing::info!("Order: {}", order);
    }

    let credentials = match env_file {
        Some(path) => IpatCredentials::from_env_file(&path)?,
        None => IpatCredentials::from_env()?,
    };
    AutoBetter::new(credentials, Some(config)).bet(&orders).await?;

    println!("Purchase completed");
    Ok(())
}

/// Validate an orders file and print a summary.
pub fn run_check(orders: PathBuf, max_bet: Option<u32>) -> anyhow::Result<()> {
    let mut config = AutoBetConfig::load()?;
    if let Some(max_bet) = max_bet {
        config.max_bet = max_bet;
    }
    config.validate()?;

    let orders = load_orders(&orders)?;
    let total = validate_orders(&orders, config.max_bet)?;

    println!("{:<10} {:>4} {:<6} {:>5} {:>8}", "Venue", "Race", "Type", "Horse", "Amount");
    println!("{}", "-".repeat(38));
    for order in &orders {
        println!(
            "{:<10} {:>3}R {:<6} {:>5} {:>8}",
            order.venue(),
            order.race_number(),
            order.ticket_type().label(),
            order.horse_number(),
            order.amount()
        );
    }
    println!("{}", "-".repeat(38));
    println!("Total: {} yen (max {} yen)", total, config.max_bet);

    Ok(())
}
