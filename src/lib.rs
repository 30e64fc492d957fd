//! Keiba Auto-Bet
//!
//! Automated WIN/SHOW ticket purchase on JRA IPAT (即PAT) by driving Chrome
//! through the portal's pages.
//!
//! ```no_run
//! use keiba_auto_bet::{auto_bet, BetOrder, TicketType};
//!
//! # async fn run() -> keiba_auto_bet::Result<()> {
//! let orders = vec![BetOrder::new("東京", 11, TicketType::Win, 3, 500)?];
//! auto_bet(&orders, None, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod auto_bet;
pub mod config;
pub mod driver;
pub mod error;
pub mod ipat;
pub mod models;
pub mod retry;

pub use crate::auto_bet::{auto_bet, validate_orders, AutoBetter};
pub use crate::config::{AutoBetConfig, TimingConfig};
pub use crate::error::{AutoBetError, Result};
pub use crate::models::{BetOrder, IpatCredentials, TicketType};
