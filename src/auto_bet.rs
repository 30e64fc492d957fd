//! Public entry point for automated purchases.

use tracing::{error, info};

use crate::config::AutoBetConfig;
use crate::driver::{ChromeLauncher, Launcher};
use crate::error::{AutoBetError, Result};
use crate::ipat::workflow;
use crate::models::{BetOrder, IpatCredentials};

/// Check an order list against the purchase limit and return its total in yen.
pub fn validate_orders(orders: &[BetOrder], max_bet: u32) -> Result<u64> {
    if orders.is_empty() {
        return Err(AutoBetError::validation("order list is empty"));
    }

    let total: u64 = orders.iter().map(|o| u64::from(o.amount())).sum();
    if total > u64::from(max_bet) {
        return Err(AutoBetError::validation(format!(
            "total amount {} yen exceeds max bet {} yen",
            total, max_bet
        )));
    }

    Ok(total)
}

/// Purchases tickets on IPAT with one set of credentials.
///
/// Every call to [`AutoBetter::bet`] runs on its own browser session.
pub struct AutoBetter<L = ChromeLauncher> {
    credentials: IpatCredentials,
    config: AutoBetConfig,
    launcher: L,
}

impl AutoBetter<ChromeLauncher> {
    pub fn new(credentials: IpatCredentials, config: Option<AutoBetConfig>) -> Self {
        Self::with_launcher(credentials, config.unwrap_or_default(), ChromeLauncher)
    }

    /// Credentials from the `IPAT_*` environment variables
    pub fn from_env(config: Option<AutoBetConfig>) -> Result<Self> {
        Ok(Self::new(IpatCredentials::from_env()?, config))
    }
}

impl<L: Launcher> AutoBetter<L> {
    pub fn with_launcher(credentials: IpatCredentials, config: AutoBetConfig, launcher: L) -> Self {
        Self {
            credentials,
            config,
            launcher,
        }
    }

    pub fn config(&self) -> &AutoBetConfig {
        &self.config
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Purchase `orders` in one transaction.
    ///
    /// Orders are validated before any browser is started. Returns `Ok(true)`
    /// once the purchase was confirmed and the portal is back on its top page;
    /// every failure is an error, there is no partial success.
    pub async fn bet(&self, orders: &[BetOrder]) -> Result<bool> {
        self.config.validate()?;
        let total = validate_orders(orders, self.config.max_bet)?;
        info!("Starting purchase: {} orders, {} yen", orders.len(), total);

        match workflow::execute(&self.launcher, &self.config, &self.credentials, orders, total).await {
            Ok(()) => {
                info!("Purchase completed: {} yen", total);
                Ok(true)
            }
            Err(e) => {
                error!("Purchase failed ({}): {}", e.kind(), e);
                Err(e)
            }
        }
    }
}

/// Purchase `orders` with default settings where none are given.
///
/// Credentials fall back to the `IPAT_*` environment variables; they are
/// resolved before the orders are checked, so missing credentials fail
/// without touching the browser as well.
pub async fn auto_bet(
    orders: &[BetOrder],
    credentials: Option<IpatCredentials>,
    config: Option<AutoBetConfig>,
) -> Result<bool> {
    let credentials = match credentials {
        Some(credentials) => credentials,
        None => IpatCredentials::from_env()?,
    };
    AutoBetter::new(credentials, config).bet(orders).await
}
