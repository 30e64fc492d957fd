//! Configuration for the auto-bet workflow.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AutoBetError, Result};
use crate::ipat::IPAT_URL;
use crate::retry::RetryPolicy;

/// Wait and retry timings used by every browser stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Upper bound for any single wait
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Delay between two polls of a wait condition
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long an element must stay addressable to count as stable
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
    /// Total attempts for ticket type selection when the element goes stale
    #[serde(default = "default_stale_retry_attempts")]
    pub stale_retry_attempts: u32,
    #[serde(default = "default_stale_retry_interval_ms")]
    pub stale_retry_interval_ms: u64,
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_settle_interval_ms() -> u64 {
    500
}

fn default_stale_retry_attempts() -> u32 {
    3
}

fn default_stale_retry_interval_ms() -> u64 {
    1_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_interval_ms: default_settle_interval_ms(),
            stale_retry_attempts: default_stale_retry_attempts(),
            stale_retry_interval_ms: default_stale_retry_interval_ms(),
        }
    }
}

impl TimingConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Retry policy for stale ticket type selection
    pub fn stale_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.stale_retry_attempts,
            interval: Duration::from_millis(self.stale_retry_interval_ms),
        }
    }
}

/// Auto-bet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoBetConfig {
    /// IPAT top page
    #[serde(default = "default_ipat_url")]
    pub ipat_url: String,
    /// Chrome executable; `None` lets chromiumoxide find an installed Chrome
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Upper bound for the total of one purchase, in yen
    #[serde(default = "default_max_bet")]
    pub max_bet: u32,
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_ipat_url() -> String {
    IPAT_URL.to_string()
}

fn default_headless() -> bool {
    true
}

fn default_max_bet() -> u32 {
    10_000
}

impl Default for AutoBetConfig {
    fn default() -> Self {
        Self {
            ipat_url: default_ipat_url(),
            chrome_path: None,
            headless: default_headless(),
            max_bet: default_max_bet(),
            timing: TimingConfig::default(),
        }
    }
}

impl AutoBetConfig {
    /// Load configuration from defaults, `keiba_auto_bet.toml` and the
    /// environment (`KEIBA_AUTO_BET__MAX_BET`, `KEIBA_AUTO_BET__TIMING__WAIT_TIMEOUT_MS`, ...)
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AutoBetConfig::default())?)
            .add_source(config::File::with_name("keiba_auto_bet").required(false))
            .add_source(
                config::Environment::with_prefix("KEIBA_AUTO_BET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants a workflow relies on.
    pub fn validate(&self) -> Result<()> {
        if self.max_bet < 100 {
            return Err(AutoBetError::validation(format!(
                "max bet must be at least 100 yen: {}",
                self.max_bet
            )));
        }
        if self.ipat_url.trim().is_empty() {
            return Err(AutoBetError::validation("IPAT URL must not be empty"));
        }
        if self.timing.wait_timeout_ms == 0 || self.timing.poll_interval_ms == 0 {
            return Err(AutoBetError::validation(
                "wait timeout and poll interval must be greater than 0",
            ));
        }
        if self.timing.stale_retry_attempts == 0 {
            return Err(AutoBetError::validation(
                "stale retry attempts must be greater than 0",
            ));
        }
        Ok(())
    }
}
