//! Error types for the purchase workflow.
//!
//! `AutoBetError` is the closed set of failures a caller can see. Every
//! variant except `Validation` can only happen after a browser session was
//! opened; `Unexpected` wraps driver failures that no stage claimed.

use thiserror::Error;

use crate::driver::DriverError;

/// Result alias used throughout the library
pub type Result<T, E = AutoBetError> = std::result::Result<T, E>;

/// Failure surfaced by [`crate::AutoBetter::bet`] and [`crate::auto_bet`]
#[derive(Debug, Error)]
pub enum AutoBetError {
    /// Bad input, always raised before a browser session is opened
    #[error("{0}")]
    Validation(String),

    /// Session start/stop, announcement dismissal or return to the top page
    #[error("{message}")]
    Browser {
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    /// Authentication stage
    #[error("{message}")]
    Login {
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    /// Navigation to the ticket page, race selection or ticket entry
    #[error("{message}")]
    Bet {
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    /// Purchase confirmation stage
    #[error("{message}")]
    Purchase {
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    /// Driver failure outside any stage's own error handling
    #[error("unexpected error: {0}")]
    Unexpected(#[from] DriverError),
}

impl AutoBetError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn browser(message: impl Into<String>, source: DriverError) -> Self {
        Self::Browser {
            message: with_cause(message, &source),
            source: Some(source),
        }
    }

    pub fn login(message: impl Into<String>, source: DriverError) -> Self {
        Self::Login {
            message: with_cause(message, &source),
            source: Some(source),
        }
    }

    pub fn bet(message: impl Into<String>, source: DriverError) -> Self {
        Self::Bet {
            message: with_cause(message, &source),
            source: Some(source),
        }
    }

    /// Bet failure detected by the workflow itself, with no driver cause
    pub fn bet_msg(message: impl Into<String>) -> Self {
        Self::Bet {
            message: message.into(),
            source: None,
        }
    }

    pub fn purchase(message: impl Into<String>, source: DriverError) -> Self {
        Self::Purchase {
            message: with_cause(message, &source),
            source: Some(source),
        }
    }

    /// Short name of the failure kind, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Browser { .. } => "browser",
            Self::Login { .. } => "login",
            Self::Bet { .. } => "bet",
            Self::Purchase { .. } => "purchase",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

// Messages embed the driver cause so a single log line is enough to tell
// which control failed and why.
fn with_cause(message: impl Into<String>, source: &DriverError) -> String {
    format!("{}: {}", message.into(), source)
}
