//! Order and credential types for IPAT purchases.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{AutoBetError, Result};

/// Highest race number held at a venue on one day
pub const MAX_RACE_NUMBER: u8 = 12;

/// Betting unit in yen; amounts are entered on the portal as multiples of it
pub const BET_UNIT: u32 = 100;

/// Ticket kind (券種). Only WIN and SHOW can be purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum TicketType {
    /// 単勝
    Win,
    /// 複勝
    Show,
}

impl TicketType {
    /// Visible text of the ticket kind in the portal's dropdown
    pub fn label(&self) -> &'static str {
        match self {
            TicketType::Win => "単勝",
            TicketType::Show => "複勝",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Other JRA ticket kinds, recognised only to report them as unsupported
const UNSUPPORTED_TICKETS: [(&str, &str); 6] = [
    ("bracket_quinella", "枠連"),
    ("quinella", "馬連"),
    ("exacta", "馬単"),
    ("wide", "ワイド"),
    ("trio", "3連複"),
    ("trifecta", "3連単"),
];

impl FromStr for TicketType {
    type Err = AutoBetError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "win" | "単勝" => return Ok(TicketType::Win),
            "show" | "place" | "複勝" => return Ok(TicketType::Show),
            _ => {}
        }

        let unsupported = UNSUPPORTED_TICKETS
            .iter()
            .find(|(name, label)| s.eq_ignore_ascii_case(name) || s == *label);
        match unsupported {
            Some((_, label)) => Err(AutoBetError::validation(format!(
                "unsupported ticket type: {}",
                label
            ))),
            None => Err(AutoBetError::validation(format!(
                "unknown ticket type: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TicketType {
    type Error = AutoBetError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// One purchase order (購入注文)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawBetOrder")]
pub struct BetOrder {
    venue: String,
    race_number: u8,
    ticket_type: TicketType,
    horse_number: u8,
    amount: u32,
}

impl BetOrder {
    /// Build a validated order.
    ///
    /// # Errors
    /// `AutoBetError::Validation` when the race number is outside 1-12, the
    /// horse number is 0, or the amount is below 100 yen or not a multiple of
    /// 100 yen.
    pub fn new(
        venue: impl Into<String>,
        race_number: u8,
        ticket_type: TicketType,
        horse_number: u8,
        amount: u32,
    ) -> Result<Self> {
        let venue = venue.into();

        if venue.trim().is_empty() {
            return Err(AutoBetError::validation("venue must not be empty"));
        }
        if !(1..=MAX_RACE_NUMBER).contains(&race_number) {
            return Err(AutoBetError::validation(format!(
                "race number must be between 1 and {}: {}",
                MAX_RACE_NUMBER, race_number
            )));
        }
        if horse_number < 1 {
            return Err(AutoBetError::validation(format!(
                "horse number must be 1 or greater: {}",
                horse_number
            )));
        }
        if amount < BET_UNIT {
            return Err(AutoBetError::validation(format!(
                "amount must be at least {} yen: {}",
                BET_UNIT, amount
            )));
        }
        if amount % BET_UNIT != 0 {
            return Err(AutoBetError::validation(format!(
                "amount must be a multiple of {} yen: {}",
                BET_UNIT, amount
            )));
        }

        Ok(Self {
            venue,
            race_number,
            ticket_type,
            horse_number,
            amount,
        })
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn race_number(&self) -> u8 {
        self.race_number
    }

    pub fn ticket_type(&self) -> TicketType {
        self.ticket_type
    }

    pub fn horse_number(&self) -> u8 {
        self.horse_number
    }

    /// Amount in yen
    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// Amount in 100-yen units, as typed into the unit field
    pub fn units(&self) -> u32 {
        self.amount / BET_UNIT
    }
}

impl fmt::Display for BetOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}R {} #{} {}円",
            self.venue, self.race_number, self.ticket_type, self.horse_number, self.amount
        )
    }
}

#[derive(Deserialize)]
struct RawBetOrder {
    venue: String,
    race_number: u8,
    ticket_type: TicketType,
    horse_number: u8,
    amount: u32,
}

impl TryFrom<RawBetOrder> for BetOrder {
    type Error = AutoBetError;

    fn try_from(raw: RawBetOrder) -> Result<Self> {
        BetOrder::new(
            raw.venue,
            raw.race_number,
            raw.ticket_type,
            raw.horse_number,
            raw.amount,
        )
    }
}

/// IPAT login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct IpatCredentials {
    inet_id: String,
    user_number: String,
    password: String,
    p_ars: String,
}

impl IpatCredentials {
    /// Build credentials; every field is required.
    pub fn new(
        inet_id: impl Into<String>,
        user_number: impl Into<String>,
        password: impl Into<String>,
        p_ars: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Self {
            inet_id: inet_id.into(),
            user_number: user_number.into(),
            password: password.into(),
            p_ars: p_ars.into(),
        };

        let required = [
            (&credentials.inet_id, "INET ID"),
            (&credentials.user_number, "subscriber number"),
            (&credentials.password, "password"),
            (&credentials.p_ars, "P-ARS number"),
        ];
        for (value, name) in required {
            if value.is_empty() {
                return Err(AutoBetError::validation(format!("{} is required", name)));
            }
        }

        Ok(credentials)
    }

    /// Load credentials from `IPAT_INET_ID`, `IPAT_USER_NUMBER`,
    /// `IPAT_PASSWORD` and `IPAT_P_ARS`.
    ///
    /// A `.env` file in the working directory or one of its parents is loaded
    /// first; variables already set in the environment take precedence.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_environment(config::Environment::with_prefix("IPAT"))
    }

    /// Load credentials from the environment, filling missing variables from
    /// the env file at `path`. The process environment is left untouched.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        let unreadable = |e: dotenvy::Error| {
            AutoBetError::validation(format!("failed to read {}: {}", path.display(), e))
        };

        let mut vars: HashMap<String, String> = std::env::vars().collect();
        for entry in dotenvy::from_path_iter(path).map_err(unreadable)? {
            let (key, value) = entry.map_err(unreadable)?;
            vars.entry(key).or_insert(value);
        }
        debug!("Loaded environment from {}", path.display());

        Self::from_environment(config::Environment::with_prefix("IPAT").source(Some(vars)))
    }

    pub(crate) fn from_environment(source: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| {
                AutoBetError::validation(format!("failed to read credentials from environment: {}", e))
            })?;

        let get = |key: &str| settings.get_string(key).unwrap_or_default();

        Self::new(
            get("inet_id"),
            get("user_number"),
            get("password"),
            get("p_ars"),
        )
        .map_err(|e| {
            AutoBetError::validation(format!(
                "could not load credentials from environment, check IPAT_* variables: {}",
                e
            ))
        })
    }

    pub fn inet_id(&self) -> &str {
        &self.inet_id
    }

    pub fn user_number(&self) -> &str {
        &self.user_number
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn p_ars(&self) -> &str {
        &self.p_ars
    }
}

impl fmt::Debug for IpatCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpatCredentials")
            .field("inet_id", &self.inet_id)
            .field("user_number", &self.user_number)
            .field("password", &"***")
            .field("p_ars", &"***")
            .finish()
    }
}
