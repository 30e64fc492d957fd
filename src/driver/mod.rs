//! Browser automation capability.
//!
//! The purchase workflow only talks to [`Driver`]; [`chrome`] implements it
//! on chromiumoxide and the tests use an in-memory fake. Bounded waits built
//! on top of the trait live in [`wait`].

pub mod chrome;
#[cfg(test)]
pub(crate) mod fake;
pub mod wait;

use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::AutoBetConfig;

pub use chrome::{ChromeDriver, ChromeLauncher};
pub use wait::Wait;

/// Locator strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum By {
    Id,
    Name,
    Css,
    XPath,
}

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub by: By,
    pub value: Cow<'static, str>,
}

impl Locator {
    pub const fn id(value: &'static str) -> Self {
        Self {
            by: By::Id,
            value: Cow::Borrowed(value),
        }
    }

    pub const fn name(value: &'static str) -> Self {
        Self {
            by: By::Name,
            value: Cow::Borrowed(value),
        }
    }

    pub const fn css(value: &'static str) -> Self {
        Self {
            by: By::Css,
            value: Cow::Borrowed(value),
        }
    }

    pub const fn xpath(value: &'static str) -> Self {
        Self {
            by: By::XPath,
            value: Cow::Borrowed(value),
        }
    }

    pub fn xpath_owned(value: String) -> Self {
        Self {
            by: By::XPath,
            value: Cow::Owned(value),
        }
    }

    /// CSS selector equivalent, `None` for XPath locators
    pub fn to_css(&self) -> Option<String> {
        match self.by {
            By::Id => Some(format!("[id=\"{}\"]", self.value)),
            By::Name => Some(format!("[name=\"{}\"]", self.value)),
            By::Css => Some(self.value.to_string()),
            By::XPath => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by = match self.by {
            By::Id => "id",
            By::Name => "name",
            By::Css => "css",
            By::XPath => "xpath",
        };
        write!(f, "{}={}", by, self.value)
    }
}

/// Opaque reference to an element found by a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Failure reported by a driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),

    /// The element was detached from the document by a re-render
    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("{0}")]
    Command(String),
}

impl DriverError {
    pub fn is_stale(&self) -> bool {
        matches!(self, DriverError::StaleElement(_))
    }

    /// Failures a wait keeps polling through
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::NoSuchElement(_) | DriverError::StaleElement(_)
        )
    }
}

/// A browser session the workflow can drive.
///
/// Element-level methods fail with [`DriverError::StaleElement`] once the
/// element is no longer attached to the document.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Load `url` in the session's page
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// `document.readyState` of the current page
    async fn ready_state(&self) -> Result<String, DriverError>;

    async fn find(&self, locator: &Locator) -> Result<ElementId, DriverError>;

    /// All matches, empty when nothing matches
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementId>, DriverError>;

    async fn find_child(
        &self,
        parent: ElementId,
        locator: &Locator,
    ) -> Result<ElementId, DriverError>;

    async fn is_displayed(&self, element: ElementId) -> Result<bool, DriverError>;

    async fn is_enabled(&self, element: ElementId) -> Result<bool, DriverError>;

    /// Whether the element was detached from the document
    async fn is_stale(&self, element: ElementId) -> Result<bool, DriverError>;

    /// User-like click
    async fn click(&self, element: ElementId) -> Result<(), DriverError>;

    /// `element.click()` through script, for controls hidden behind overlays
    async fn js_click(&self, element: ElementId) -> Result<(), DriverError>;

    async fn clear(&self, element: ElementId) -> Result<(), DriverError>;

    async fn send_keys(&self, element: ElementId, text: &str) -> Result<(), DriverError>;

    /// Visible texts of a `<select>` element's options
    async fn select_options(&self, element: ElementId) -> Result<Vec<String>, DriverError>;

    async fn select_by_visible_text(
        &self,
        element: ElementId,
        text: &str,
    ) -> Result<(), DriverError>;

    /// Dispose of the session
    async fn quit(&self) -> Result<(), DriverError>;
}

/// Opens browser sessions for a configuration
#[async_trait]
pub trait Launcher: Send + Sync {
    type Driver: Driver;

    async fn launch(&self, config: &AutoBetConfig) -> Result<Self::Driver, DriverError>;
}
