//! Bounded waits over a [`Driver`].
//!
//! Every wait polls its condition until it holds or the timeout elapses.
//! Missing and stale elements count as "not yet" while polling; any other
//! driver failure ends the wait immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::{Driver, DriverError, ElementId, Locator};
use crate::config::TimingConfig;

/// Condition poller bound to one driver
pub struct Wait<'a, D: ?Sized> {
    driver: &'a D,
    timeout: Duration,
    poll: Duration,
    settle: Duration,
}

impl<'a, D: Driver + ?Sized> Wait<'a, D> {
    pub fn new(driver: &'a D, timing: &TimingConfig) -> Self {
        Self {
            driver,
            timeout: timing.wait_timeout(),
            poll: timing.poll_interval(),
            settle: timing.settle_interval(),
        }
    }

    async fn poll_until<T, F, Fut>(&self, what: impl Display, mut probe: F) -> Result<T, DriverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, DriverError>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            match probe().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    what: what.to_string(),
                    timeout: self.timeout,
                });
            }
            sleep(self.poll).await;
        }
    }

    /// `document.readyState == "complete"`
    pub async fn until_ready(&self) -> Result<(), DriverError> {
        let driver = self.driver;
        self.poll_until("document ready", || async move {
            let state = driver.ready_state().await?;
            Ok::<_, DriverError>((state == "complete").then_some(()))
        })
        .await
    }

    /// Element is in the DOM
    pub async fn until_present(&self, locator: &Locator) -> Result<ElementId, DriverError> {
        let driver = self.driver;
        self.poll_until(format!("presence of {}", locator), || async move {
            driver.find(locator).await.map(Some)
        })
        .await
    }

    /// Element is in the DOM, displayed and enabled
    pub async fn until_clickable(&self, locator: &Locator) -> Result<ElementId, DriverError> {
        let driver = self.driver;
        self.poll_until(format!("{} to be clickable", locator), || async move {
            let element = driver.find(locator).await?;
            let clickable =
                driver.is_displayed(element).await? && driver.is_enabled(element).await?;
            Ok::<_, DriverError>(clickable.then_some(element))
        })
        .await
    }

    /// Element was detached from the document, typically by a page transition
    pub async fn until_stale(&self, element: ElementId) -> Result<(), DriverError> {
        let driver = self.driver;
        self.poll_until(format!("staleness of {}", element), || async move {
            let stale = driver.is_stale(element).await?;
            Ok::<_, DriverError>(stale.then_some(()))
        })
        .await
    }

    /// No displayed element matches `locator`
    pub async fn until_invisible(&self, locator: &Locator) -> Result<(), DriverError> {
        let driver = self.driver;
        self.poll_until(format!("invisibility of {}", locator), || async move {
            let element = match driver.find(locator).await {
                Ok(element) => element,
                Err(DriverError::NoSuchElement(_)) => return Ok(Some(())),
                Err(e) => return Err(e),
            };
            match driver.is_displayed(element).await {
                Ok(displayed) => Ok((!displayed).then_some(())),
                Err(DriverError::StaleElement(_)) => Ok(Some(())),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// The `<select>` at `locator` offers an option whose text contains `needle`
    pub async fn until_option(&self, locator: &Locator, needle: &str) -> Result<ElementId, DriverError> {
        let driver = self.driver;
        self.poll_until(
            format!("option containing '{}' in {}", needle, locator),
            || async move {
                let select = driver.find(locator).await?;
                let options = driver.select_options(select).await?;
                Ok::<_, DriverError>(options.iter().any(|o| o.contains(needle)).then_some(select))
            },
        )
        .await
    }

    /// Element is found and still addressable after the settle interval.
    ///
    /// Used after a change that makes Angular re-render the form: a reference
    /// obtained mid-render goes stale, in which case the locate and settle
    /// cycle starts over until the timeout.
    pub async fn until_stable(&self, locator: &Locator) -> Result<ElementId, DriverError> {
        let driver = self.driver;
        let settle = self.settle;
        self.poll_until(format!("{} to become stable", locator), || async move {
            let element = driver.find(locator).await?;
            driver.is_displayed(element).await?;
            sleep(settle).await;
            driver.is_displayed(element).await?;
            Ok::<_, DriverError>(Some(element))
        })
        .await
    }
}
