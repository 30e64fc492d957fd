//! Purchase workflow on the IPAT single-page app.
//!
//! The purchase runs as a fixed sequence of stages on one browser session:
//! login, optional announcement page, navigation to the ticket entry page,
//! one race selection and ticket entry per order, purchase confirmation and
//! return to the top page. Any stage failure aborts the rest; the session is
//! closed on every path by [`execute`].

use tracing::{debug, info};

use super::{
    horse_label, race_label, ANNOUNCE_HEADING, ANNOUNCE_OK_BUTTON, BET_TYPE_SELECT,
    CONFIRM_OK_BUTTON, FINAL_RACE_BUTTON, HOME_LINK, HORSE_CHECKBOX, INET_ID_INPUT, LOGIN_LINK,
    PASSWORD_INPUT, PURCHASE_BUTTON, P_ARS_INPUT, RACE_SELECT, SET_BUTTON, STANDARD_VOTE_BUTTON,
    TOTAL_AMOUNT_INPUT, UNIT_INPUT, USER_NUMBER_INPUT, VENUE_SELECT, VOTE_LIST_BUTTON,
    VOTE_MENU_LINK,
};
use crate::config::{AutoBetConfig, TimingConfig};
use crate::driver::{Driver, DriverError, Launcher, Wait};
use crate::error::{AutoBetError, Result};
use crate::models::{BetOrder, IpatCredentials, TicketType};
use crate::retry::retry_if;

/// Run the whole purchase on a fresh session from `launcher`.
///
/// The session is released exactly once whenever it was opened, whatever
/// the outcome; errors while releasing it are ignored.
pub async fn execute<L: Launcher>(
    launcher: &L,
    config: &AutoBetConfig,
    credentials: &IpatCredentials,
    orders: &[BetOrder],
    total_amount: u64,
) -> Result<()> {
    let driver = open_session(launcher, config).await?;

    let outcome = PurchaseWorkflow::new(&driver, &config.timing)
        .run(credentials, orders, total_amount)
        .await;

    close_session(&driver).await;
    outcome
}

async fn open_session<L: Launcher>(launcher: &L, config: &AutoBetConfig) -> Result<L::Driver> {
    info!("Launching Chrome (headless: {})", config.headless);
    let driver = launcher
        .launch(config)
        .await
        .map_err(|e| AutoBetError::browser("failed to launch Chrome", e))?;

    if let Err(e) = load_start_page(&driver, config).await {
        close_session(&driver).await;
        return Err(AutoBetError::browser(
            format!("failed to open {}", config.ipat_url),
            e,
        ));
    }

    info!("Opened {}", config.ipat_url);
    Ok(driver)
}

async fn load_start_page<D: Driver>(driver: &D, config: &AutoBetConfig) -> Result<(), DriverError> {
    driver.navigate(&config.ipat_url).await?;
    Wait::new(driver, &config.timing).until_ready().await
}

async fn close_session<D: Driver>(driver: &D) {
    match driver.quit().await {
        Ok(()) => debug!("Browser closed"),
        Err(e) => debug!("Ignoring error while closing browser: {}", e),
    }
}

/// Stages of the purchase, bound to an open session
pub struct PurchaseWorkflow<'a, D: Driver + ?Sized> {
    driver: &'a D,
    timing: &'a TimingConfig,
}

impl<'a, D: Driver + ?Sized> PurchaseWorkflow<'a, D> {
    pub fn new(driver: &'a D, timing: &'a TimingConfig) -> Self {
        Self { driver, timing }
    }

    fn wait(&self) -> Wait<'a, D> {
        Wait::new(self.driver, self.timing)
    }

    /// Every stage after session start, in order
    pub async fn run(
        &self,
        credentials: &IpatCredentials,
        orders: &[BetOrder],
        total_amount: u64,
    ) -> Result<()> {
        self.login(credentials).await?;
        self.dismiss_announcement().await?;
        self.place_orders(orders).await?;
        self.confirm_purchase(total_amount).await?;
        self.navigate_to_top().await?;
        Ok(())
    }

    /// Log in and move to the voting menu.
    pub async fn login(&self, credentials: &IpatCredentials) -> Result<()> {
        self.try_login(credentials)
            .await
            .map_err(|e| AutoBetError::login("login failed", e))?;
        info!("Logged in");
        Ok(())
    }

    async fn try_login(&self, credentials: &IpatCredentials) -> Result<(), DriverError> {
        let wait = self.wait();

        let inet_id = wait.until_present(&INET_ID_INPUT).await?;
        self.driver.send_keys(inet_id, credentials.inet_id()).await?;

        let login_link = wait.until_clickable(&LOGIN_LINK).await?;
        self.driver.click(login_link).await?;

        let user_number = wait.until_present(&USER_NUMBER_INPUT).await?;
        self.driver.send_keys(user_number, credentials.user_number()).await?;
        let password = self.driver.find(&PASSWORD_INPUT).await?;
        self.driver.send_keys(password, credentials.password()).await?;
        let p_ars = self.driver.find(&P_ARS_INPUT).await?;
        self.driver.send_keys(p_ars, credentials.p_ars()).await?;

        let menu_link = wait.until_clickable(&VOTE_MENU_LINK).await?;
        self.driver.click(menu_link).await?;
        wait.until_stale(menu_link).await
    }

    /// Close the announcement page shown after login on some days.
    ///
    /// Does nothing when the page is not shown.
    pub async fn dismiss_announcement(&self) -> Result<()> {
        let headings = self.driver.find_all(&ANNOUNCE_HEADING).await?;
        if headings.is_empty() {
            debug!("No announcement page, skipping");
            return Ok(());
        }

        info!("Announcement page detected, closing it");
        self.try_dismiss_announcement()
            .await
            .map_err(|e| AutoBetError::browser("failed to close announcement page", e))?;
        info!("Announcement page closed");
        Ok(())
    }

    async fn try_dismiss_announcement(&self) -> Result<(), DriverError> {
        let wait = self.wait();
        let ok_button = wait.until_clickable(&ANNOUNCE_OK_BUTTON).await?;
        self.driver.click(ok_button).await?;
        wait.until_stale(ok_button).await
    }

    /// Move from the voting menu to the ticket entry page.
    pub async fn navigate_to_bet_page(&self) -> Result<()> {
        self.try_navigate_to_bet_page()
            .await
            .map_err(|e| AutoBetError::bet("failed to open ticket entry page", e))?;
        info!("Opened ticket entry page");
        Ok(())
    }

    async fn try_navigate_to_bet_page(&self) -> Result<(), DriverError> {
        let wait = self.wait();

        let vote_button = wait.until_clickable(&STANDARD_VOTE_BUTTON).await?;
        self.driver.click(vote_button).await?;
        wait.until_stale(vote_button).await?;
        debug!("Standard voting page opened");

        let race_button = wait.until_clickable(&FINAL_RACE_BUTTON).await?;
        self.driver.click(race_button).await?;
        wait.until_clickable(&BET_TYPE_SELECT).await?;
        Ok(())
    }

    /// Select venue and race on the ticket entry page.
    ///
    /// Both dropdowns match by substring, first match wins.
    pub async fn select_race(&self, venue: &str, race_number: u8) -> Result<()> {
        let wait = self.wait();
        let failed = |e: DriverError| AutoBetError::bet("race selection failed", e);

        let venue_select = wait.until_clickable(&VENUE_SELECT).await.map_err(failed)?;
        let venues = self.driver.select_options(venue_select).await.map_err(failed)?;
        let venue_option = venues
            .iter()
            .find(|o| o.contains(venue))
            .ok_or_else(|| AutoBetError::bet_msg(format!("venue not found: {}", venue)))?;
        self.driver
            .select_by_visible_text(venue_select, venue_option)
            .await
            .map_err(failed)?;

        // The race dropdown is refilled after the venue changes
        let label = race_label(race_number);
        let race_select = wait
            .until_option(&RACE_SELECT, &label)
            .await
            .map_err(|e| match e {
                DriverError::Timeout { .. } => {
                    AutoBetError::bet(format!("race not found: {} at {}", label, venue), e)
                }
                e => failed(e),
            })?;
        let races = self.driver.select_options(race_select).await.map_err(failed)?;
        let race_option = races
            .iter()
            .find(|o| o.contains(&label))
            .ok_or_else(|| AutoBetError::bet_msg(format!("race not found: {} at {}", label, venue)))?;
        self.driver
            .select_by_visible_text(race_select, race_option)
            .await
            .map_err(failed)?;

        wait.until_stable(&BET_TYPE_SELECT).await.map_err(failed)?;
        debug!("Selected {} {}", venue_option, race_option);
        Ok(())
    }

    /// Enter one WIN or SHOW line item and commit it with the set button.
    pub async fn bet_win_or_show(&self, order: &BetOrder) -> Result<()> {
        self.try_bet_win_or_show(order).await.map_err(|e| {
            AutoBetError::bet(
                format!(
                    "ticket entry failed ({} horse {}, {} yen)",
                    order.ticket_type(),
                    order.horse_number(),
                    order.amount()
                ),
                e,
            )
        })
    }

    async fn try_bet_win_or_show(&self, order: &BetOrder) -> Result<(), DriverError> {
        let wait = self.wait();

        self.select_ticket_type(order.ticket_type()).await?;

        let label = wait.until_present(&horse_label(order.horse_number())).await?;
        let checkbox = self.driver.find_child(label, &HORSE_CHECKBOX).await?;
        self.driver.js_click(checkbox).await?;

        let unit_input = wait.until_clickable(&UNIT_INPUT).await?;
        self.driver.clear(unit_input).await?;
        self.driver
            .send_keys(unit_input, &order.units().to_string())
            .await?;

        let set_button = wait.until_clickable(&SET_BUTTON).await?;
        self.driver.click(set_button).await?;

        // The form resets once the line item is accepted
        wait.until_clickable(&BET_TYPE_SELECT).await?;
        Ok(())
    }

    /// The ticket type dropdown is re-rendered after race selection, so a
    /// stale reference is retried with a fresh lookup.
    async fn select_ticket_type(&self, ticket_type: TicketType) -> Result<(), DriverError> {
        let this = self;
        retry_if(
            &self.timing.stale_retry(),
            "ticket type selection",
            DriverError::is_stale,
            move || async move {
                let select = this.wait().until_clickable(&BET_TYPE_SELECT).await?;
                this.driver
                    .select_by_visible_text(select, ticket_type.label())
                    .await
            },
        )
        .await
    }

    /// Enter every order, in the given order.
    pub async fn place_orders(&self, orders: &[BetOrder]) -> Result<()> {
        self.navigate_to_bet_page().await?;

        for (i, order) in orders.iter().enumerate() {
            info!("Entering order {}/{}: {}", i + 1, orders.len(), order);
            self.select_race(order.venue(), order.race_number()).await?;

            match order.ticket_type() {
                TicketType::Win | TicketType::Show => self.bet_win_or_show(order).await?,
            }
        }
        Ok(())
    }

    /// Submit the pending line items for `total_amount` yen.
    pub async fn confirm_purchase(&self, total_amount: u64) -> Result<()> {
        self.try_confirm_purchase(total_amount)
            .await
            .map_err(|e| AutoBetError::purchase("purchase confirmation failed", e))?;
        info!("Purchase confirmed ({} yen)", total_amount);
        Ok(())
    }

    async fn try_confirm_purchase(&self, total_amount: u64) -> Result<(), DriverError> {
        let wait = self.wait();

        let list_button = wait.until_clickable(&VOTE_LIST_BUTTON).await?;
        self.driver.click(list_button).await?;

        let total_input = wait.until_clickable(&TOTAL_AMOUNT_INPUT).await?;
        self.driver.clear(total_input).await?;
        self.driver
            .send_keys(total_input, &total_amount.to_string())
            .await?;

        let purchase_button = wait.until_clickable(&PURCHASE_BUTTON).await?;
        self.driver.click(purchase_button).await?;

        // The dialog body can overlap the OK button
        let ok_button = wait.until_clickable(&CONFIRM_OK_BUTTON).await?;
        self.driver.js_click(ok_button).await?;

        // The dialog is hidden, not removed
        wait.until_invisible(&CONFIRM_OK_BUTTON).await
    }

    /// Return to the top page and wait until it is usable again.
    pub async fn navigate_to_top(&self) -> Result<()> {
        self.try_navigate_to_top()
            .await
            .map_err(|e| AutoBetError::browser("failed to return to top page", e))?;
        info!("Returned to top page");
        Ok(())
    }

    async fn try_navigate_to_top(&self) -> Result<(), DriverError> {
        let wait = self.wait();
        let home_link = wait.until_clickable(&HOME_LINK).await?;
        self.driver.click(home_link).await?;
        wait.until_clickable(&STANDARD_VOTE_BUTTON).await?;
        Ok(())
    }
}
