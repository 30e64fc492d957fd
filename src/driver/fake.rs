//! In-memory driver modelling the IPAT pages for tests.
//!
//! Elements are registered per locator. Clicking can re-render an element
//! (the old reference goes stale and a fresh copy takes its place) or hide
//! it, which is how the portal's page transitions and dialogs behave.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Driver, DriverError, ElementId, Launcher, Locator};
use crate::config::AutoBetConfig;
use crate::ipat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnClick {
    Nothing,
    /// Page transition: the clicked reference goes stale
    Rerender,
    /// Dialog closes: the element stays attached but hidden
    Hide,
}

#[derive(Debug, Clone)]
struct FakeElement {
    locator: Locator,
    displayed: bool,
    enabled: bool,
    options: Vec<String>,
    selected: Option<String>,
    value: String,
    stale: bool,
    on_click: OnClick,
    children: HashMap<Locator, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub action: &'static str,
    pub locator: Option<Locator>,
    pub arg: String,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    elements: HashMap<u64, FakeElement>,
    by_locator: HashMap<Locator, Vec<u64>>,
    failing: HashMap<Locator, String>,
    stale_selects: HashMap<Locator, u32>,
    rerender_on_display: HashMap<Locator, u32>,
    fail_find_all: bool,
    never_ready: bool,
    fail_quit: bool,
    ready: bool,
    quits: u32,
    calls: Vec<Call>,
}

impl FakeState {
    fn insert(&mut self, locator: Locator, options: Vec<String>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.elements.insert(
            id,
            FakeElement {
                locator,
                displayed: true,
                enabled: true,
                options,
                selected: None,
                value: String::new(),
                stale: false,
                on_click: OnClick::Nothing,
                children: HashMap::new(),
            },
        );
        id
    }

    fn live(&self, element: ElementId) -> Result<&FakeElement, DriverError> {
        match self.elements.get(&element.0) {
            Some(e) if !e.stale => Ok(e),
            _ => Err(DriverError::StaleElement(element.to_string())),
        }
    }

    fn live_mut(&mut self, element: ElementId) -> Result<&mut FakeElement, DriverError> {
        match self.elements.get_mut(&element.0) {
            Some(e) if !e.stale => Ok(e),
            _ => Err(DriverError::StaleElement(element.to_string())),
        }
    }

    /// Replace the element with a fresh copy; the old reference goes stale
    fn rerender(&mut self, id: u64) {
        let Some(old) = self.elements.get_mut(&id) else {
            return;
        };
        old.stale = true;
        let mut fresh = old.clone();
        fresh.stale = false;

        self.next_id += 1;
        let new_id = self.next_id;
        let locator = fresh.locator.clone();
        self.elements.insert(new_id, fresh);
        if let Some(ids) = self.by_locator.get_mut(&locator) {
            for slot in ids.iter_mut().filter(|slot| **slot == id) {
                *slot = new_id;
            }
        }
    }

    fn interact(&mut self, element: ElementId, action: &'static str, arg: &str) -> Result<Locator, DriverError> {
        let locator = self.live(element)?.locator.clone();
        if let Some(message) = self.failing.get(&locator) {
            return Err(DriverError::Command(message.clone()));
        }
        self.calls.push(Call {
            action,
            locator: Some(locator.clone()),
            arg: arg.to_string(),
        });
        Ok(locator)
    }

    fn ids(&self, locator: &Locator) -> Vec<u64> {
        self.by_locator
            .get(locator)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.elements.get(id).is_some_and(|e| !e.stale))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Cloning shares the same page, so a test can keep a handle for assertions
#[derive(Clone, Default)]
pub(crate) struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every page of the purchase flow, already reachable
    pub fn ipat() -> Self {
        let driver = Self::new();

        for locator in [
            ipat::INET_ID_INPUT,
            ipat::LOGIN_LINK,
            ipat::USER_NUMBER_INPUT,
            ipat::PASSWORD_INPUT,
            ipat::P_ARS_INPUT,
            ipat::VOTE_MENU_LINK,
            ipat::STANDARD_VOTE_BUTTON,
            ipat::FINAL_RACE_BUTTON,
            ipat::BET_TYPE_SELECT,
            ipat::UNIT_INPUT,
            ipat::SET_BUTTON,
            ipat::VOTE_LIST_BUTTON,
            ipat::TOTAL_AMOUNT_INPUT,
            ipat::PURCHASE_BUTTON,
            ipat::CONFIRM_OK_BUTTON,
            ipat::HOME_LINK,
        ] {
            driver.add(locator);
        }

        driver.set_options(ipat::BET_TYPE_SELECT, &["単勝", "複勝", "枠連", "馬連", "ワイド"]);
        driver.add_select(ipat::VENUE_SELECT, &["東京（土）", "阪神（土）", "中京（土）"]);
        let races: Vec<String> = (1..=12).map(|n| format!("{}R", n)).collect();
        let races: Vec<&str> = races.iter().map(String::as_str).collect();
        driver.add_select(ipat::RACE_SELECT, &races);

        for horse in 1..=18 {
            let label = driver.add(ipat::horse_label(horse));
            driver.add_child(label, ipat::HORSE_CHECKBOX);
        }

        driver.on_click(ipat::VOTE_MENU_LINK, OnClick::Rerender);
        driver.on_click(ipat::STANDARD_VOTE_BUTTON, OnClick::Rerender);
        driver.on_click(ipat::CONFIRM_OK_BUTTON, OnClick::Hide);

        driver
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add(&self, locator: Locator) -> ElementId {
        let mut state = self.state();
        let id = state.insert(locator.clone(), Vec::new());
        state.by_locator.entry(locator).or_default().push(id);
        ElementId(id)
    }

    pub fn add_select(&self, locator: Locator, options: &[&str]) -> ElementId {
        let id = self.add(locator.clone());
        self.set_options(locator, options);
        id
    }

    pub fn add_child(&self, parent: ElementId, locator: Locator) -> ElementId {
        let mut state = self.state();
        let id = state.insert(locator.clone(), Vec::new());
        if let Some(parent) = state.elements.get_mut(&parent.0) {
            parent.children.insert(locator, id);
        }
        ElementId(id)
    }

    pub fn set_options(&self, locator: Locator, options: &[&str]) {
        let mut state = self.state();
        for id in state.ids(&locator) {
            if let Some(e) = state.elements.get_mut(&id) {
                e.options = options.iter().map(|o| o.to_string()).collect();
            }
        }
    }

    pub fn on_click(&self, locator: Locator, on_click: OnClick) {
        let mut state = self.state();
        for id in state.ids(&locator) {
            if let Some(e) = state.elements.get_mut(&id) {
                e.on_click = on_click;
            }
        }
    }

    pub fn hide(&self, locator: Locator) {
        let mut state = self.state();
        for id in state.ids(&locator) {
            if let Some(e) = state.elements.get_mut(&id) {
                e.displayed = false;
            }
        }
    }

    pub fn remove(&self, locator: Locator) {
        let mut state = self.state();
        for id in state.ids(&locator) {
            if let Some(e) = state.elements.get_mut(&id) {
                e.stale = true;
            }
        }
        state.by_locator.remove(&locator);
    }

    /// Any interaction with elements at `locator` fails with `message`
    pub fn fail(&self, locator: Locator, message: &str) {
        self.state().failing.insert(locator, message.to_string());
    }

    /// The next `times` selections at `locator` hit a stale reference
    pub fn stale_selects(&self, locator: Locator, times: u32) {
        self.state().stale_selects.insert(locator, times);
    }

    /// The next `times` visibility checks at `locator` re-render the element
    pub fn rerender_on_display(&self, locator: Locator, times: u32) {
        self.state().rerender_on_display.insert(locator, times);
    }

    pub fn fail_find_all(&self) {
        self.state().fail_find_all = true;
    }

    pub fn never_ready(&self) {
        self.state().never_ready = true;
    }

    pub fn fail_quit(&self) {
        self.state().fail_quit = true;
    }

    pub fn quits(&self) -> u32 {
        self.state().quits
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Texts typed into elements at `locator`, in order
    pub fn typed(&self, locator: &Locator) -> Vec<String> {
        self.calls_for("send_keys", locator)
    }

    /// Options chosen in selects at `locator`, in order
    pub fn selections(&self, locator: &Locator) -> Vec<String> {
        self.calls_for("select", locator)
    }

    pub fn clicks(&self, locator: &Locator) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c.action, "click" | "js_click"))
            .filter(|c| c.locator.as_ref() == Some(locator))
            .count()
    }

    fn calls_for(&self, action: &str, locator: &Locator) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.action == action && c.locator.as_ref() == Some(locator))
            .map(|c| c.arg.clone())
            .collect()
    }

    fn do_click(&self, element: ElementId, action: &'static str, check_visible: bool) -> Result<(), DriverError> {
        let mut state = self.state();
        let target = state.live(element)?;
        if check_visible && !target.displayed {
            return Err(DriverError::Command(format!(
                "element not interactable: {}",
                target.locator
            )));
        }
        state.interact(element, action, "")?;

        let on_click = state.live(element)?.on_click;
        match on_click {
            OnClick::Nothing => {}
            OnClick::Rerender => state.rerender(element.0),
            OnClick::Hide => state.live_mut(element)?.displayed = false,
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(Call {
            action: "navigate",
            locator: None,
            arg: url.to_string(),
        });
        state.ready = !state.never_ready;
        Ok(())
    }

    async fn ready_state(&self) -> Result<String, DriverError> {
        let ready = self.state().ready;
        Ok(if ready { "complete" } else { "loading" }.to_string())
    }

    async fn find(&self, locator: &Locator) -> Result<ElementId, DriverError> {
        self.state()
            .ids(locator)
            .first()
            .map(|id| ElementId(*id))
            .ok_or_else(|| DriverError::NoSuchElement(locator.to_string()))
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementId>, DriverError> {
        let state = self.state();
        if state.fail_find_all {
            return Err(DriverError::Command("find_all failed".to_string()));
        }
        Ok(state.ids(locator).into_iter().map(ElementId).collect())
    }

    async fn find_child(&self, parent: ElementId, locator: &Locator) -> Result<ElementId, DriverError> {
        let state = self.state();
        state
            .live(parent)?
            .children
            .get(locator)
            .map(|id| ElementId(*id))
            .ok_or_else(|| DriverError::NoSuchElement(locator.to_string()))
    }

    async fn is_displayed(&self, element: ElementId) -> Result<bool, DriverError> {
        let mut state = self.state();
        let locator = state.live(element)?.locator.clone();
        if let Some(remaining) = state.rerender_on_display.get_mut(&locator) {
            if *remaining > 0 {
                *remaining -= 1;
                state.rerender(element.0);
                return Err(DriverError::StaleElement(element.to_string()));
            }
        }
        Ok(state.live(element)?.displayed)
    }

    async fn is_enabled(&self, element: ElementId) -> Result<bool, DriverError> {
        Ok(self.state().live(element)?.enabled)
    }

    async fn is_stale(&self, element: ElementId) -> Result<bool, DriverError> {
        Ok(self.state().live(element).is_err())
    }

    async fn click(&self, element: ElementId) -> Result<(), DriverError> {
        self.do_click(element, "click", true)
    }

    async fn js_click(&self, element: ElementId) -> Result<(), DriverError> {
        self.do_click(element, "js_click", false)
    }

    async fn clear(&self, element: ElementId) -> Result<(), DriverError> {
        let mut state = self.state();
        state.interact(element, "clear", "")?;
        state.live_mut(element)?.value.clear();
        Ok(())
    }

    async fn send_keys(&self, element: ElementId, text: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        state.interact(element, "send_keys", text)?;
        state.live_mut(element)?.value.push_str(text);
        Ok(())
    }

    async fn select_options(&self, element: ElementId) -> Result<Vec<String>, DriverError> {
        Ok(self.state().live(element)?.options.clone())
    }

    async fn select_by_visible_text(&self, element: ElementId, text: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        let locator = state.live(element)?.locator.clone();
        if let Some(remaining) = state.stale_selects.get_mut(&locator) {
            if *remaining > 0 {
                *remaining -= 1;
                state.rerender(element.0);
                return Err(DriverError::StaleElement(element.to_string()));
            }
        }
        if !state.live(element)?.options.iter().any(|o| o == text) {
            return Err(DriverError::NoSuchElement(format!("option {}", text)));
        }
        state.interact(element, "select", text)?;
        state.live_mut(element)?.selected = Some(text.to_string());
        Ok(())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.quits += 1;
        state.calls.push(Call {
            action: "quit",
            locator: None,
            arg: String::new(),
        });
        if state.fail_quit {
            return Err(DriverError::Command("quit failed".to_string()));
        }
        Ok(())
    }
}

/// Hands out clones of one [`FakeDriver`] and counts launches
#[derive(Clone)]
pub(crate) struct FakeLauncher {
    driver: FakeDriver,
    launches: Arc<AtomicU32>,
    fail: bool,
}

impl FakeLauncher {
    pub fn new(driver: FakeDriver) -> Self {
        Self {
            driver,
            launches: Arc::new(AtomicU32::new(0)),
            fail: false,
        }
    }

    pub fn failing(driver: FakeDriver) -> Self {
        Self {
            fail: true,
            ..Self::new(driver)
        }
    }

    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    type Driver = FakeDriver;

    async fn launch(&self, _config: &AutoBetConfig) -> Result<FakeDriver, DriverError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DriverError::Launch("chrome not found".to_string()));
        }
        Ok(self.driver.clone())
    }
}
