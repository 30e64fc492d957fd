//! Browser automation using chromiumoxide.
//!
//! Element handles are kept in a registry and handed out as [`ElementId`]s.
//! Element queries run as small scripts on the element itself, so a handle
//! whose node was detached by a re-render reports itself as stale instead of
//! silently acting on a dead node.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Driver, DriverError, ElementId, Launcher, Locator};
use crate::config::AutoBetConfig;

/// Launches a local Chrome through chromiumoxide
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl Launcher for ChromeLauncher {
    type Driver = ChromeDriver;

    async fn launch(&self, config: &AutoBetConfig) -> Result<ChromeDriver, DriverError> {
        ChromeDriver::launch(config).await
    }
}

/// One Chrome instance with a single page
pub struct ChromeDriver {
    browser: Mutex<Option<Browser>>,
    handle: tokio::task::JoinHandle<()>,
    page: Page,
    elements: Mutex<Handles<Element>>,
}

impl ChromeDriver {
    /// Launch a new browser instance with a blank page
    pub async fn launch(config: &AutoBetConfig) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .window_size(1920, 1080);

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder
            .build()
            .map_err(|e| DriverError::Launch(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // Spawn handler task - must keep running for browser to work
        let handle = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => continue, // Don't break on errors
                    None => break,
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut browser = browser;
                let _ = browser.close().await;
                handle.abort();
                return Err(DriverError::Launch(format!("failed to open page: {}", e)));
            }
        };

        debug!("Chrome launched (headless: {})", config.headless);

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handle,
            page,
            elements: Mutex::new(Handles::default()),
        })
    }

    async fn register(&self, element: Element) -> ElementId {
        self.elements.lock().await.insert(element)
    }

    /// Drop a handle whose node is gone; later lookups report it stale
    async fn forget(&self, id: ElementId) {
        let mut elements = self.elements.lock().await;
        elements.remove(id);
        debug!("Dropped stale {} ({} handles live)", id, elements.len());
    }

    async fn element(&self, id: ElementId) -> Result<Arc<Element>, DriverError> {
        self.elements
            .lock()
            .await
            .get(id)
            .ok_or_else(|| DriverError::StaleElement(id.to_string()))
    }

    /// Run `body` as a function on the element and return its JSON value
    async fn run(&self, id: ElementId, body: &str) -> Result<serde_json::Value, DriverError> {
        let element = self.element(id).await?;
        let reply = match element.call_js_fn(element_script(body), false).await {
            Ok(returns) => returns
                .result
                .value
                .as_ref()
                .and_then(|v| v.as_str())
                .ok_or_else(|| DriverError::Command(format!("script on {} returned no value", id)))
                .and_then(|raw| parse_reply(raw, id)),
            Err(e) => Err(element_error(e, id)),
        };

        if matches!(reply, Err(DriverError::StaleElement(_))) {
            self.forget(id).await;
        }
        reply
    }

    async fn run_bool(&self, id: ElementId, body: &str) -> Result<bool, DriverError> {
        Ok(self.run(id, body).await?.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Command(format!("failed to open {}: {}", url, e)))?;
        Ok(())
    }

    async fn ready_state(&self) -> Result<String, DriverError> {
        let state = match self.page.evaluate("document.readyState").await {
            Ok(state) => state,
            // The old document is being replaced
            Err(e) if is_detached(&e.to_string()) => return Ok("loading".to_string()),
            Err(e) => return Err(DriverError::Command(e.to_string())),
        };
        state
            .into_value::<String>()
            .map_err(|e| DriverError::Command(e.to_string()))
    }

    async fn find(&self, locator: &Locator) -> Result<ElementId, DriverError> {
        let found = match locator.to_css() {
            Some(css) => self.page.find_element(css).await,
            None => self.page.find_xpath(locator.value.as_ref()).await,
        };
        match found {
            Ok(element) => Ok(self.register(element).await),
            Err(e) if is_not_found(&e) => Err(DriverError::NoSuchElement(locator.to_string())),
            Err(e) => Err(DriverError::Command(format!("{}: {}", locator, e))),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementId>, DriverError> {
        let found = match locator.to_css() {
            Some(css) => self.page.find_elements(css).await,
            None => self.page.find_xpaths(locator.value.as_ref()).await,
        };
        let elements = match found {
            Ok(elements) => elements,
            Err(e) if is_not_found(&e) => Vec::new(),
            Err(e) => return Err(DriverError::Command(format!("{}: {}", locator, e))),
        };

        let mut ids = Vec::with_capacity(elements.len());
        for element in elements {
            ids.push(self.register(element).await);
        }
        Ok(ids)
    }

    async fn find_child(&self, parent: ElementId, locator: &Locator) -> Result<ElementId, DriverError> {
        let css = locator.to_css().ok_or_else(|| {
            DriverError::Command(format!("child lookup needs a CSS locator: {}", locator))
        })?;
        let element = self.element(parent).await?;
        let child = element.find_element(css).await.map_err(|e| {
            if is_not_found(&e) {
                DriverError::NoSuchElement(format!("{} under {}", locator, parent))
            } else {
                element_error(e, parent)
            }
        })?;
        Ok(self.register(child).await)
    }

    async fn is_displayed(&self, element: ElementId) -> Result<bool, DriverError> {
        self.run_bool(
            element,
            "const s = window.getComputedStyle(this); \
             const r = this.getBoundingClientRect(); \
             return s.visibility !== 'hidden' && s.display !== 'none' && (r.width > 0 || r.height > 0);",
        )
        .await
    }

    async fn is_enabled(&self, element: ElementId) -> Result<bool, DriverError> {
        self.run_bool(element, "return !this.disabled;").await
    }

    async fn is_stale(&self, element: ElementId) -> Result<bool, DriverError> {
        match self.run(element, "return true;").await {
            Ok(_) => Ok(false),
            Err(DriverError::StaleElement(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    async fn click(&self, element: ElementId) -> Result<(), DriverError> {
        // Stale check first: clicking a detached node would hit whatever
        // is now rendered at its old position
        if self.is_stale(element).await? {
            return Err(DriverError::StaleElement(element.to_string()));
        }
        self.element(element)
            .await?
            .click()
            .await
            .map_err(|e| element_error(e, element))?;
        Ok(())
    }

    async fn js_click(&self, element: ElementId) -> Result<(), DriverError> {
        self.run(element, "this.click(); return true;").await?;
        Ok(())
    }

    async fn clear(&self, element: ElementId) -> Result<(), DriverError> {
        self.run(
            element,
            "this.value = ''; \
             this.dispatchEvent(new Event('input', { bubbles: true })); \
             return true;",
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, element: ElementId, text: &str) -> Result<(), DriverError> {
        // Key events go to whatever node has focus
        if !self.run_bool(element, FOCUS_SCRIPT).await? {
            return Err(DriverError::Command(format!("{} cannot take focus", element)));
        }
        self.element(element)
            .await?
            .type_str(text)
            .await
            .map_err(|e| element_error(e, element))?;
        Ok(())
    }

    async fn select_options(&self, element: ElementId) -> Result<Vec<String>, DriverError> {
        let value = self
            .run(
                element,
                "return Array.from(this.options || []).map(o => o.text.trim());",
            )
            .await?;
        serde_json::from_value(value).map_err(|e| DriverError::Command(e.to_string()))
    }

    async fn select_by_visible_text(&self, element: ElementId, text: &str) -> Result<(), DriverError> {
        let selected = self.run_bool(element, &select_script(text)).await?;
        if !selected {
            return Err(DriverError::NoSuchElement(format!(
                "option '{}' in {}",
                text, element
            )));
        }
        Ok(())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.elements.lock().await.clear();
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.handle.abort();
        closed.map_err(|e| DriverError::Command(format!("failed to close browser: {}", e)))?;
        Ok(())
    }
}

/// Element handles by id; ids are never reused within one session
struct Handles<T> {
    next_id: u64,
    live: HashMap<ElementId, Arc<T>>,
}

impl<T> Default for Handles<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            live: HashMap::new(),
        }
    }
}

impl<T> Handles<T> {
    fn insert(&mut self, handle: T) -> ElementId {
        self.next_id += 1;
        let id = ElementId(self.next_id);
        self.live.insert(id, Arc::new(handle));
        id
    }

    fn get(&self, id: ElementId) -> Option<Arc<T>> {
        self.live.get(&id).cloned()
    }

    fn remove(&mut self, id: ElementId) {
        self.live.remove(&id);
    }

    fn clear(&mut self) {
        self.live.clear();
    }

    fn len(&self) -> usize {
        self.live.len()
    }
}

#[derive(Debug, Deserialize)]
struct ScriptReply {
    #[serde(default)]
    stale: bool,
    #[serde(default)]
    value: serde_json::Value,
}

const FOCUS_SCRIPT: &str = "this.focus(); return document.activeElement === this;";

/// Wrap `body` so that a detached element answers `{ stale: true }`
fn element_script(body: &str) -> String {
    format!(
        "function() {{ \
         if (!this.isConnected) {{ return JSON.stringify({{ stale: true }}); }} \
         const value = (() => {{ {} }})(); \
         return JSON.stringify({{ value }}); }}",
        body
    )
}

fn parse_reply(raw: &str, id: ElementId) -> Result<serde_json::Value, DriverError> {
    let reply: ScriptReply = serde_json::from_str(raw)
        .map_err(|e| DriverError::Command(format!("unreadable script reply from {}: {}", id, e)))?;
    if reply.stale {
        return Err(DriverError::StaleElement(id.to_string()));
    }
    Ok(reply.value)
}

/// Select the first option whose trimmed text equals `text` and notify
/// Angular through a `change` event
fn select_script(text: &str) -> String {
    // A JSON string literal is a valid JS string literal
    let literal = serde_json::Value::String(text.to_string()).to_string();
    format!(
        "const target = Array.from(this.options || []).find(o => o.text.trim() === {}); \
         if (!target) {{ return false; }} \
         this.value = target.value; \
         target.selected = true; \
         this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return true;",
        literal
    )
}

// Node or remote object gone, or the whole document replaced by a navigation
const DETACHED_MARKERS: [&str; 6] = [
    "No node with given id",
    "Could not find node with given id",
    "Node with given id does not belong to the document",
    "Could not find object with given id",
    "Cannot find context with specified id",
    "Execution context was destroyed",
];

// DOM.getSearchResults rejects the empty range of a search without matches
const NO_MATCH_MARKERS: [&str; 2] = ["Invalid search result range", "not found"];

fn is_detached(message: &str) -> bool {
    DETACHED_MARKERS.iter().any(|m| message.contains(m))
}

fn is_no_match(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    is_detached(message)
        || NO_MATCH_MARKERS
            .iter()
            .any(|m| lower.contains(&m.to_ascii_lowercase()))
}

fn is_not_found(err: &CdpError) -> bool {
    is_no_match(&err.to_string())
}

fn element_error(err: CdpError, id: ElementId) -> DriverError {
    classify_element_error(&err.to_string(), id)
}

fn classify_element_error(message: &str, id: ElementId) -> DriverError {
    if is_detached(message) {
        DriverError::StaleElement(id.to_string())
    } else {
        DriverError::Command(format!("{}: {}", id, message))
    }
}
