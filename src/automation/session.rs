//! One headless Chrome instance, owned for the lifetime of a single run.
//!
//! A `Session` is never shared across runs or concurrent commands. Whoever
//! opens one is responsible for closing it on every exit path; `close` is
//! idempotent and `Drop` acts as a backstop only.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use headless_chrome::{Browser, Element, LaunchOptionsBuilder, Tab};
use serde_json::json;

use super::driver::{Driver, DriverError, ElementHandle};

/// Chrome flags for constrained hosting environments.
const CHROME_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-software-rasterizer",
    "--disable-extensions",
];

/// Poll interval for the settle readiness check.
const SETTLE_POLL: Duration = Duration::from_millis(250);

/// Fixed launch capabilities, chosen to run headless in constrained hosts
/// and to look like an ordinary desktop client.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub window_size: (u32, u32),
    pub user_agent: String,
    pub page_load_timeout: Duration,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            window_size: (1280, 720),
            user_agent:
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            page_load_timeout: Duration::from_secs(30),
        }
    }
}

/// Exclusive ownership scope of one headless browser.
pub struct Session {
    // Dropped by `close`; `None` means the session is closed.
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl Session {
    /// Launch Chrome and open the tab the run will drive.
    pub fn open(capabilities: &Capabilities) -> Result<Self> {
        eprintln!("[automation] setting up headless Chrome");
        let options = LaunchOptionsBuilder::default()
            .headless(true)
            .sandbox(false)
            .window_size(Some(capabilities.window_size))
            .args(CHROME_ARGS.iter().map(OsStr::new).collect())
            .idle_browser_timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build launch options: {e}"))?;

        let browser = Browser::new(options).context("failed to launch headless Chrome")?;
        let tab = browser.new_tab().context("failed to open browser tab")?;
        tab.set_default_timeout(capabilities.page_load_timeout);
        tab.set_user_agent(&capabilities.user_agent, None, None)
            .context("failed to set user agent")?;

        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
        })
    }

    fn tab(&self) -> Result<&Arc<Tab>, DriverError> {
        self.tab.as_ref().ok_or(DriverError::SessionClosed)
    }
}

impl Driver for Session {
    fn goto(&self, url: &str) -> Result<(), DriverError> {
        let tab = self.tab()?;
        tab.navigate_to(url)
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        tab.wait_until_navigated()
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.tab()?.get_url())
    }

    fn query(&self, selector: &str) -> Result<Box<dyn ElementHandle + '_>, DriverError> {
        let element = self
            .tab()?
            .find_element(selector)
            .map_err(|_| DriverError::NotFound(selector.to_string()))?;
        Ok(Box::new(SessionElement { element }))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle + '_>>, DriverError> {
        let elements = self
            .tab()?
            .find_elements(selector)
            .map_err(|_| DriverError::NotFound(selector.to_string()))?;
        let mut handles: Vec<Box<dyn ElementHandle + '_>> = Vec::with_capacity(elements.len());
        for element in elements {
            handles.push(Box::new(SessionElement { element }));
        }
        Ok(handles)
    }

    fn settle(&self, bound: Duration) {
        let Ok(tab) = self.tab() else { return };
        let deadline = Instant::now() + bound;
        loop {
            let ready = tab
                .evaluate("document.readyState === \"complete\"", false)
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if ready {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(SETTLE_POLL.min(deadline - now));
        }
    }

    fn close(&mut self) {
        self.tab = None;
        if self.browser.take().is_some() {
            eprintln!("[automation] browser closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// A located element inside a live session's tab.
struct SessionElement<'a> {
    element: Element<'a>,
}

impl ElementHandle for SessionElement<'_> {
    fn click(&self) -> Result<(), DriverError> {
        self.element
            .click()
            .map(|_| ())
            .map_err(|e| DriverError::Interaction(e.to_string()))
    }

    fn clear_and_type(&self, text: &str) -> Result<(), DriverError> {
        self.element
            .call_js_fn(
                "function () { if ('value' in this) { this.value = ''; } }",
                vec![],
                false,
            )
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        self.element
            .type_into(text)
            .map(|_| ())
            .map_err(|e| DriverError::Interaction(e.to_string()))
    }

    fn text_of(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let value = self
            .element
            .call_js_fn(
                "function (sel) { const n = this.querySelector(sel); return n ? n.innerText : null; }",
                vec![json!(selector)],
                false,
            )
            .map_err(|e| DriverError::Interaction(e.to_string()))?
            .value;
        Ok(value.and_then(|v| v.as_str().map(String::from)))
    }

    fn is_interactable(&self) -> Result<bool, DriverError> {
        let value = self
            .element
            .call_js_fn(
                r#"function () {
                    if (this.disabled) { return false; }
                    const style = window.getComputedStyle(this);
                    if (style.display === 'none' || style.visibility === 'hidden') { return false; }
                    const rect = this.getBoundingClientRect();
                    return rect.width > 0 && rect.height > 0;
                }"#,
                vec![],
                false,
            )
            .map_err(|e| DriverError::Interaction(e.to_string()))?
            .value;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }
}
