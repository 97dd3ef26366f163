//! Multi-candidate element resolution.
//!
//! The Aternos console markup is unversioned and has used several class and
//! attribute conventions over time, so no single locator is trusted. Each UI
//! target carries an ordered candidate list; the resolver tries candidates in
//! order, waiting a bounded time for each, and the first one that responds
//! wins. Failure of one candidate is control data, not an error — only
//! exhaustion of the whole list is.

use std::time::{Duration, Instant};

use super::driver::{Driver, ElementHandle};

/// How often a candidate is re-checked while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// An abstract way of selecting a page element.
///
/// Candidate lists order these by presumed stability: stable attributes
/// before semantic classes before brittle IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Raw CSS selector.
    Css(&'static str),
    /// Element class name.
    Class(&'static str),
    /// Element id.
    Id(&'static str),
    /// Form control `name` attribute.
    Name(&'static str),
}

impl Locator {
    /// The CSS selector this locator resolves through.
    pub fn selector(&self) -> String {
        match self {
            Locator::Css(css) => (*css).to_string(),
            Locator::Class(class) => format!(".{class}"),
            Locator::Id(id) => format!("#{id}"),
            Locator::Name(name) => format!("[name=\"{name}\"]"),
        }
    }
}

// ── Candidate lists ─────────────────────────────────────────────────────────

/// Login link/button on the landing page.
pub const LOGIN_TRIGGER: &[Locator] = &[
    Locator::Css("a[href*=\"go/login\"]"),
    Locator::Class("login-button"),
    Locator::Id("login"),
];

/// Username input on the login form.
pub const USERNAME_FIELD: &[Locator] = &[Locator::Name("user"), Locator::Id("user")];

/// Password input on the login form.
pub const PASSWORD_FIELD: &[Locator] = &[Locator::Name("password"), Locator::Id("password")];

/// One entry in the account's server listing.
pub const SERVER_ENTRY: &[Locator] = &[Locator::Class("server-body"), Locator::Class("server-card")];

/// The name label inside a server entry.
pub const SERVER_NAME_LABEL: &[Locator] =
    &[Locator::Class("server-name"), Locator::Class("servername")];

/// Start button on a server's console page.
pub const START_TRIGGER: &[Locator] = &[
    Locator::Id("start"),
    Locator::Class("start-button"),
    Locator::Css("button[data-action=\"start\"]"),
];

// ── Resolution ──────────────────────────────────────────────────────────────

/// What a resolved element must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Attached to the document, visible, and enabled.
    Clickable,
    /// Merely attached to the document.
    Present,
}

/// Try each candidate in list order, waiting up to `timeout` per candidate
/// for an element satisfying `mode`. Returns the first hit, or `None` once
/// every candidate is exhausted.
pub fn resolve<'a, D: Driver + ?Sized>(
    driver: &'a D,
    candidates: &[Locator],
    mode: WaitMode,
    timeout: Duration,
) -> Option<Box<dyn ElementHandle + 'a>> {
    for candidate in candidates {
        let selector = candidate.selector();
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = driver.query(&selector) {
                let satisfied = match mode {
                    WaitMode::Present => true,
                    WaitMode::Clickable => element.is_interactable().unwrap_or(false),
                };
                if satisfied {
                    return Some(element);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
    None
}

/// Resolve a collection: the first candidate whose selector matches at least
/// one element yields the whole match list. No per-candidate wait — callers
/// settle the page first.
pub fn resolve_all<'a, D: Driver + ?Sized>(
    driver: &'a D,
    candidates: &[Locator],
) -> Vec<Box<dyn ElementHandle + 'a>> {
    for candidate in candidates {
        if let Ok(elements) = driver.query_all(&candidate.selector()) {
            if !elements.is_empty() {
                return elements;
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::driver::DriverError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct StubElement {
        interactable: bool,
    }

    impl ElementHandle for StubElement {
        fn click(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn clear_and_type(&self, _text: &str) -> Result<(), DriverError> {
            Ok(())
        }
        fn text_of(&self, _selector: &str) -> Result<Option<String>, DriverError> {
            Ok(None)
        }
        fn is_interactable(&self) -> Result<bool, DriverError> {
            Ok(self.interactable)
        }
    }

    /// Driver whose page holds a fixed set of selectors, recording every
    /// query it receives.
    struct StubDriver {
        elements: HashMap<String, bool>,
        queries: RefCell<Vec<String>>,
    }

    impl StubDriver {
        fn with_elements(entries: &[(&str, bool)]) -> Self {
            Self {
                elements: entries
                    .iter()
                    .map(|(sel, inter)| (sel.to_string(), *inter))
                    .collect(),
                queries: RefCell::new(Vec::new()),
            }
        }
    }

    impl Driver for StubDriver {
        fn goto(&self, _url: &str) -> Result<(), DriverError> {
            Ok(())
        }
        fn current_url(&self) -> Result<String, DriverError> {
            Ok(String::new())
        }
        fn query(&self, selector: &str) -> Result<Box<dyn ElementHandle + '_>, DriverError> {
            self.queries.borrow_mut().push(selector.to_string());
            match self.elements.get(selector) {
                Some(interactable) => Ok(Box::new(StubElement {
                    interactable: *interactable,
                })),
                None => Err(DriverError::NotFound(selector.to_string())),
            }
        }
        fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle + '_>>, DriverError> {
            self.queries.borrow_mut().push(selector.to_string());
            match self.elements.get(selector) {
                Some(interactable) => Ok(vec![Box::new(StubElement {
                    interactable: *interactable,
                })]),
                None => Ok(Vec::new()),
            }
        }
        fn settle(&self, _bound: Duration) {}
        fn close(&mut self) {}
    }

    const FAST: Duration = Duration::from_millis(5);

    #[test]
    fn selector_mapping() {
        assert_eq!(Locator::Css("a[href]").selector(), "a[href]");
        assert_eq!(Locator::Class("login-button").selector(), ".login-button");
        assert_eq!(Locator::Id("start").selector(), "#start");
        assert_eq!(Locator::Name("user").selector(), "[name=\"user\"]");
    }

    #[test]
    fn first_satisfiable_candidate_wins() {
        let driver = StubDriver::with_elements(&[(".login-button", true), ("#login", true)]);
        let found = resolve(&driver, LOGIN_TRIGGER, WaitMode::Clickable, FAST);
        assert!(found.is_some());
        // The preferred attribute selector was tried and failed, the class
        // selector matched, the id candidate was never attempted.
        let queries = driver.queries.borrow();
        assert!(queries.contains(&"a[href*=\"go/login\"]".to_string()));
        assert!(queries.contains(&".login-button".to_string()));
        assert!(!queries.contains(&"#login".to_string()));
    }

    #[test]
    fn exhaustion_returns_none() {
        let driver = StubDriver::with_elements(&[]);
        assert!(resolve(&driver, LOGIN_TRIGGER, WaitMode::Clickable, FAST).is_none());
        // Every candidate was attempted at least once.
        assert!(driver.queries.borrow().len() >= LOGIN_TRIGGER.len());
    }

    #[test]
    fn clickable_mode_rejects_non_interactable() {
        let driver = StubDriver::with_elements(&[("#start", false)]);
        assert!(resolve(&driver, &[Locator::Id("start")], WaitMode::Clickable, FAST).is_none());
    }

    #[test]
    fn present_mode_accepts_non_interactable() {
        let driver = StubDriver::with_elements(&[("[name=\"user\"]", false)]);
        assert!(resolve(&driver, USERNAME_FIELD, WaitMode::Present, FAST).is_some());
    }

    #[test]
    fn resolve_all_falls_back_to_next_candidate() {
        let driver = StubDriver::with_elements(&[(".server-card", true)]);
        let entries = resolve_all(&driver, SERVER_ENTRY);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn resolve_all_empty_on_exhaustion() {
        let driver = StubDriver::with_elements(&[]);
        assert!(resolve_all(&driver, SERVER_ENTRY).is_empty());
    }
}
