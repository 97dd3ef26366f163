//! The state machine driving one automation run.
//!
//! Steps run strictly forward: navigate, authenticate, select the target
//! server, trigger the start, log out. Any locator exhaustion, verification
//! failure, or unexpected driver error moves the machine to `Failed` with a
//! reason; `Failed` and `LoggedOut` are the only terminal states.

use std::time::Duration;

use thiserror::Error;

use super::driver::{Driver, DriverError, ElementHandle};
use super::locator::{self, WaitMode};
use super::Credentials;
use crate::config::SiteConfig;

/// Submit button on the login form. Looked up directly, no fallback chain.
const LOGIN_SUBMIT_SELECTOR: &str = "button[type=\"submit\"]";

/// Step timing bounds. The defaults reproduce the waits the console needs in
/// practice; tests shrink them to keep the fake-driver runs fast.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Per-candidate bound in the locator resolver.
    pub resolve: Duration,
    /// Settle bound after plain navigation and after the logout hit.
    pub settle_nav: Duration,
    /// Settle bound after submitting the login form.
    pub settle_auth: Duration,
    /// Settle bound before scanning the server listing and after actions on it.
    pub settle_listing: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            resolve: Duration::from_secs(10),
            settle_nav: Duration::from_secs(2),
            settle_auth: Duration::from_secs(5),
            settle_listing: Duration::from_secs(3),
        }
    }
}

impl Timing {
    /// Near-zero bounds for driving a fake driver in tests.
    pub fn immediate() -> Self {
        Self {
            resolve: Duration::from_millis(1),
            settle_nav: Duration::ZERO,
            settle_auth: Duration::ZERO,
            settle_listing: Duration::ZERO,
        }
    }
}

/// Where the run currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerState {
    Init,
    Navigated,
    Authenticated,
    TargetSelected,
    Started,
    /// Terminal: the start was triggered and the logout navigation completed.
    LoggedOut,
    /// Terminal: the run stopped short, with a reason for reporting.
    Failed { reason: String },
}

/// Why a step failed. Rendered into `SequencerState::Failed`.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Could not find login button")]
    LoginTriggerNotFound,
    #[error("Login failed - check your credentials")]
    AuthenticationFailed,
    #[error("No servers found in account")]
    NoTargetsAvailable,
    #[error("Server '{0}' not found in your account")]
    TargetNotFound(String),
    #[error("Could not find or click start button")]
    StartTriggerNotFound,
    #[error("{0}")]
    Unexpected(String),
}

impl From<DriverError> for StepError {
    fn from(err: DriverError) -> Self {
        StepError::Unexpected(err.to_string())
    }
}

/// Whether a listed server name satisfies the requested target.
///
/// Exact equality or substring containment, checked per entry in document
/// order. A target of "Surv" therefore also matches "Survival Realm", and
/// when two entries both satisfy the predicate the earlier one wins — this
/// order dependence is deliberate, documented behavior.
fn entry_matches(name: &str, target: &str) -> bool {
    name == target || name.contains(target)
}

/// Drives one run over a live driver.
pub struct Sequencer<'a, D: Driver + ?Sized> {
    driver: &'a D,
    site: &'a SiteConfig,
    timing: &'a Timing,
    state: SequencerState,
}

impl<'a, D: Driver + ?Sized> Sequencer<'a, D> {
    pub fn new(driver: &'a D, site: &'a SiteConfig, timing: &'a Timing) -> Self {
        Self {
            driver,
            site,
            timing,
            state: SequencerState::Init,
        }
    }

    /// Run to a terminal state. Consumes the sequencer; states are never
    /// re-entered.
    pub fn run(mut self, credentials: &Credentials, target: &str) -> SequencerState {
        let outcome = self.drive(credentials, target);
        self.state = match outcome {
            Ok(()) => SequencerState::LoggedOut,
            Err(err) => SequencerState::Failed {
                reason: err.to_string(),
            },
        };
        self.state
    }

    fn drive(&mut self, credentials: &Credentials, target: &str) -> Result<(), StepError> {
        self.navigate()?;
        self.authenticate(credentials)?;
        self.select_target(target)?;
        self.trigger_start()?;
        self.logout()
    }

    fn resolve(&self, candidates: &[locator::Locator], mode: WaitMode) -> Option<Box<dyn ElementHandle + 'a>> {
        locator::resolve(self.driver, candidates, mode, self.timing.resolve)
    }

    // Init → Navigated
    fn navigate(&mut self) -> Result<(), StepError> {
        eprintln!("[automation] navigating to {}", self.site.base_url);
        self.driver.goto(&self.site.base_url)?;
        self.driver.settle(self.timing.settle_nav);
        self.state = SequencerState::Navigated;
        Ok(())
    }

    // Navigated → Authenticated
    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), StepError> {
        eprintln!("[automation] looking for login button");
        let login = self
            .resolve(locator::LOGIN_TRIGGER, WaitMode::Clickable)
            .ok_or(StepError::LoginTriggerNotFound)?;
        login.click()?;
        self.driver.settle(self.timing.settle_nav);

        // The two fields resolve independently: a missing username field must
        // not prevent filling the password field, and vice versa.
        eprintln!("[automation] entering credentials");
        if let Some(field) = self.resolve(locator::USERNAME_FIELD, WaitMode::Present) {
            field.clear_and_type(&credentials.username)?;
        }
        if let Some(field) = self.resolve(locator::PASSWORD_FIELD, WaitMode::Present) {
            field.clear_and_type(&credentials.password)?;
        }

        self.driver.query(LOGIN_SUBMIT_SELECTOR)?.click()?;
        self.driver.settle(self.timing.settle_auth);

        // No explicit signal from the console; a URL still pointing at the
        // login flow means the credentials were rejected.
        if self.driver.current_url()?.to_lowercase().contains("login") {
            return Err(StepError::AuthenticationFailed);
        }
        eprintln!("[automation] login successful");
        self.state = SequencerState::Authenticated;
        Ok(())
    }

    // Authenticated → TargetSelected
    fn select_target(&mut self, target: &str) -> Result<(), StepError> {
        eprintln!("[automation] looking for server: {target}");
        self.driver.settle(self.timing.settle_listing);

        let entries = locator::resolve_all(self.driver, locator::SERVER_ENTRY);
        if entries.is_empty() {
            return Err(StepError::NoTargetsAvailable);
        }

        let mut selected = false;
        'entries: for entry in &entries {
            for label in locator::SERVER_NAME_LABEL {
                let Ok(Some(name)) = entry.text_of(&label.selector()) else {
                    continue;
                };
                if entry_matches(name.trim(), target) {
                    eprintln!("[automation] found server: {}", name.trim());
                    entry.click()?;
                    selected = true;
                    break 'entries;
                }
            }
        }
        if !selected {
            return Err(StepError::TargetNotFound(target.to_string()));
        }

        self.driver.settle(self.timing.settle_listing);
        self.state = SequencerState::TargetSelected;
        Ok(())
    }

    // TargetSelected → Started
    fn trigger_start(&mut self) -> Result<(), StepError> {
        eprintln!("[automation] looking for start button");
        let start = self
            .resolve(locator::START_TRIGGER, WaitMode::Clickable)
            .ok_or(StepError::StartTriggerNotFound)?;
        // A start control that resolves but refuses the click reads the same
        // as one that never resolved.
        start.click().map_err(|_| StepError::StartTriggerNotFound)?;
        self.driver.settle(self.timing.settle_listing);
        self.state = SequencerState::Started;
        Ok(())
    }

    // Started → LoggedOut. Always attempted; no verification follows.
    fn logout(&mut self) -> Result<(), StepError> {
        eprintln!("[automation] logging out");
        self.driver.goto(&self.site.logout_url)?;
        self.driver.settle(self.timing.settle_nav);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_matches() {
        assert!(entry_matches("Survival", "Survival"));
    }

    #[test]
    fn substring_containment_matches() {
        assert!(entry_matches("Survival Realm", "Surv"));
    }

    #[test]
    fn unrelated_name_does_not_match() {
        assert!(!entry_matches("Creative", "Survival"));
    }

    #[test]
    fn containment_is_one_directional() {
        // The target must appear in the entry name, not the other way round.
        assert!(!entry_matches("Surv", "Survival"));
    }

    #[test]
    fn default_timing_bounds() {
        let timing = Timing::default();
        assert_eq!(timing.resolve, Duration::from_secs(10));
        assert!(timing.settle_auth > timing.settle_nav);
    }
}
