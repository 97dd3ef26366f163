//! Browser automation pipeline: drives the Aternos web console through a
//! headless Chrome instance to start a configured server.
//!
//! The run itself is synchronous and blocking (network round-trips plus
//! bounded settle waits summing to tens of seconds), so [`submit`] moves it
//! onto tokio's blocking pool and the chat event loop only ever pays for the
//! enqueue.

pub mod driver;
pub mod locator;
pub mod report;
pub mod sequencer;
pub mod session;

use std::fmt;
use std::sync::Arc;

use tokio::task;

use crate::config::{Config, SiteConfig};
use driver::Driver;
use sequencer::{Sequencer, Timing};
use session::{Capabilities, Session};

pub use report::AutomationResult;

/// Aternos account credentials, supplied per run and never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Submit one automation run and resolve to its outcome.
///
/// Callable from the cooperative event loop without blocking it. There is no
/// cancellation: once submitted, a run either completes or the process
/// terminates. Overlapping submissions are not mutually excluded — each gets
/// its own independent browser session and they run concurrently.
pub async fn submit(config: Arc<Config>) -> AutomationResult {
    let handle = task::spawn_blocking(move || {
        let credentials = Credentials {
            username: config.panel_username.clone(),
            password: config.panel_password.clone(),
        };
        run_blocking(&config.site, &credentials, &config.server_name)
    });
    match handle.await {
        Ok(result) => result,
        Err(err) => {
            eprintln!("[automation] worker failed: {err}");
            AutomationResult::failure("An unexpected error occurred during automation")
        }
    }
}

/// The whole blocking run: open a session, execute the step sequence, close
/// the session, report. Never returns an error.
fn run_blocking(site: &SiteConfig, credentials: &Credentials, target: &str) -> AutomationResult {
    let session = match Session::open(&Capabilities::default()) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("[automation] session open failed: {err:#}");
            return AutomationResult::failure(format!("Failed to start browser: {err}"));
        }
    };
    run_pipeline(session, site, &Timing::default(), credentials, target)
}

/// Run the sequencer over an already-open driver and guarantee its release.
///
/// The driver is closed on every path out of here, whichever step failed.
pub fn run_pipeline<D: Driver>(
    mut driver: D,
    site: &SiteConfig,
    timing: &Timing,
    credentials: &Credentials,
    target: &str,
) -> AutomationResult {
    let terminal = Sequencer::new(&driver, site, timing).run(credentials, target);
    driver.close();
    report::report(terminal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("user@example.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
