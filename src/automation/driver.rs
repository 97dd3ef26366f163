//! The seam between the step pipeline and the concrete browser.
//!
//! The sequencer and resolver only ever talk to a [`Driver`]; the production
//! implementation is a headless Chrome [`crate::automation::session::Session`],
//! and tests substitute a scripted fake.

use std::time::Duration;

use thiserror::Error;

/// Error raised by a driver operation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no element matches selector `{0}`")]
    NotFound(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("interaction failed: {0}")]
    Interaction(String),
    #[error("browser session is closed")]
    SessionClosed,
}

/// A handle to one located page element.
pub trait ElementHandle {
    /// Click the element.
    fn click(&self) -> Result<(), DriverError>;

    /// Clear any existing value, then type `text` into the element.
    fn clear_and_type(&self, text: &str) -> Result<(), DriverError>;

    /// Inner text of the first descendant matching `selector`, if any.
    fn text_of(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Whether the element is visible and enabled, i.e. can receive a click.
    fn is_interactable(&self) -> Result<bool, DriverError>;
}

/// A live browser page the pipeline can drive.
pub trait Driver {
    /// Navigate to `url` and wait for the load to commit.
    fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// URL the page currently shows.
    fn current_url(&self) -> Result<String, DriverError>;

    /// Find the first element matching a CSS selector. Fails fast when
    /// nothing matches; bounded waiting lives in the resolver.
    fn query(&self, selector: &str) -> Result<Box<dyn ElementHandle + '_>, DriverError>;

    /// Find every element matching a CSS selector, in document order.
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle + '_>>, DriverError>;

    /// Wait for client-side rendering to settle, up to `bound`. Polls a
    /// readiness predicate rather than sleeping blind; never fails, and
    /// returns early once the page reports ready.
    fn settle(&self, bound: Duration);

    /// Release the underlying browser. Idempotent.
    fn close(&mut self);
}
