//! Discord bot that starts an Aternos Minecraft server by driving the
//! Aternos web console through a headless Chrome instance.
//!
//! Aternos exposes no public API, so the core of this crate is a browser
//! automation pipeline: a multi-candidate locator resolver, a per-run
//! browser session with guaranteed teardown, and the step sequencer that
//! logs in, finds the configured server, and triggers its start. The chat
//! surface, configuration, and keep-alive endpoint are thin glue around it.

pub mod automation;
pub mod config;
pub mod discord;
pub mod keepalive;

// Re-export the types callers touch most.
pub use automation::{submit, AutomationResult, Credentials};
pub use config::Config;
