//! Process configuration, sourced from environment variables.
//!
//! Everything is read and validated once at startup; the resulting [`Config`]
//! is immutable and passed explicitly to the components that need it. A
//! missing required variable is fatal before anything else runs.

use std::fmt;

use thiserror::Error;

/// Default main page. Navigation starts here.
const DEFAULT_BASE_URL: &str = "https://aternos.org/:it/";
/// Default logout endpoint, hit at the end of every run.
const DEFAULT_LOGOUT_URL: &str = "https://aternos.org/go/logout/";

/// Configuration error, reported at startup only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set in environment variables")]
    MissingVar(&'static str),
    #[error("KEEPALIVE_PORT is not a valid port: {0}")]
    InvalidPort(String),
}

/// The Aternos web console endpoints consumed by the automation run.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: String,
    pub logout_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            logout_url: DEFAULT_LOGOUT_URL.to_string(),
        }
    }
}

/// Immutable process configuration.
#[derive(Clone)]
pub struct Config {
    /// Discord bot token. Required.
    pub discord_token: String,
    /// Aternos account username/email. Required.
    pub panel_username: String,
    /// Aternos account password. Required.
    pub panel_password: String,
    /// Name of the server to start. Required.
    pub server_name: String,
    /// Role a caller must hold to use the start command.
    pub allowed_role: String,
    /// Chat command prefix.
    pub command_prefix: String,
    /// Port for the keep-alive HTTP endpoint.
    pub keepalive_port: u16,
    /// Aternos endpoints.
    pub site: SiteConfig,
}

// Secrets stay out of Debug output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("panel_username", &self.panel_username)
            .field("panel_password", &"<redacted>")
            .field("server_name", &self.server_name)
            .field("allowed_role", &self.allowed_role)
            .field("command_prefix", &self.command_prefix)
            .field("keepalive_port", &self.keepalive_port)
            .field("site", &self.site)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| get(key).ok_or(ConfigError::MissingVar(key));

        let keepalive_port = match get("KEEPALIVE_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8080,
        };

        let mut site = SiteConfig::default();
        if let Some(url) = get("ATERNOS_BASE_URL") {
            site.base_url = url;
        }
        if let Some(url) = get("ATERNOS_LOGOUT_URL") {
            site.logout_url = url;
        }

        Ok(Self {
            discord_token: required("DISCORD_TOKEN")?,
            panel_username: required("ATERNOS_USERNAME")?,
            panel_password: required("ATERNOS_PASSWORD")?,
            server_name: required("SERVER_NAME")?,
            allowed_role: get("ALLOWED_ROLE").unwrap_or_else(|| "Admin".to_string()),
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string()),
            keepalive_port,
            site,
        })
    }
}
