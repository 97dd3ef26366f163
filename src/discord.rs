//! Discord chat surface, using a bot token and the REST API.
//!
//! A poll loop walks the bot's guilds and text channels for new messages and
//! dispatches prefix commands. The start command is handled on its own task
//! so the loop stays responsive while an automation run is in flight;
//! overlapping start commands each get their own independent run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::automation;
use crate::config::Config;

/// Discord API base URL
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Delay between poll sweeps.
const POLL_INTERVAL: Duration = Duration::from_secs(3);

// ── Wire types ──────────────────────────────────────────────────────────────

/// Discord message from API
#[derive(Debug, Clone, Deserialize)]
struct DiscordMessage {
    id: String,
    channel_id: String,
    author: DiscordUser,
    content: String,
    timestamp: String,
}

/// Discord user
#[derive(Debug, Clone, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
}

/// Discord current user (bot)
#[derive(Debug, Deserialize)]
struct DiscordCurrentUser {
    id: String,
    username: String,
}

/// Guild role
#[derive(Debug, Clone, Deserialize)]
pub struct GuildRole {
    pub id: String,
    pub name: String,
}

/// Guild member, as returned by the members endpoint
#[derive(Debug, Deserialize)]
struct GuildMember {
    #[serde(default)]
    roles: Vec<String>,
}

// ── Commands ────────────────────────────────────────────────────────────────

/// A recognized chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartServer,
    Status,
    Help,
}

/// Parse a message into a command. Unknown commands and plain chatter are
/// ignored silently.
pub fn parse_command(content: &str, prefix: &str) -> Option<Command> {
    let rest = content.strip_prefix(prefix)?;
    match rest.split_whitespace().next()? {
        "startserver" => Some(Command::StartServer),
        "status" => Some(Command::Status),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// True when the member holds the configured role, matched by role name.
pub fn role_grants_start(
    member_role_ids: &[String],
    guild_roles: &[GuildRole],
    allowed_role: &str,
) -> bool {
    guild_roles
        .iter()
        .filter(|role| role.name == allowed_role)
        .any(|role| member_role_ids.iter().any(|id| *id == role.id))
}

/// One command occurrence, with everything needed to answer it.
#[derive(Debug, Clone)]
struct Invocation {
    command: Command,
    guild_id: String,
    channel_id: String,
    author_id: String,
}

// ── User-facing text ────────────────────────────────────────────────────────

fn status_text(uptime: Duration, server_name: &str) -> String {
    let hours = uptime.as_secs() / 3600;
    let minutes = (uptime.as_secs() % 3600) / 60;
    format!(
        "\u{1f916} Bot status: online\n\
         \u{23f1}\u{fe0f} Uptime: {hours}h {minutes}m\n\
         \u{1f3af} Server: {server_name}"
    )
}

fn help_text(prefix: &str, allowed_role: &str) -> String {
    format!(
        "\u{1f3ae} **Aternos Server Bot**\n\
         `{prefix}startserver` \u{25b6}\u{fe0f} Starts the Aternos server\n\
         `{prefix}status` \u{1f4ca} Shows bot status\n\
         `{prefix}help` \u{2753} Shows this help message\n\
         Only users with the `{allowed_role}` role can start the server."
    )
}

// ── REST client ─────────────────────────────────────────────────────────────

/// Thin Discord REST client, cheap to clone into spawned handlers.
#[derive(Clone)]
struct Rest {
    http: reqwest::Client,
    bot_token: String,
}

impl Rest {
    fn new(bot_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// Verify the token and return the bot's own user.
    async fn current_user(&self) -> Result<DiscordCurrentUser> {
        let resp = self
            .http
            .get(format!("{DISCORD_API_BASE}/users/@me"))
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Discord auth failed: {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    /// Get all guilds (servers) the bot is in
    async fn get_guilds(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(format!("{DISCORD_API_BASE}/users/@me/guilds"))
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Failed to get guilds: {}", resp.status());
        }
        let guilds: Vec<serde_json::Value> = resp.json().await?;
        Ok(guilds
            .iter()
            .filter_map(|g| g["id"].as_str().map(String::from))
            .collect())
    }

    /// Get text channels for a guild
    async fn get_guild_channels(&self, guild_id: &str) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(format!("{DISCORD_API_BASE}/guilds/{guild_id}/channels"))
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(Vec::new());
        }
        let channels: Vec<serde_json::Value> = resp.json().await?;
        Ok(channels
            .iter()
            .filter(|c| c["type"].as_u64() == Some(0)) // 0 = GUILD_TEXT
            .filter_map(|c| c["id"].as_str().map(String::from))
            .collect())
    }

    /// Get recent messages from a channel
    async fn get_channel_messages(&self, channel_id: &str, limit: u8) -> Result<Vec<DiscordMessage>> {
        let resp = self
            .http
            .get(format!(
                "{DISCORD_API_BASE}/channels/{channel_id}/messages?limit={limit}"
            ))
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(Vec::new());
        }
        Ok(resp.json().await?)
    }

    /// Whether a guild member holds the named role.
    async fn member_has_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_name: &str,
    ) -> Result<bool> {
        let resp = self
            .http
            .get(format!("{DISCORD_API_BASE}/guilds/{guild_id}/roles"))
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Failed to get guild roles: {}", resp.status());
        }
        let roles: Vec<GuildRole> = resp.json().await?;

        let resp = self
            .http
            .get(format!(
                "{DISCORD_API_BASE}/guilds/{guild_id}/members/{user_id}"
            ))
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Failed to get guild member: {}", resp.status());
        }
        let member: GuildMember = resp.json().await?;

        Ok(role_grants_start(&member.roles, &roles, role_name))
    }

    /// Send a message, returning its id.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{DISCORD_API_BASE}/channels/{channel_id}/messages"))
            .header("Authorization", self.auth())
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Discord send failed: {}", resp.status());
        }
        let data: serde_json::Value = resp.json().await?;
        Ok(data["id"].as_str().unwrap_or("unknown").to_string())
    }

    /// Replace the content of a previously sent message.
    async fn edit_message(&self, channel_id: &str, message_id: &str, content: &str) -> Result<()> {
        let resp = self
            .http
            .patch(format!(
                "{DISCORD_API_BASE}/channels/{channel_id}/messages/{message_id}"
            ))
            .header("Authorization", self.auth())
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Discord edit failed: {}", resp.status());
        }
        Ok(())
    }
}

// ── Bot ─────────────────────────────────────────────────────────────────────

/// The Discord bot: token verification, message polling, command dispatch.
pub struct Bot {
    config: Arc<Config>,
    rest: Rest,
    bot_id: String,
    processed_ids: Arc<RwLock<HashSet<String>>>,
    started_at: Instant,
    started_at_utc: chrono::DateTime<chrono::Utc>,
}

impl Bot {
    /// Verify the token and build the bot. Failure here is fatal.
    pub async fn connect(config: Arc<Config>) -> Result<Self> {
        let rest = Rest::new(config.discord_token.clone());
        let user = rest.current_user().await?;
        println!("\u{2705} Bot logged in as {}!", user.username);
        println!("Bot ID: {}", user.id);
        Ok(Self {
            config,
            rest,
            bot_id: user.id,
            processed_ids: Arc::new(RwLock::new(HashSet::new())),
            started_at: Instant::now(),
            started_at_utc: chrono::Utc::now(),
        })
    }

    /// Run the poll loop forever.
    pub async fn run(self) -> Result<()> {
        loop {
            for invocation in self.poll_invocations().await {
                self.dispatch(invocation).await;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn dispatch(&self, invocation: Invocation) {
        match invocation.command {
            Command::StartServer => {
                // Runs on its own task: the automation takes tens of seconds
                // and the poll loop must not wait on it.
                let rest = self.rest.clone();
                let config = self.config.clone();
                tokio::spawn(async move {
                    handle_start(rest, config, invocation).await;
                });
            }
            Command::Status => {
                let text = status_text(self.started_at.elapsed(), &self.config.server_name);
                if let Err(e) = self.rest.send_message(&invocation.channel_id, &text).await {
                    eprintln!("[discord] failed to send status: {e}");
                }
            }
            Command::Help => {
                let text = help_text(&self.config.command_prefix, &self.config.allowed_role);
                if let Err(e) = self.rest.send_message(&invocation.channel_id, &text).await {
                    eprintln!("[discord] failed to send help: {e}");
                }
            }
        }
    }

    /// Sweep guilds and channels for new messages carrying commands.
    async fn poll_invocations(&self) -> Vec<Invocation> {
        let mut invocations = Vec::new();

        let guilds = match self.rest.get_guilds().await {
            Ok(g) => g,
            Err(e) => {
                eprintln!("[discord] failed to get guilds: {e}");
                return invocations;
            }
        };

        // Bounded sweep to stay clear of rate limits.
        for guild_id in guilds.iter().take(5) {
            let channels = match self.rest.get_guild_channels(guild_id).await {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("[discord] failed to get channels for guild {guild_id}: {e}");
                    continue;
                }
            };

            for channel_id in channels.iter().take(3) {
                let messages = match self.rest.get_channel_messages(channel_id, 10).await {
                    Ok(m) => m,
                    Err(e) => {
                        eprintln!("[discord] failed to get messages from channel {channel_id}: {e}");
                        continue;
                    }
                };

                for msg in messages {
                    if msg.author.id == self.bot_id || msg.author.bot {
                        continue;
                    }

                    // Messages sent before startup are history, not commands.
                    let sent_at = chrono::DateTime::parse_from_rfc3339(&msg.timestamp)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .unwrap_or(self.started_at_utc);
                    if sent_at < self.started_at_utc {
                        continue;
                    }

                    {
                        let mut processed = self.processed_ids.write().await;
                        if processed.contains(&msg.id) {
                            continue;
                        }
                        processed.insert(msg.id.clone());

                        // Keep the seen-set bounded.
                        if processed.len() > 1000 {
                            let to_remove: Vec<_> =
                                processed.iter().take(100).cloned().collect();
                            for id in to_remove {
                                processed.remove(&id);
                            }
                        }
                    }

                    let Some(command) = parse_command(&msg.content, &self.config.command_prefix)
                    else {
                        continue;
                    };

                    eprintln!(
                        "[discord] {:?} from {} in channel {}",
                        command, msg.author.username, msg.channel_id
                    );
                    invocations.push(Invocation {
                        command,
                        guild_id: guild_id.clone(),
                        channel_id: msg.channel_id,
                        author_id: msg.author.id,
                    });
                }
            }
        }

        invocations
    }
}

/// Handle one start command: role gate, acknowledgment, run, outcome edit.
///
/// The acknowledgment is sent before the run is submitted, so the caller
/// always sees "starting" before any further status. The role check precedes
/// submission unconditionally — a caller without the role never causes a
/// browser session to open.
async fn handle_start(rest: Rest, config: Arc<Config>, invocation: Invocation) {
    match rest
        .member_has_role(
            &invocation.guild_id,
            &invocation.author_id,
            &config.allowed_role,
        )
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            let text = format!(
                "\u{274c} You need the `{}` role to use this command!",
                config.allowed_role
            );
            if let Err(e) = rest.send_message(&invocation.channel_id, &text).await {
                eprintln!("[discord] failed to send role refusal: {e}");
            }
            return;
        }
        Err(e) => {
            // Full detail stays on the console; the user gets a generic line.
            eprintln!("[discord] role check failed: {e}");
            let _ = rest
                .send_message(
                    &invocation.channel_id,
                    "\u{274c} An error occurred while processing the command.",
                )
                .await;
            return;
        }
    }

    let ack_id = match rest
        .send_message(
            &invocation.channel_id,
            "\u{1f504} Starting Aternos server... This may take up to 1 minute...",
        )
        .await
    {
        Ok(id) => id,
        Err(e) => {
            eprintln!("[discord] failed to send acknowledgment: {e}");
            return;
        }
    };

    let result = automation::submit(config).await;

    let content = if result.success {
        format!(
            "\u{2705} {}\n\u{23f3} The server should be online in 2-3 minutes.",
            result.message
        )
    } else {
        format!("\u{274c} Failed: {}", result.message)
    };
    if let Err(e) = rest
        .edit_message(&invocation.channel_id, &ack_id, &content)
        .await
    {
        eprintln!("[discord] failed to edit acknowledgment: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command("!startserver", "!"), Some(Command::StartServer));
        assert_eq!(parse_command("!status", "!"), Some(Command::Status));
        assert_eq!(parse_command("!help", "!"), Some(Command::Help));
    }

    #[test]
    fn ignores_chatter_and_unknown_commands() {
        assert_eq!(parse_command("hello there", "!"), None);
        assert_eq!(parse_command("!unknown", "!"), None);
        assert_eq!(parse_command("", "!"), None);
        assert_eq!(parse_command("!", "!"), None);
    }

    #[test]
    fn prefix_is_configurable() {
        assert_eq!(parse_command("?startserver", "?"), Some(Command::StartServer));
        assert_eq!(parse_command("!startserver", "?"), None);
        assert_eq!(parse_command("srv startserver", "srv "), Some(Command::StartServer));
    }

    #[test]
    fn trailing_arguments_are_tolerated() {
        assert_eq!(
            parse_command("!startserver please", "!"),
            Some(Command::StartServer)
        );
    }

    fn roles(pairs: &[(&str, &str)]) -> Vec<GuildRole> {
        pairs
            .iter()
            .map(|(id, name)| GuildRole {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn role_gate_matches_by_name() {
        let guild_roles = roles(&[("1", "Admin"), ("2", "Member")]);
        let member = vec!["1".to_string()];
        assert!(role_grants_start(&member, &guild_roles, "Admin"));
        assert!(!role_grants_start(&member, &guild_roles, "Member"));
        let outsider = vec!["2".to_string()];
        assert!(!role_grants_start(&outsider, &guild_roles, "Admin"));
    }

    #[test]
    fn role_gate_rejects_without_any_roles() {
        let guild_roles = roles(&[("1", "Admin")]);
        assert!(!role_grants_start(&[], &guild_roles, "Admin"));
    }

    #[test]
    fn status_text_formats_uptime() {
        let text = status_text(Duration::from_secs(3 * 3600 + 5 * 60), "Survival");
        assert!(text.contains("3h 5m"));
        assert!(text.contains("Survival"));
    }

    #[test]
    fn help_text_names_all_commands_and_the_role() {
        let text = help_text("!", "Admin");
        assert!(text.contains("!startserver"));
        assert!(text.contains("!status"));
        assert!(text.contains("!help"));
        assert!(text.contains("Admin"));
    }
}
