use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use inviterole_core::RetryPolicy;
use inviterole_gateway::DEFAULT_GATEWAY_URL;
use inviterole_models::id::GuildId;
use inviterole_rest::DEFAULT_API_BASE;
use serde::{Deserialize, Serialize};

/// Prefix of the per-role environment variables, e.g. `INVITE_MODERATOR=abc123`.
const ROLE_ENV_PREFIX: &str = "INVITE_";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Role name (or numeric role id) -> invite code.
    #[serde(default)]
    pub roles: BTreeMap<String, String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    pub guild_id: Option<GuildId>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            guild_id: None,
            api_base: default_api_base(),
            gateway_url: default_gateway_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_rate_limit_attempts")]
    pub rate_limit_attempts: u32,
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_attempts: default_rate_limit_attempts(),
            transient_retries: default_transient_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            rate_limit_attempts: config.rate_limit_attempts.max(1),
            transient_retries: config.transient_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_rate_limit_attempts() -> u32 {
    3
}

fn default_transient_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

/// Everything the bot needs, checked.
#[derive(Debug)]
pub struct Settings {
    pub token: String,
    pub guild_id: GuildId,
    pub api_base: String,
    pub gateway_url: String,
    /// (role name or id, invite code), roles without a code left out.
    pub roles: Vec<(String, String)>,
    pub retry: RetryPolicy,
}

impl Config {
    /// Read the TOML file if there is one, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content =
                fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
            toml::from_str(&content).with_context(|| format!("failed to parse {path}"))?
        } else {
            tracing::info!(
                "Config file not found at '{}', using environment variables only",
                path
            );
            Config::default()
        };
        config.apply_env(std::env::vars());
        Ok(config)
    }

    pub fn apply_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            match key.as_str() {
                "DISCORD_TOKEN" => self.discord.token = value,
                "DISCORD_GUILD_ID" => match value.parse::<GuildId>() {
                    Ok(id) => self.discord.guild_id = Some(id),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid DISCORD_GUILD_ID value '{}'", value);
                    }
                },
                "INVITEROLE_API_BASE" => self.discord.api_base = value,
                "INVITEROLE_GATEWAY_URL" => self.discord.gateway_url = value,
                "INVITEROLE_RATE_LIMIT_ATTEMPTS" => {
                    if let Ok(parsed) = value.parse::<u32>() {
                        self.retry.rate_limit_attempts = parsed;
                    }
                }
                "INVITEROLE_TRANSIENT_RETRIES" => {
                    if let Ok(parsed) = value.parse::<u32>() {
                        self.retry.transient_retries = parsed;
                    }
                }
                "INVITEROLE_BACKOFF_BASE_MS" => {
                    if let Ok(parsed) = value.parse::<u64>() {
                        self.retry.backoff_base_ms = parsed;
                    }
                }
                _ => {
                    if let Some(role) = role_from_env_key(&key) {
                        self.roles.insert(role, value);
                    }
                }
            }
        }
    }

    pub fn validate(self) -> Result<Settings> {
        if self.discord.token.trim().is_empty() {
            bail!("DISCORD_TOKEN is not configured (set it in the environment or [discord].token)");
        }
        let Some(guild_id) = self.discord.guild_id else {
            bail!("DISCORD_GUILD_ID is not configured (set it in the environment or [discord].guild_id)");
        };

        let mut roles = Vec::new();
        for (role, code) in self.roles {
            if code.trim().is_empty() {
                tracing::warn!("Role '{}' has no invite code and will never be assigned", role);
                continue;
            }
            roles.push((role, code));
        }
        if roles.is_empty() {
            bail!("no invite mappings configured; set INVITE_<ROLE>=<code> or a [roles] table");
        }

        Ok(Settings {
            token: self.discord.token,
            guild_id,
            api_base: self.discord.api_base,
            gateway_url: self.discord.gateway_url,
            roles,
            retry: RetryPolicy::from(&self.retry),
        })
    }
}

/// `INVITE_MODERATOR` -> `Moderator`, `INVITE_SENIOR_MENTOR` -> `Senior Mentor`.
fn role_from_env_key(key: &str) -> Option<String> {
    let suffix = key.strip_prefix(ROLE_ENV_PREFIX)?;
    if suffix.is_empty() {
        return None;
    }
    let words: Vec<String> = suffix
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}
