use std::time::Duration;

use async_trait::async_trait;
use inviterole_core::{Platform, PlatformError};
use inviterole_models::id::{GuildId, RoleId, UserId};
use inviterole_models::invite::InviteRecord;
use inviterole_models::role::Role;
use reqwest::{Client, Response};

use crate::wire::{classify, WireInvite};
use crate::RestError;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Bot-authenticated client for the handful of REST calls join handling needs.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    api_base: String,
    authorization: String,
}

impl RestClient {
    pub fn new(token: &str, api_base: &str) -> Result<Self, RestError> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!(
                "DiscordBot (https://github.com/inviterole/inviterole, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            authorization: format!("Bot {token}"),
        })
    }

    /// All roles of a guild. Used once at startup to resolve configured role names.
    pub async fn list_roles(&self, guild_id: GuildId) -> Result<Vec<Role>, RestError> {
        let url = format!("{}/guilds/{}/roles", self.api_base, guild_id);
        let resp = self.send(self.http.get(&url)).await?;
        resp.json().await.map_err(|source| RestError::Decode {
            what: "roles",
            source,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, PlatformError> {
        let resp = request
            .header("authorization", &self.authorization)
            .send()
            .await
            .map_err(|e| PlatformError::Transient(e.to_string()))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.unwrap_or_default();
        let err = classify(status, &body, retry_after.as_deref());
        tracing::debug!(status, error = %err, "platform request failed");
        Err(err)
    }
}

#[async_trait]
impl Platform for RestClient {
    async fn list_invites(&self, guild_id: GuildId) -> Result<Vec<InviteRecord>, PlatformError> {
        let url = format!("{}/guilds/{}/invites", self.api_base, guild_id);
        let resp = self.send(self.http.get(&url)).await?;
        let invites: Vec<WireInvite> = resp
            .json()
            .await
            .map_err(|e| PlatformError::Transient(format!("invalid invites response: {e}")))?;
        Ok(invites.into_iter().map(InviteRecord::from).collect())
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base, guild_id, member_id, role_id
        );
        let mut request = self.http.put(&url).header("content-length", "0");
        if reason.is_ascii() && !reason.is_empty() {
            request = request.header("x-audit-log-reason", reason);
        }
        self.send(request).await?;
        Ok(())
    }
}
