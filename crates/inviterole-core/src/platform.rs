use async_trait::async_trait;
use inviterole_models::id::{GuildId, RoleId, UserId};
use inviterole_models::invite::InviteRecord;

use crate::error::PlatformError;

/// The outbound half of the chat platform, as seen by join processing.
///
/// Each method is exactly one remote call; retries are the caller's business.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn list_invites(&self, guild_id: GuildId) -> Result<Vec<InviteRecord>, PlatformError>;

    /// Grant `role_id` to `member_id`. Granting a role the member already holds succeeds.
    async fn grant_role(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), PlatformError>;
}
