use std::sync::Arc;

use inviterole_models::id::GuildId;
use inviterole_models::invite::InviteSnapshot;

use crate::error::SnapshotError;
use crate::platform::Platform;

/// Last-known invite counters for one guild.
pub struct InviteSnapshotStore {
    guild_id: GuildId,
    platform: Arc<dyn Platform>,
    current: Option<InviteSnapshot>,
}

impl InviteSnapshotStore {
    pub fn new(guild_id: GuildId, platform: Arc<dyn Platform>) -> Self {
        Self {
            guild_id,
            platform,
            current: None,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Fetch the guild's invites (one outbound call) and make them the stored snapshot.
    ///
    /// On failure the stored snapshot is left untouched.
    pub async fn refresh(&mut self) -> Result<InviteSnapshot, SnapshotError> {
        let records = self.platform.list_invites(self.guild_id).await?;
        let snapshot = InviteSnapshot::capture(records);
        tracing::debug!(
            guild_id = %self.guild_id,
            invites = snapshot.len(),
            captured_at = %snapshot.captured_at(),
            "invite snapshot refreshed"
        );
        self.current = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// The last captured snapshot, `None` until the first successful refresh.
    pub fn current(&self) -> Option<InviteSnapshot> {
        self.current.clone()
    }

    /// Forget the stored snapshot. Counters may have moved without a join we
    /// saw, so diffing against it could blame the wrong member.
    pub fn invalidate(&mut self) {
        if self.current.take().is_some() {
            tracing::debug!(guild_id = %self.guild_id, "invite baseline invalidated");
        }
    }
}
