use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{GuildId, UserId};

/// A member joined a guild. Produced by the gateway, consumed once by the
/// join serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEvent {
    pub member_id: UserId,
    pub guild_id: GuildId,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialUser {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
}

/// Payload of a `GUILD_MEMBER_ADD` dispatch. Only the fields needed for
/// attribution are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMemberAdd {
    pub guild_id: GuildId,
    pub user: PartialUser,
    pub joined_at: DateTime<Utc>,
}

impl From<GuildMemberAdd> for JoinEvent {
    fn from(add: GuildMemberAdd) -> Self {
        Self {
            member_id: add.user.id,
            guild_id: add.guild_id,
            joined_at: add.joined_at,
        }
    }
}
