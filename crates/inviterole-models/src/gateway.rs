use serde::{Deserialize, Serialize};

use crate::member::JoinEvent;

// Client -> Server opcodes
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;

// Server -> Client opcodes
pub const OP_DISPATCH: u8 = 0;
pub const OP_RECONNECT: u8 = 7;
pub const OP_INVALID_SESSION: u8 = 9;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;

// Gateway intents
pub const INTENT_GUILDS: u64 = 1 << 0;
pub const INTENT_GUILD_MEMBERS: u64 = 1 << 1;
pub const INTENT_GUILD_INVITES: u64 = 1 << 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OP_HEARTBEAT,
            d: Some(last_sequence.map_or(serde_json::Value::Null, Into::into)),
            s: None,
            t: None,
        }
    }

    pub fn identify(token: &str, intents: u64) -> Self {
        Self {
            op: OP_IDENTIFY,
            d: Some(serde_json::json!({
                "token": token,
                "intents": intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "inviterole",
                    "device": "inviterole",
                },
            })),
            s: None,
            t: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

// Dispatch event names
pub const EVENT_READY: &str = "READY";
pub const EVENT_GUILD_MEMBER_ADD: &str = "GUILD_MEMBER_ADD";

// Invite events
pub const EVENT_INVITE_CREATE: &str = "INVITE_CREATE";
pub const EVENT_INVITE_DELETE: &str = "INVITE_DELETE";

/// What the gateway listener hands to join processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A new session is live. Joins that happened while no session was
    /// connected were never delivered.
    Ready,
    MemberJoined(JoinEvent),
}
