use std::time::Duration;

use chrono::{DateTime, Utc};
use inviterole_core::PlatformError;
use inviterole_models::invite::InviteRecord;
use serde::Deserialize;

/// Fallback wait when a 429 carries no usable retry hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// JSON error code for "Unknown Role".
const UNKNOWN_ROLE: u32 = 10011;

/// Invite object with metadata, as returned by the guild invites listing.
#[derive(Debug, Clone, Deserialize)]
pub struct WireInvite {
    pub code: String,
    #[serde(default)]
    pub uses: u32,
    #[serde(default)]
    pub max_uses: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl From<WireInvite> for InviteRecord {
    fn from(invite: WireInvite) -> Self {
        Self {
            code: invite.code,
            uses: invite.uses,
            max_uses: invite.max_uses.filter(|max| *max > 0),
            created_at: invite.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

fn seconds(value: f64) -> Option<Duration> {
    (value.is_finite() && value >= 0.0).then(|| Duration::from_secs_f64(value))
}

/// Map a non-success response onto the retry taxonomy.
///
/// `retry_after_header` is the raw `Retry-After` header, used only when the
/// body does not carry `retry_after` itself.
pub fn classify(status: u16, body: &str, retry_after_header: Option<&str>) -> PlatformError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| format!("status {status}"));

    match status {
        429 => {
            let retry_after = parsed
                .retry_after
                .and_then(seconds)
                .or_else(|| {
                    retry_after_header
                        .and_then(|h| h.trim().parse::<f64>().ok())
                        .and_then(seconds)
                })
                .unwrap_or(DEFAULT_RETRY_AFTER);
            PlatformError::RateLimited { retry_after }
        }
        404 if parsed.code == Some(UNKNOWN_ROLE) => PlatformError::Forbidden(message),
        404 => PlatformError::NotFound,
        500..=599 => PlatformError::Transient(message),
        // 401, 403 and every other client error: retrying cannot help.
        _ => PlatformError::Forbidden(message),
    }
}
