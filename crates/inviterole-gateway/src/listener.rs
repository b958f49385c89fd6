use std::sync::Arc;
use std::time::Duration;

use inviterole_models::gateway::{
    GatewayEvent, INTENT_GUILDS, INTENT_GUILD_INVITES, INTENT_GUILD_MEMBERS,
};
use tokio::sync::{mpsc, Notify};

use crate::session::{self, SessionEnd};
use crate::GatewayError;

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub intents: u64,
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            intents: INTENT_GUILDS | INTENT_GUILD_MEMBERS | INTENT_GUILD_INVITES,
        }
    }
}

/// Keeps a gateway session alive and pushes READY and every member join into
/// `sender`.
pub struct GatewayListener {
    config: GatewayConfig,
    sender: mpsc::Sender<GatewayEvent>,
}

impl GatewayListener {
    pub fn new(config: GatewayConfig, sender: mpsc::Sender<GatewayEvent>) -> Self {
        Self { config, sender }
    }

    /// Run until shutdown, until the join receiver goes away, or until the
    /// gateway rejects the session for good.
    pub async fn run(self, shutdown: Arc<Notify>) -> Result<(), GatewayError> {
        let mut failures = 0u32;
        loop {
            match session::run(&self.config, &self.sender, &shutdown).await {
                Ok(SessionEnd::Shutdown) => {
                    tracing::info!("gateway listener shutting down");
                    return Ok(());
                }
                Ok(SessionEnd::ReceiverClosed) => return Ok(()),
                Ok(SessionEnd::Reconnect) => {
                    failures = 0;
                    tracing::info!("gateway asked for a new session");
                }
                Err(err @ GatewayError::Fatal { .. }) => return Err(err),
                Err(err) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(error = %err, failures, "gateway session failed");
                }
            }

            let delay = reconnect_delay(failures);
            tokio::select! {
                _ = shutdown.notified() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn reconnect_delay(failures: u32) -> Duration {
    RECONNECT_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(failures.min(16)))
        .min(RECONNECT_MAX_DELAY)
}
