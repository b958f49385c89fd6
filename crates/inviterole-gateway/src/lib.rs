pub mod listener;
mod session;

pub use listener::{GatewayConfig, GatewayListener, DEFAULT_GATEWAY_URL};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid gateway payload: {0}")]
    Protocol(String),
    /// The gateway refused the session in a way reconnecting cannot fix.
    #[error("gateway closed the session with code {code}: {reason}")]
    Fatal { code: u16, reason: String },
}
