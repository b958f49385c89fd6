pub mod client;
pub mod wire;

pub use client::{RestClient, DEFAULT_API_BASE};

use inviterole_core::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
    #[error("invalid {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },
}
