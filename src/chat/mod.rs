mod discord;

use crate::core::models::ChannelTarget;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use discord::DiscordSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("bot token was rejected")]
    Unauthorized,
    #[error("channel {0} not found")]
    NotFound(String),
    #[error("missing permission: {0}")]
    Forbidden(String),
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("invalid channel name: {0}")]
    InvalidName(String),
    #[error("chat API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// The slice of the chat service the updater needs.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn fetch_channel(&self, target: &ChannelTarget) -> Result<Channel, ChatError>;
    async fn rename_channel(&self, channel: &Channel, name: &str) -> Result<(), ChatError>;
}
