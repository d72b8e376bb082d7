use crate::chat::{Channel, ChatError, ChatService};
use crate::core::models::ChannelTarget;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const AUDIT_LOG_REASON: &str = "Scheduled price update";

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateLimitPayload {
    retry_after: f64,
}

/// An authenticated Discord REST session for a bot user.
pub struct DiscordSession {
    client: reqwest::Client,
    api_base: String,
    auth_header: String,
    username: String,
}

impl DiscordSession {
    /// Verifies the token against `/users/@me`. Success is the readiness signal.
    pub async fn connect(
        api_base: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                "DiscordBot (https://github.com/kasper-channel-bot, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(timeout)
            .build()?;
        let api_base = api_base.trim_end_matches('/').to_string();
        let auth_header = format!("Bot {token}");

        let response = client
            .get(format!("{api_base}/users/@me"))
            .header("Authorization", &auth_header)
            .send()
            .await?;
        let user: CurrentUser = check_response(response, "@me").await?.json().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Bot is ready");

        Ok(Self {
            client,
            api_base,
            auth_header,
            username: user.username,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn channel_url(&self, id: &str) -> String {
        format!("{}/channels/{}", self.api_base, id)
    }
}

#[async_trait]
impl ChatService for DiscordSession {
    async fn fetch_channel(&self, target: &ChannelTarget) -> Result<Channel, ChatError> {
        let response = self
            .client
            .get(self.channel_url(&target.id))
            .header("Authorization", &self.auth_header)
            .send()
            .await?;

        let payload: ChannelPayload = check_response(response, &target.id).await?.json().await?;
        Ok(Channel {
            id: payload.id,
            name: payload.name,
        })
    }

    async fn rename_channel(&self, channel: &Channel, name: &str) -> Result<(), ChatError> {
        let response = self
            .client
            .patch(self.channel_url(&channel.id))
            .header("Authorization", &self.auth_header)
            .header("X-Audit-Log-Reason", AUDIT_LOG_REASON)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        check_response(response, &channel.id).await?;
        Ok(())
    }
}

async fn check_response(
    response: reqwest::Response,
    resource: &str,
) -> Result<reqwest::Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header_retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(classify_error(status, body, resource, header_retry_after))
}

fn classify_error(
    status: StatusCode,
    body: String,
    resource: &str,
    header_retry_after: Option<f64>,
) -> ChatError {
    match status {
        StatusCode::UNAUTHORIZED => ChatError::Unauthorized,
        StatusCode::NOT_FOUND => ChatError::NotFound(resource.to_string()),
        StatusCode::FORBIDDEN => ChatError::Forbidden(body),
        StatusCode::TOO_MANY_REQUESTS => {
            let secs = serde_json::from_str::<RateLimitPayload>(&body)
                .map(|p| p.retry_after)
                .ok()
                .or(header_retry_after)
                .filter(|s| s.is_finite() && *s >= 0.0)
                .unwrap_or(0.0);
            ChatError::RateLimited {
                retry_after: Duration::from_secs_f64(secs),
            }
        }
        StatusCode::BAD_REQUEST => ChatError::InvalidName(body),
        _ => ChatError::Api {
            status: status.as_u16(),
            body,
        },
    }
}
