use crate::core::models::{ChannelTarget, Metric};
use crate::core::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TOKEN_ENV_VAR: &str = "DISCORD_BOT_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub channels: ChannelSettings,
    pub endpoints: EndpointSettings,
    pub schedule: ScheduleSettings,
    pub retry: RetrySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub floor_price: String,
    pub market_cap: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            floor_price: "1285605233699061863".to_string(),
            market_cap: "1286442064669708400".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub floor_price_url: String,
    pub market_cap_url: String,
    pub discord_api_url: String,
    pub request_timeout_secs: u64,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            floor_price_url:
                "https://storage.googleapis.com/kspr-api-v1/marketplace/marketplace.json"
                    .to_string(),
            market_cap_url: "https://kasper-charts-ae1d58154e70.herokuapp.com/prices?range=1h"
                .to_string(),
            discord_api_url: "https://discord.com/api/v10".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub floor_price_interval_secs: u64,
    pub market_cap_interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            floor_price_interval_secs: 900,
            market_cap_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff_factor: u32,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff_factor: 1,
            max_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub json: bool,
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kasper-channel-bot").join("config.toml"))
    }

    /// Loads from `path` when given, otherwise from the default config location.
    /// A missing default file falls back to defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => {
                let path = Self::config_path().context("Could not determine config directory")?;
                if !path.exists() {
                    tracing::info!(?path, "Config file not found, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        for metric in Metric::ALL {
            if self.channel(metric).id.trim().is_empty() {
                anyhow::bail!("channel id for {} must not be empty", metric.name());
            }
            if self.interval(metric).is_zero() {
                anyhow::bail!("update interval for {} must be positive", metric.name());
            }
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.backoff_factor == 0 {
            anyhow::bail!("retry.backoff_factor must be at least 1");
        }
        if self.endpoints.request_timeout_secs == 0 {
            anyhow::bail!("endpoints.request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn channel(&self, metric: Metric) -> ChannelTarget {
        match metric {
            Metric::FloorPrice => ChannelTarget::new(&self.channels.floor_price),
            Metric::MarketCap => ChannelTarget::new(&self.channels.market_cap),
        }
    }

    pub fn interval(&self, metric: Metric) -> Duration {
        match metric {
            Metric::FloorPrice => Duration::from_secs(self.schedule.floor_price_interval_secs),
            Metric::MarketCap => Duration::from_secs(self.schedule.market_cap_interval_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
        .with_backoff(
            self.retry.backoff_factor,
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoints.request_timeout_secs)
    }

    /// Reads the bot token from the environment, after loading any `.env` file.
    pub fn bot_token() -> Result<String> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(?path, "Loaded .env file");
        }

        let token = std::env::var(TOKEN_ENV_VAR)
            .with_context(|| format!("{TOKEN_ENV_VAR} is not set"))?;
        let token = token.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("{TOKEN_ENV_VAR} is empty");
        }
        Ok(token)
    }
}
