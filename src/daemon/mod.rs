mod scheduler;
mod updater;

use crate::chat::{ChatService, DiscordSession};
use crate::core::http::{JsonFetcher, ReqwestFetcher};
use crate::core::models::Metric;
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use std::sync::Arc;

use scheduler::{build_tasks, Scheduler, TaskSpec};
use updater::update_channel;

pub use updater::UpdateOutcome;

async fn connect(settings: &Settings, token: &str) -> Result<DiscordSession> {
    let session = DiscordSession::connect(
        &settings.endpoints.discord_api_url,
        token,
        settings.request_timeout(),
    )
    .await?;
    tracing::info!(username = session.username(), "Bot logged in successfully");
    Ok(session)
}

fn http_client(settings: &Settings) -> Result<Arc<dyn JsonFetcher>> {
    let fetcher =
        ReqwestFetcher::new(settings.request_timeout()).context("Failed to build HTTP client")?;
    Ok(Arc::new(fetcher))
}

/// Runs both channel tasks until Ctrl-C. A rejected login leaves the process idle.
pub async fn run(settings: Settings) -> Result<()> {
    tracing::info!("Starting kasper-channel-bot daemon");

    let token = Settings::bot_token()?;
    let tasks = build_tasks(&settings, http_client(&settings)?, &Metric::ALL);

    let session = match connect(&settings, &token).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Failed to log in, channel updates will not be scheduled");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            return Ok(());
        }
    };

    let scheduler = Scheduler::spawn(Arc::new(session), tasks);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    scheduler.shutdown().await;

    Ok(())
}

/// Runs each selected updater exactly once.
pub async fn run_once(
    settings: &Settings,
    metrics: &[Metric],
) -> Result<Vec<(Metric, UpdateOutcome)>> {
    let token = Settings::bot_token()?;
    let tasks = build_tasks(settings, http_client(settings)?, metrics);
    let session = connect(settings, &token).await.context("Failed to log in")?;

    Ok(run_tasks_once(&session, &tasks).await)
}

async fn run_tasks_once(
    chat: &dyn ChatService,
    tasks: &[TaskSpec],
) -> Vec<(Metric, UpdateOutcome)> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        let outcome = update_channel(chat, &task.target, task.source.as_ref(), task.format).await;
        outcomes.push((task.metric, outcome));
    }
    outcomes
}
