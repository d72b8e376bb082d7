use crate::chat::ChatService;
use crate::core::models::{ChannelTarget, LabelFormat};
use crate::sources::PriceSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Renamed(String),
    Unchanged(String),
    NoValue,
    ChannelUnavailable,
    RenameFailed,
}

/// One tick of a channel task. Every failure is logged and absorbed here.
pub async fn update_channel(
    chat: &dyn ChatService,
    target: &ChannelTarget,
    source: &dyn PriceSource,
    format: LabelFormat,
) -> UpdateOutcome {
    let metric = source.metric();

    let Some(sample) = source.fetch_sample().await else {
        tracing::info!(?metric, channel = %target, "No value available, skipping channel update");
        return UpdateOutcome::NoValue;
    };

    let channel = match chat.fetch_channel(target).await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::error!(?metric, channel = %target, error = %e, "Failed to fetch channel");
            return UpdateOutcome::ChannelUnavailable;
        }
    };

    let label = format.render(&sample);

    if channel.name.as_deref() == Some(label.as_str()) {
        tracing::debug!(?metric, channel = %target, %label, "Channel name already up to date");
        return UpdateOutcome::Unchanged(label);
    }

    tracing::info!(?metric, channel = %target, %label, "Renaming channel");

    match chat.rename_channel(&channel, &label).await {
        Ok(()) => {
            tracing::info!(?metric, channel = %target, %label, "Channel name updated");
            UpdateOutcome::Renamed(label)
        }
        Err(e) => {
            tracing::error!(
                ?metric,
                channel = %target,
                error = %e,
                "Failed to update channel name"
            );
            UpdateOutcome::RenameFailed
        }
    }
}
