use crate::core::models::Metric;
use crate::core::settings::Settings;
use crate::daemon::{self, UpdateOutcome};
use anyhow::Result;

pub async fn run(settings: &Settings, metrics: &[Metric]) -> Result<()> {
    let outcomes = daemon::run_once(settings, metrics).await?;

    for (metric, outcome) in &outcomes {
        println!("{:<12} {}", format!("{}:", metric.name()), describe(outcome));
    }

    Ok(())
}

fn describe(outcome: &UpdateOutcome) -> String {
    match outcome {
        UpdateOutcome::Renamed(label) => format!("renamed to \"{label}\""),
        UpdateOutcome::Unchanged(label) => format!("already \"{label}\""),
        UpdateOutcome::NoValue => "no value available".to_string(),
        UpdateOutcome::ChannelUnavailable => "channel unavailable".to_string(),
        UpdateOutcome::RenameFailed => "rename failed".to_string(),
    }
}
