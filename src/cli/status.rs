use crate::core::http::{JsonFetcher, ReqwestFetcher};
use crate::core::models::{Metric, PriceSample};
use crate::core::settings::Settings;
use crate::sources::build_source;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct StatusOutput {
    metrics: Vec<MetricStatus>,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct MetricStatus {
    metric: Metric,
    channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

pub async fn run(settings: &Settings, json: bool, metrics: &[Metric]) -> Result<()> {
    let http: Arc<dyn JsonFetcher> = Arc::new(
        ReqwestFetcher::new(settings.request_timeout()).context("Failed to build HTTP client")?,
    );

    let mut statuses = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let sample = build_source(*metric, settings, Arc::clone(&http))
            .fetch_sample()
            .await;
        statuses.push(metric_status(*metric, settings, sample));
    }

    if json {
        let output = StatusOutput {
            metrics: statuses,
            fetched_at: Utc::now(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&statuses);
    }

    Ok(())
}

fn metric_status(metric: Metric, settings: &Settings, sample: Option<PriceSample>) -> MetricStatus {
    let label = sample.as_ref().map(|s| metric.label_format().render(s));
    MetricStatus {
        metric,
        channel: settings.channel(metric).id,
        value: sample.map(|s| s.value),
        label,
    }
}

fn print_text_output(statuses: &[MetricStatus]) {
    for status in statuses {
        let shown = status.label.as_deref().unwrap_or("unavailable");
        println!(
            "{:<12} {} (channel {})",
            format!("{}:", status.metric.name()),
            shown,
            status.channel
        );
    }
}
