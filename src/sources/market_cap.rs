use crate::core::http::JsonFetcher;
use crate::core::models::{Metric, PriceSample};
use crate::sources::PriceSource;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const MARKET_CAP_FIELD: &str = "marketCap";

pub struct MarketCapSource {
    http: Arc<dyn JsonFetcher>,
    url: String,
}

impl MarketCapSource {
    pub fn new(http: Arc<dyn JsonFetcher>, url: String) -> Self {
        Self { http, url }
    }
}

/// Points are ordered oldest first; the last one is the current market cap.
fn extract_latest_market_cap(body: &Value) -> Option<PriceSample> {
    let Some(latest) = body.as_array().and_then(|points| points.last()) else {
        tracing::warn!("No data points in market cap response");
        return None;
    };

    match latest.get(MARKET_CAP_FIELD) {
        Some(Value::Number(cap)) if cap.as_f64() == Some(0.0) => {
            tracing::warn!(
                field = MARKET_CAP_FIELD,
                "Latest market cap is zero, treating as unavailable"
            );
            None
        }
        Some(Value::Number(cap)) => Some(PriceSample::market_cap(cap)),
        _ => {
            tracing::warn!(field = MARKET_CAP_FIELD, "Latest data point has no numeric market cap");
            None
        }
    }
}

#[async_trait]
impl PriceSource for MarketCapSource {
    fn metric(&self) -> Metric {
        Metric::MarketCap
    }

    async fn fetch_sample(&self) -> Option<PriceSample> {
        tracing::debug!(url = %self.url, "Fetching market cap");

        match self.http.get_json(&self.url).await {
            Ok(body) => {
                let sample = extract_latest_market_cap(&body);
                if let Some(sample) = &sample {
                    tracing::info!(market_cap = %sample, "Fetched market cap");
                }
                sample
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch market cap");
                None
            }
        }
    }
}
