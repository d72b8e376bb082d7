mod floor_price;
mod market_cap;

use crate::core::http::JsonFetcher;
use crate::core::models::{Metric, PriceSample};
use crate::core::settings::Settings;
use async_trait::async_trait;
use std::sync::Arc;

pub use floor_price::FloorPriceSource;
pub use market_cap::MarketCapSource;

/// Produces one sample per call. Failures are logged by the source and
/// surface only as `None`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn metric(&self) -> Metric;
    async fn fetch_sample(&self) -> Option<PriceSample>;
}

pub fn build_source(
    metric: Metric,
    settings: &Settings,
    http: Arc<dyn JsonFetcher>,
) -> Arc<dyn PriceSource> {
    match metric {
        Metric::FloorPrice => Arc::new(FloorPriceSource::new(
            http,
            settings.endpoints.floor_price_url.clone(),
            settings.retry_policy(),
        )),
        Metric::MarketCap => Arc::new(MarketCapSource::new(
            http,
            settings.endpoints.market_cap_url.clone(),
        )),
    }
}
