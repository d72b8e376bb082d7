use crate::core::http::JsonFetcher;
use crate::core::models::{Metric, PriceSample};
use crate::core::retry::RetryPolicy;
use crate::sources::PriceSource;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

const COLLECTION_KEY: &str = "KASPER";
const FLOOR_PRICE_FIELD: &str = "floor_price";

pub struct FloorPriceSource {
    http: Arc<dyn JsonFetcher>,
    base_url: String,
    retry: RetryPolicy,
}

impl FloorPriceSource {
    pub fn new(http: Arc<dyn JsonFetcher>, base_url: String, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url,
            retry,
        }
    }

    /// Appends the `t` cache-busting parameter.
    fn request_url(&self, timestamp: i64) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}t={}", self.base_url, separator, timestamp)
    }
}

enum FloorPriceBody {
    Found(PriceSample),
    /// No listing for the collection; nothing to retry.
    NoCollection,
    /// Listing present but `floor_price` missing or not a number; retryable.
    BadField,
}

fn read_floor_price(body: &Value) -> FloorPriceBody {
    let Some(collection) = body.get(COLLECTION_KEY) else {
        return FloorPriceBody::NoCollection;
    };

    match collection.get(FLOOR_PRICE_FIELD).and_then(Value::as_f64) {
        Some(price) => FloorPriceBody::Found(PriceSample::floor_price(price)),
        None => FloorPriceBody::BadField,
    }
}

#[async_trait]
impl PriceSource for FloorPriceSource {
    fn metric(&self) -> Metric {
        Metric::FloorPrice
    }

    async fn fetch_sample(&self) -> Option<PriceSample> {
        let url = self.request_url(Utc::now().timestamp());
        let max_attempts = self.retry.max_attempts();

        tracing::info!(%url, "Fetching floor price");

        for attempt in 1..=max_attempts {
            let failure = match self.http.get_json(&url).await {
                Ok(body) => match read_floor_price(&body) {
                    FloorPriceBody::Found(sample) => {
                        tracing::info!(price = %sample, attempt, "Fetched floor price");
                        return Some(sample);
                    }
                    FloorPriceBody::NoCollection => {
                        tracing::warn!(
                            key = COLLECTION_KEY,
                            "Collection missing from marketplace data"
                        );
                        return None;
                    }
                    FloorPriceBody::BadField => {
                        format!("{COLLECTION_KEY}.{FLOOR_PRICE_FIELD} missing or not a number")
                    }
                },
                Err(e) => e.to_string(),
            };

            tracing::warn!(attempt, max_attempts, error = %failure, "Floor price fetch failed");

            match self.retry.delay_after(attempt) {
                Some(delay) => {
                    tracing::info!(
                        next_attempt = attempt + 1,
                        ?delay,
                        "Retrying floor price fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => break,
            }
        }

        tracing::error!(max_attempts, "Giving up on floor price after all attempts failed");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::testing::ScriptedFetcher;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    const BASE_URL: &str = "https://example.test/marketplace.json";

    fn source(fetcher: &Arc<ScriptedFetcher>) -> FloorPriceSource {
        FloorPriceSource::new(
            Arc::clone(fetcher) as Arc<dyn JsonFetcher>,
            BASE_URL.to_string(),
            RetryPolicy::default(),
        )
    }

    fn marketplace(price: f64) -> Value {
        json!({
            "KASPER": { "floor_price": price, "volume": 12 },
            "NACHO": { "floor_price": 9.5 }
        })
    }

    #[tokio::test]
    async fn test_formats_price_to_five_decimals() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(marketplace(0.00012345))]));

        let sample = source(&fetcher).fetch_sample().await;

        assert_eq!(sample, Some(PriceSample::new("0.00012")));
        assert_eq!(fetcher.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_request_url_carries_timestamp() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(marketplace(1.0))]));
        let before = Utc::now().timestamp();

        source(&fetcher).fetch_sample().await;

        let requests = fetcher.requests().await;
        let t: i64 = requests[0]
            .strip_prefix(&format!("{BASE_URL}?t="))
            .and_then(|t| t.parse().ok())
            .unwrap();
        assert!(t >= before && t <= Utc::now().timestamp());
    }

    #[test]
    fn test_request_url_with_existing_query() {
        let fetcher: Arc<dyn JsonFetcher> = Arc::new(ScriptedFetcher::default());
        let source = FloorPriceSource::new(
            fetcher,
            "https://example.test/m.json?v=1".to_string(),
            RetryPolicy::default(),
        );
        assert_eq!(source.request_url(42), "https://example.test/m.json?v=1&t=42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_third_attempt() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ScriptedFetcher::status_error(500),
            ScriptedFetcher::status_error(502),
            Ok(marketplace(1.23)),
        ]));
        let started = Instant::now();

        let sample = source(&fetcher).fetch_sample().await;

        assert_eq!(sample, Some(PriceSample::new("1.23000")));
        assert_eq!(fetcher.requests().await.len(), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_none_after_exhausting_attempts() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ScriptedFetcher::status_error(500),
            ScriptedFetcher::status_error(500),
            ScriptedFetcher::status_error(500),
        ]));
        let started = Instant::now();

        let sample = source(&fetcher).fetch_sample().await;

        assert_eq!(sample, None);
        assert_eq!(fetcher.requests().await.len(), 3);
        // No wait after the final attempt.
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_retried() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(json!({ "NACHO": { "floor_price": 9.5 } })),
            Ok(marketplace(1.0)),
        ]));

        let sample = source(&fetcher).fetch_sample().await;

        assert_eq!(sample, None);
        assert_eq!(fetcher.requests().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_floor_price_field_uses_retry_budget() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(json!({ "KASPER": { "volume": 12 } })),
            Ok(json!({ "KASPER": { "floor_price": null } })),
            Ok(json!({ "KASPER": { "floor_price": "1.23" } })),
        ]));
        let started = Instant::now();

        let sample = source(&fetcher).fetch_sample().await;

        assert_eq!(sample, None);
        assert_eq!(fetcher.requests().await.len(), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_floor_price_field_then_good_body() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(json!({ "KASPER": { "volume": 12 } })),
            Ok(json!({ "KASPER": { "floor_price": 1.23 } })),
        ]));
        let started = Instant::now();

        let sample = source(&fetcher).fetch_sample().await;

        assert_eq!(sample, Some(PriceSample::new("1.23000")));
        assert_eq!(fetcher.requests().await.len(), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
