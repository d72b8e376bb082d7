use crate::chat::ChatService;
use crate::core::http::JsonFetcher;
use crate::core::models::{ChannelTarget, LabelFormat, Metric};
use crate::core::settings::Settings;
use crate::daemon::updater::update_channel;
use crate::sources::{build_source, PriceSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Everything one periodic channel task needs.
pub struct TaskSpec {
    pub metric: Metric,
    pub source: Arc<dyn PriceSource>,
    pub target: ChannelTarget,
    pub format: LabelFormat,
    pub interval: Duration,
}

impl TaskSpec {
    pub fn from_settings(metric: Metric, settings: &Settings, http: Arc<dyn JsonFetcher>) -> Self {
        Self {
            metric,
            source: build_source(metric, settings, http),
            target: settings.channel(metric),
            format: metric.label_format(),
            interval: settings.interval(metric),
        }
    }
}

pub fn build_tasks(
    settings: &Settings,
    http: Arc<dyn JsonFetcher>,
    metrics: &[Metric],
) -> Vec<TaskSpec> {
    metrics
        .iter()
        .map(|metric| TaskSpec::from_settings(*metric, settings, Arc::clone(&http)))
        .collect()
}

pub struct Scheduler {
    tasks: JoinSet<()>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    /// Starts one supervised task per spec. Each runs immediately, then every `interval`.
    pub fn spawn(chat: Arc<dyn ChatService>, specs: Vec<TaskSpec>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for spec in specs {
            tracing::info!(
                metric = ?spec.metric,
                channel = %spec.target,
                interval = ?spec.interval,
                "Scheduling channel updates"
            );
            tasks.spawn(supervise(
                Arc::clone(&chat),
                Arc::new(spec),
                shutdown_rx.clone(),
            ));
        }

        Self { tasks, shutdown }
    }

    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        while self.tasks.join_next().await.is_some() {}
        tracing::info!("All channel tasks stopped");
    }
}

/// Restarts a panicked task after one interval so a persistent panic cannot spin.
async fn supervise(
    chat: Arc<dyn ChatService>,
    spec: Arc<TaskSpec>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut first_tick_delay = Duration::ZERO;

    loop {
        let mut handle = tokio::spawn(run_task(
            Arc::clone(&chat),
            Arc::clone(&spec),
            first_tick_delay,
        ));

        tokio::select! {
            _ = shutdown.changed() => {
                handle.abort();
                break;
            }
            result = &mut handle => match result {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    tracing::error!(
                        metric = ?spec.metric,
                        restart_in = ?spec.interval,
                        "Channel task panicked, restarting"
                    );
                    first_tick_delay = spec.interval;
                }
                Err(e) => {
                    tracing::warn!(metric = ?spec.metric, error = %e, "Channel task cancelled");
                    break;
                }
            }
        }
    }
}

async fn run_task(chat: Arc<dyn ChatService>, spec: Arc<TaskSpec>, first_tick_delay: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + first_tick_delay, spec.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        tracing::debug!(metric = ?spec.metric, "Tick");
        update_channel(chat.as_ref(), &spec.target, spec.source.as_ref(), spec.format).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::RecordingChat;
    use crate::core::models::PriceSample;
    use crate::daemon::updater::tests::FixedSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FLOOR_CHANNEL: &str = "floor";
    const CAP_CHANNEL: &str = "cap";

    fn spec(metric: Metric, source: Arc<dyn PriceSource>, channel: &str, ms: u64) -> TaskSpec {
        TaskSpec {
            metric,
            source,
            target: ChannelTarget::new(channel),
            format: metric.label_format(),
            interval: Duration::from_millis(ms),
        }
    }

    fn offsets_ms(start: Instant, calls: &[crate::chat::testing::RenameCall]) -> Vec<u128> {
        calls
            .iter()
            .map(|call| call.at.duration_since(start).as_millis())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_immediately_then_on_interval() {
        let chat = Arc::new(RecordingChat::default());
        let start = Instant::now();

        let scheduler = Scheduler::spawn(
            Arc::clone(&chat) as Arc<dyn ChatService>,
            vec![
                spec(
                    Metric::FloorPrice,
                    Arc::new(FixedSource::new(Metric::FloorPrice, Some("1.23000"))),
                    FLOOR_CHANNEL,
                    900_000,
                ),
                spec(
                    Metric::MarketCap,
                    Arc::new(FixedSource::new(Metric::MarketCap, Some("150"))),
                    CAP_CHANNEL,
                    60_000,
                ),
            ],
        );

        tokio::time::sleep(Duration::from_millis(1_800_001)).await;
        scheduler.shutdown().await;

        let floor = chat.renames_for(FLOOR_CHANNEL).await;
        assert_eq!(offsets_ms(start, &floor), vec![0, 900_000, 1_800_000]);
        assert!(floor.iter().all(|c| c.name == "KASPER Floor: 1.23000 KAS"));

        let cap = chat.renames_for(CAP_CHANNEL).await;
        let cap_offsets = offsets_ms(start, &cap);
        assert_eq!(cap_offsets.len(), 31);
        assert_eq!(cap_offsets[..3].to_vec(), vec![0, 60_000, 120_000]);
        assert!(cap.iter().all(|c| c.name == "MC: 150"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_samples_keep_schedule_running() {
        let chat = Arc::new(RecordingChat::default());
        let source = Arc::new(FixedSource::new(Metric::MarketCap, None));

        let scheduler = Scheduler::spawn(
            Arc::clone(&chat) as Arc<dyn ChatService>,
            vec![spec(
                Metric::MarketCap,
                Arc::clone(&source) as Arc<dyn PriceSource>,
                CAP_CHANNEL,
                60_000,
            )],
        );

        tokio::time::sleep(Duration::from_millis(180_001)).await;
        scheduler.shutdown().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert!(chat.renames().await.is_empty());
    }

    struct PanicOnceSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for PanicOnceSource {
        fn metric(&self) -> Metric {
            Metric::MarketCap
        }

        async fn fetch_sample(&self) -> Option<PriceSample> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first fetch blows up");
            }
            Some(PriceSample::new("150"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_task_is_restarted_after_interval() {
        let chat = Arc::new(RecordingChat::default());
        let start = Instant::now();

        let scheduler = Scheduler::spawn(
            Arc::clone(&chat) as Arc<dyn ChatService>,
            vec![
                spec(
                    Metric::MarketCap,
                    Arc::new(PanicOnceSource {
                        calls: AtomicUsize::new(0),
                    }),
                    CAP_CHANNEL,
                    60_000,
                ),
                spec(
                    Metric::FloorPrice,
                    Arc::new(FixedSource::new(Metric::FloorPrice, Some("1.00000"))),
                    FLOOR_CHANNEL,
                    900_000,
                ),
            ],
        );

        tokio::time::sleep(Duration::from_millis(120_001)).await;
        scheduler.shutdown().await;

        let cap = chat.renames_for(CAP_CHANNEL).await;
        assert_eq!(offsets_ms(start, &cap), vec![60_000, 120_000]);

        let floor = chat.renames_for(FLOOR_CHANNEL).await;
        assert_eq!(offsets_ms(start, &floor), vec![0]);
    }

    #[test]
    fn test_build_tasks_from_settings() {
        let settings = Settings::default();
        let http: Arc<dyn JsonFetcher> =
            Arc::new(crate::core::http::testing::ScriptedFetcher::default());

        let tasks = build_tasks(&settings, http, &Metric::ALL);

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].metric, Metric::FloorPrice);
        assert_eq!(tasks[0].source.metric(), Metric::FloorPrice);
        assert_eq!(tasks[0].target, ChannelTarget::new("1285605233699061863"));
        assert_eq!(tasks[0].interval, Duration::from_millis(900_000));
        assert_eq!(tasks[1].metric, Metric::MarketCap);
        assert_eq!(tasks[1].format, LabelFormat::MarketCap);
        assert_eq!(tasks[1].interval, Duration::from_millis(60_000));
    }
}
