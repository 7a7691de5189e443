//! Scheduler runtime.
//!
//! Four independent loops (collection, indicators, sentiment, retention)
//! share one stop signal. Each loop runs its job once on start, then on its
//! interval. A stop never interrupts a provider call: the loop notices the
//! signal between iterations, and batch jobs also check it between symbols.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::scheduler_model::{SchedulerConfig, SchedulerState};
use crate::errors::{Error, Result};
use crate::insights::{
    IndicatorScorer, InsightBoard, MomentumScorer, NeutralSentimentSource, SentimentSource,
};
use crate::market_data::MarketDataServiceTrait;
use crate::store::MarketStore;

/// Everything the jobs need, shared by the spawned loops.
struct JobContext {
    service: Arc<dyn MarketDataServiceTrait>,
    store: Arc<dyn MarketStore>,
    scorer: Arc<dyn IndicatorScorer>,
    sentiment: Arc<dyn SentimentSource>,
    board: Arc<InsightBoard>,
    config: SchedulerConfig,
}

struct Lifecycle {
    state: SchedulerState,
    stop_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

/// Periodic background jobs with coordinated shutdown.
///
/// Idle -> Running (`start`) -> Stopped (`stop`). Any other transition is
/// an error.
pub struct Scheduler {
    service: Arc<dyn MarketDataServiceTrait>,
    store: Arc<dyn MarketStore>,
    scorer: Arc<dyn IndicatorScorer>,
    sentiment: Arc<dyn SentimentSource>,
    board: Arc<InsightBoard>,
    config: SchedulerConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl Scheduler {
    pub fn new(
        service: Arc<dyn MarketDataServiceTrait>,
        store: Arc<dyn MarketStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            store,
            scorer: Arc::new(MomentumScorer::default()),
            sentiment: Arc::new(NeutralSentimentSource),
            board: Arc::new(InsightBoard::new()),
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: SchedulerState::Idle,
                stop_tx: None,
                handles: Vec::new(),
            }),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn IndicatorScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_sentiment_source(mut self, source: Arc<dyn SentimentSource>) -> Self {
        self.sentiment = source;
        self
    }

    pub fn with_board(mut self, board: Arc<InsightBoard>) -> Self {
        self.board = board;
        self
    }

    /// Where the indicator and sentiment jobs publish.
    pub fn board(&self) -> &Arc<InsightBoard> {
        &self.board
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    /// Spawn the four loops. Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lock();
        if lifecycle.state != SchedulerState::Idle {
            return Err(Error::Scheduler(format!(
                "cannot start a scheduler that is {}",
                lifecycle.state
            )));
        }

        info!("Starting market data scheduler...");
        let (stop_tx, stop_rx) = watch::channel(false);
        let ctx = Arc::new(JobContext {
            service: self.service.clone(),
            store: self.store.clone(),
            scorer: self.scorer.clone(),
            sentiment: self.sentiment.clone(),
            board: self.board.clone(),
            config: self.config.clone(),
        });
        let config = &self.config;

        lifecycle.handles = vec![
            spawn_loop("Market data collection", config.collection_interval, stop_rx.clone(), {
                let ctx = ctx.clone();
                move |_stop| {
                    let ctx = ctx.clone();
                    async move { ctx.collect_market_data().await }
                }
            }),
            spawn_loop("Indicator computation", config.indicator_interval, stop_rx.clone(), {
                let ctx = ctx.clone();
                move |stop| {
                    let ctx = ctx.clone();
                    async move { ctx.compute_indicators(stop).await }
                }
            }),
            spawn_loop("Sentiment collection", config.sentiment_interval, stop_rx.clone(), {
                let ctx = ctx.clone();
                move |stop| {
                    let ctx = ctx.clone();
                    async move { ctx.collect_sentiment(stop).await }
                }
            }),
            spawn_loop("Retention cleanup", config.retention_interval, stop_rx, {
                let ctx = ctx.clone();
                move |_stop| {
                    let ctx = ctx.clone();
                    async move { ctx.clean_up_old_data().await }
                }
            }),
        ];
        lifecycle.stop_tx = Some(stop_tx);
        lifecycle.state = SchedulerState::Running;

        info!("Scheduler started");
        Ok(())
    }

    /// Signal every loop and wait for them to exit.
    ///
    /// In-flight jobs finish first. Stopping twice, or stopping a scheduler
    /// that never started, is an error. So is a loop that panicked; the
    /// scheduler is Stopped either way.
    pub async fn stop(&self) -> Result<()> {
        let (stop_tx, handles) = {
            let mut lifecycle = self.lock();
            if lifecycle.state != SchedulerState::Running {
                return Err(Error::Scheduler(format!(
                    "cannot stop a scheduler that is {}",
                    lifecycle.state
                )));
            }
            lifecycle.state = SchedulerState::Stopped;
            (
                lifecycle.stop_tx.take(),
                std::mem::take(&mut lifecycle.handles),
            )
        };

        info!("Stopping scheduler...");
        if let Some(stop_tx) = stop_tx {
            let _ = stop_tx.send(true);
        }
        let mut failures = Vec::new();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Scheduler loop ended abnormally: {}", e);
                failures.push(e.to_string());
            }
        }
        info!("Scheduler stopped");
        if !failures.is_empty() {
            return Err(Error::Scheduler(format!(
                "{} loop(s) ended abnormally: {}",
                failures.len(),
                failures.join("; ")
            )));
        }
        Ok(())
    }
}

/// Run `job` now and then every `period` until `stop` fires.
fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut stop: watch::Receiver<bool>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn(watch::Receiver<bool>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!("{} job started ({:?} interval)", name, period);
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    if *stop.borrow() {
                        break;
                    }
                    job(stop.clone()).await;
                }
            }
        }
        info!("{} job stopped", name);
    })
}

/// Sleep between batch items. Returns `false` if stop fired meanwhile.
async fn pace(stop: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *stop.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => !*stop.borrow(),
        _ = stop.changed() => false,
    }
}

/// `now` minus `days`, or `None` if that falls outside the representable range.
fn retention_cutoff(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    chrono::Duration::try_days(i64::from(days)).and_then(|age| now.checked_sub_signed(age))
}

impl JobContext {
    async fn collect_market_data(&self) {
        info!("Collecting market data...");
        let config = &self.config;

        match self
            .service
            .refresh_market_snapshot(&config.snapshot_currency, config.snapshot_limit)
            .await
        {
            Ok(items) => info!("Collected snapshot of {} assets", items.len()),
            Err(e) => warn!("Failed to collect market snapshot: {}", e),
        }

        match self.service.refresh_global_snapshot().await {
            Ok(global) => debug!("Collected global snapshot from {}", global.source),
            Err(e) => warn!("Failed to collect global snapshot: {}", e),
        }

        let outcomes = join_all(config.tracked_assets.iter().map(|id| async move {
            let detail = self.service.refresh_asset_detail(id).await;
            let history = self
                .service
                .refresh_historical_series(
                    id,
                    &config.snapshot_currency,
                    config.collection_history_days,
                )
                .await;
            if let Err(e) = &detail {
                warn!("Failed to collect detail for {}: {}", id, e);
            }
            if let Err(e) = &history {
                warn!("Failed to collect history for {}: {}", id, e);
            }
            detail.is_ok() && history.is_ok()
        }))
        .await;

        let complete = outcomes.iter().filter(|ok| **ok).count();
        info!(
            "Market data collection finished: {}/{} assets complete",
            complete,
            outcomes.len()
        );
    }

    async fn compute_indicators(&self, mut stop: watch::Receiver<bool>) {
        info!("Computing technical indicators...");
        let config = &self.config;

        for (i, asset) in config.watched_assets.iter().enumerate() {
            if i > 0 && !pace(&mut stop, config.indicator_delay).await {
                debug!("Indicator job interrupted by stop");
                return;
            }
            match self
                .service
                .get_historical_series(
                    &asset.id,
                    &config.snapshot_currency,
                    config.indicator_history_days,
                )
                .await
            {
                Ok(series) => {
                    let analysis = self.scorer.score(&asset.symbol, &series);
                    info!(
                        "Indicators computed for {}: {}",
                        asset.symbol, analysis.summary.signal
                    );
                    self.board.publish_analysis(analysis);
                }
                Err(e) => warn!("Failed to compute indicators for {}: {}", asset.symbol, e),
            }
        }
    }

    async fn collect_sentiment(&self, mut stop: watch::Receiver<bool>) {
        info!("Collecting sentiment data...");
        let config = &self.config;

        for (i, asset) in config.watched_assets.iter().enumerate() {
            if i > 0 && !pace(&mut stop, config.sentiment_delay).await {
                debug!("Sentiment job interrupted by stop");
                return;
            }
            match self.sentiment.sentiment(&asset.symbol).await {
                Ok(reading) => {
                    debug!("Sentiment for {}: {}", asset.symbol, reading.score);
                    self.board.publish_sentiment(reading);
                }
                Err(e) => warn!("Failed to collect sentiment for {}: {}", asset.symbol, e),
            }
        }
    }

    async fn clean_up_old_data(&self) {
        let Some(cutoff) = retention_cutoff(Utc::now(), self.config.retention_days) else {
            warn!(
                "Retention horizon of {} days is out of range, skipping cleanup",
                self.config.retention_days
            );
            return;
        };
        info!("Deleting market data older than {}", cutoff);

        match self.store.delete_older_than(cutoff).await {
            Ok(removed) => info!("Retention cleanup removed {} records", removed),
            Err(e) => warn!("Retention cleanup failed: {}", e),
        }
    }
}
