//! One sampling cycle, and the bounded loop that repeats it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, error, info, info_span, warn};

use crate::aggregate::aggregate;
use crate::clock::Clock;
use crate::feed::FeedClient;
use crate::routes::{RouteTitleCache, TitleRefresh};
use crate::store::{Appended, Granularity, PartitionedStore};

/// Nominal spacing between cycles.
pub const CYCLE_INTERVAL: Duration = Duration::from_secs(60);

/// How cycles are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Cycles repeat every `interval` until `budget` has elapsed or shutdown.
    Bounded { interval: Duration, budget: Duration },
    /// Exactly one cycle per external trigger.
    SingleShot,
}

impl TriggerMode {
    pub fn bounded_days(days: u32) -> Self {
        TriggerMode::Bounded {
            interval: CYCLE_INTERVAL,
            budget: Duration::from_secs(u64::from(days) * 24 * 60 * 60),
        }
    }

    /// A long-running loop accumulates into daily partitions; triggered
    /// invocations each write their own.
    pub fn granularity(&self) -> Granularity {
        match self {
            TriggerMode::Bounded { .. } => Granularity::Daily,
            TriggerMode::SingleShot => Granularity::PerInvocation,
        }
    }
}

/// Outcome of one cycle, also the trigger endpoint's response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub timestamp_ms: i64,
    pub records_collected: usize,
    pub vehicles_seen: usize,
    pub partitions: Vec<String>,
    pub routes_partition: Option<String>,
    pub skipped_reason: Option<String>,
    pub error: Option<String>,
}

impl CycleReport {
    fn new(timestamp_ms: i64) -> Self {
        Self {
            success: true,
            timestamp: DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_default(),
            timestamp_ms,
            records_collected: 0,
            vehicles_seen: 0,
            partitions: Vec::new(),
            routes_partition: None,
            skipped_reason: None,
            error: None,
        }
    }

    fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skipped_reason = Some(reason.into());
        self
    }
}

/// Totals across a bounded run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub cycles: usize,
    pub cycles_with_data: usize,
    pub skipped_cycles: usize,
    pub failed_cycles: usize,
    pub records_collected: usize,
}

impl RunStats {
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.records_collected += report.records_collected;

        if !report.success {
            self.failed_cycles += 1;
        } else if report.records_collected > 0 {
            self.cycles_with_data += 1;
        } else {
            self.skipped_cycles += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    Cancelled,
}

/// Runs fetch, aggregate, title refresh and persist for one instant.
pub struct Collector {
    feed: Arc<dyn FeedClient>,
    clock: Arc<dyn Clock>,
    store: PartitionedStore,
    titles: Mutex<RouteTitleCache>,
}

impl Collector {
    pub fn new(feed: Arc<dyn FeedClient>, clock: Arc<dyn Clock>, store: PartitionedStore) -> Self {
        let titles = RouteTitleCache::new(feed.clone(), clock.clone());
        Self::with_title_cache(feed, clock, store, titles)
    }

    pub fn with_title_cache(
        feed: Arc<dyn FeedClient>,
        clock: Arc<dyn Clock>,
        store: PartitionedStore,
        titles: RouteTitleCache,
    ) -> Self {
        Self {
            feed,
            clock,
            store,
            titles: Mutex::new(titles),
        }
    }

    pub fn store(&self) -> &PartitionedStore {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Runs one cycle. Never fails: every outcome is in the report.
    pub async fn run_cycle(&self) -> CycleReport {
        let as_of_ms = self.clock.now_ms();
        self.cycle(as_of_ms)
            .instrument(info_span!("collect_cycle", as_of_ms))
            .await
    }

    async fn cycle(&self, as_of_ms: i64) -> CycleReport {
        let mut report = CycleReport::new(as_of_ms);

        let observations = match self.feed.fetch_vehicle_observations().await {
            Ok(observations) => observations,
            Err(e) => {
                warn!(error = %e, "Vehicle fetch failed, nothing collected this cycle");
                return report.skipped(format!("vehicle fetch failed: {e}"));
            }
        };
        if observations.is_empty() {
            info!("Feed reported no vehicles");
            return report.skipped("feed reported no vehicles");
        }

        report.vehicles_seen = observations.len();

        let records = aggregate(&observations, as_of_ms);
        let partition_key = self.store.partition_key_for(as_of_ms);

        let persist = async {
            if records.is_empty() {
                return Ok(None);
            }
            self.store.append(&partition_key, &records).await.map(Some)
        };
        let refresh = async { self.titles.lock().await.refresh_if_stale(&self.store).await };

        let (persisted, refreshed) = tokio::join!(persist, refresh);

        if let TitleRefresh::Refreshed {
            persisted: Some(location),
        } = refreshed
        {
            report.routes_partition = Some(location);
        }

        match persisted {
            Ok(Some(Appended::Written(location))) => {
                report.records_collected = records.len();
                report.partitions.push(location);
                info!(
                    vehicles = report.vehicles_seen,
                    records = report.records_collected,
                    "Cycle complete"
                );
                report
            }
            Ok(Some(Appended::AlreadyExists(location))) => {
                warn!(partition = %location, "Another invocation already wrote this minute, batch dropped");
                report.skipped("partition already written by another invocation")
            }
            Ok(None) => {
                info!(vehicles = report.vehicles_seen, "No vehicle reported a valid speed");
                report.skipped("no valid speeds reported")
            }
            Err(e) => {
                error!(error = %e, partition = %partition_key, "Failed to persist speed records");
                report.success = false;
                report.error = Some(e.to_string());
                report
            }
        }
    }

    /// Repeats cycles every `interval`, starting immediately, until `budget`
    /// has elapsed or `shutdown` resolves.
    ///
    /// Shutdown is only observed between cycles; a cycle in flight always
    /// finishes.
    pub async fn run_bounded<F>(&self, interval: Duration, budget: Duration, shutdown: F) -> (RunStats, StopReason)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let started = Instant::now();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = RunStats::default();

        let reason = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break StopReason::Cancelled,
                _ = ticker.tick() => {}
            }

            if started.elapsed() >= budget {
                break StopReason::BudgetExhausted;
            }

            let report = self.run_cycle().await;
            stats.record(&report);
        };

        info!(
            ?reason,
            cycles = stats.cycles,
            cycles_with_data = stats.cycles_with_data,
            skipped_cycles = stats.skipped_cycles,
            failed_cycles = stats.failed_cycles,
            records_collected = stats.records_collected,
            elapsed_secs = started.elapsed().as_secs(),
            "Collection stopped"
        );

        (stats, reason)
    }
}
