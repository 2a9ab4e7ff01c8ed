//! Polling driver.
//!
//! Runs the aggregator on a fixed period and on demand, keeps the latest
//! report and republishes every new report to subscribers.

use crate::health::{HealthAggregator, HealthReport};
use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Buffered reports per subscriber before it starts lagging.
const SUBSCRIBER_CAPACITY: usize = 16;

/// Shortest schedule period accepted by [`HealthDriver::new`].
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

type Cycle = Shared<BoxFuture<'static, Arc<HealthReport>>>;
type InFlight = Arc<Mutex<Option<(u64, Cycle)>>>;

/// Caches and republishes health reports.
#[derive(Clone)]
pub struct HealthDriver {
    aggregator: Arc<HealthAggregator>,
    /// Latest report; replaced whole, never mutated.
    latest: Arc<ArcSwapOption<HealthReport>>,
    /// Cycle currently running, tagged with its sequence number.
    in_flight: InFlight,
    next_cycle: Arc<AtomicU64>,
    updates: broadcast::Sender<Arc<HealthReport>>,
    interval: Duration,
}

impl HealthDriver {
    /// Create a driver scheduling a cycle every `interval`.
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] (including zero) are raised to
    /// it.
    pub fn new(aggregator: HealthAggregator, interval: Duration) -> Self {
        let (updates, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            aggregator: Arc::new(aggregator),
            latest: Arc::new(ArcSwapOption::empty()),
            in_flight: Arc::new(Mutex::new(None)),
            next_cycle: Arc::new(AtomicU64::new(0)),
            updates,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Latest report without triggering a cycle.
    pub fn latest(&self) -> Option<Arc<HealthReport>> {
        self.latest.load_full()
    }

    /// Latest report, running a cycle first if none has completed yet.
    pub async fn current_report(&self) -> Arc<HealthReport> {
        match self.latest() {
            Some(report) => report,
            None => self.refresh().await,
        }
    }

    /// `true` iff the current report is healthy.
    pub async fn is_healthy(&self) -> bool {
        self.current_report().await.is_healthy()
    }

    /// Run a cycle now. Callers arriving while a cycle is running wait for
    /// that cycle instead of starting another one.
    ///
    /// The cycle runs on its own task: dropping every caller does not pause
    /// it, and its report is still cached and published.
    pub async fn refresh(&self) -> Arc<HealthReport> {
        let cycle = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some((id, cycle)) => {
                    debug!(cycle = id, "joining in-flight health check cycle");
                    cycle.clone()
                }
                None => {
                    let id = self.next_cycle.fetch_add(1, Ordering::Relaxed);
                    let cycle = self.start_cycle(id);
                    *slot = Some((id, cycle.clone()));
                    cycle
                }
            }
        };

        cycle.await
    }

    /// Receive every report produced from now on. Slow receivers may observe
    /// `RecvError::Lagged` and skip ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<HealthReport>> {
        self.updates.subscribe()
    }

    /// Spawn cycle `id`. The task publishes its own result and then frees the
    /// in-flight slot, so the cache and the subscribers are updated exactly
    /// once however many callers await it. Must be called with the slot
    /// locked.
    fn start_cycle(&self, id: u64) -> Cycle {
        let aggregator = Arc::clone(&self.aggregator);
        let latest = Arc::clone(&self.latest);
        let updates = self.updates.clone();
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move {
            let report = Arc::new(aggregator.check_all().await);
            latest.store(Some(Arc::clone(&report)));
            // No subscribers is fine
            let _ = updates.send(Arc::clone(&report));

            let mut slot = in_flight.lock();
            if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                slot.take();
            }
            report
        });

        let aggregator = Arc::clone(&self.aggregator);
        async move {
            match task.await {
                Ok(report) => report,
                Err(e) => {
                    error!(cycle = id, error = %e, "health check cycle task failed");
                    Arc::new(aggregator.failure_report())
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Run scheduled cycles until shutdown. The first cycle starts immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "health driver starting"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        report = self.refresh() => {
                            debug!(status = %report.status, "scheduled health check complete");
                        }
                        _ = shutdown.recv() => {
                            info!("health driver shutting down");
                            break;
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("health driver shutting down");
                    break;
                }
            }
        }
    }
}
