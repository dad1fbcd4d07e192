//! # Per-service metrics.
//!
//! A [`MetricsCollector`] counts answered queries for one service and carries
//! an injected "names remaining" probe. The run coordinator reads
//! [`ServiceStats::names_remaining`] across all services as its completion signal.
//!
//! ## Lifecycle
//! ```text
//! ServiceBase::new ──► MetricsCollector::new
//! Service::start   ──► collector.start(stats_interval)   (reporting loop)
//!                          every tick: roll interval counters, log a stats line
//! Service::stop    ──► collector.stop()
//! ```

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

type RemainingProbe = Box<dyn Fn() -> usize + Send + Sync>;

/// Snapshot of a service's counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    /// Service name.
    pub service: String,
    /// Query rate over the last completed reporting interval.
    pub queries_per_sec: f64,
    /// Queries answered during the last completed reporting interval.
    pub queries_last_interval: u64,
    /// Queries answered since start.
    pub total_queries: u64,
    /// Time of the most recent answered query.
    pub last_query: Option<SystemTime>,
    /// Work the service still has outstanding.
    pub names_remaining: usize,
}

#[derive(Debug)]
struct Counters {
    total: u64,
    current_interval: u64,
    last_interval: u64,
    per_sec: f64,
    last_query: Option<SystemTime>,
    interval_started: Instant,
}

/// Query counters and the names-remaining probe for one service.
pub struct MetricsCollector {
    service: String,
    counters: Mutex<Counters>,
    remaining: OnceLock<RemainingProbe>,
    stop: CancellationToken,
}

impl MetricsCollector {
    pub fn new(service: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            service: service.into(),
            counters: Mutex::new(Counters {
                total: 0,
                current_interval: 0,
                last_interval: 0,
                per_sec: 0.0,
                last_query: None,
                interval_started: Instant::now(),
            }),
            remaining: OnceLock::new(),
            stop: CancellationToken::new(),
        })
    }

    /// Installs the "names remaining" probe. Only the first call takes effect.
    pub fn names_remaining_probe<F>(&self, probe: F)
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        let _ = self.remaining.set(Box::new(probe));
    }

    /// Records one answered query.
    pub fn query_time(&self, at: SystemTime) {
        let mut c = self.lock();
        c.total += 1;
        c.current_interval += 1;
        c.last_query = Some(at);
    }

    /// Current outstanding work, `0` without a probe.
    pub fn names_remaining(&self) -> usize {
        self.remaining.get().map_or(0, |probe| probe())
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ServiceStats {
        let c = self.lock();
        ServiceStats {
            service: self.service.clone(),
            queries_per_sec: c.per_sec,
            queries_last_interval: c.last_interval,
            total_queries: c.total,
            last_query: c.last_query,
            names_remaining: self.names_remaining(),
        }
    }

    /// Starts the periodic reporting loop; it ends on [`MetricsCollector::stop`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let me = Arc::clone(self);
        let period = interval.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = me.stop.cancelled() => break,
                    _ = ticker.tick() => me.report(),
                }
            }
        });
    }

    /// Stops the reporting loop.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    fn report(&self) {
        self.roll_interval();
        let stats = self.stats();
        info!(
            service = %stats.service,
            qps = %format!("{:.1}", stats.queries_per_sec),
            queries = stats.queries_last_interval,
            total = stats.total_queries,
            remaining = stats.names_remaining,
            "stats"
        );
    }

    fn roll_interval(&self) {
        let mut c = self.lock();
        let elapsed = c.interval_started.elapsed().as_secs_f64();
        c.per_sec = if elapsed > 0.0 {
            c.current_interval as f64 / elapsed
        } else {
            0.0
        };
        c.last_interval = c.current_interval;
        c.current_interval = 0;
        c.interval_started = Instant::now();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("service", &self.service)
            .field("has_probe", &self.remaining.get().is_some())
            .finish_non_exhaustive()
    }
}
