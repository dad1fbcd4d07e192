//! # Shared service state.
//!
//! [`ServiceBase`] is the composition block every concrete service embeds:
//! identity, shared configuration, the bus, the lifecycle, an inbound request
//! queue, a liveness heartbeat, the metrics collector and a task tracker that
//! owns all background work.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use super::Lifecycle;
use crate::config::Config;
use crate::events::{EventBus, Request};
use crate::metrics::MetricsCollector;

/// Millisecond heartbeat relative to a fixed origin; `0` means "never".
#[derive(Debug)]
struct Heartbeat {
    origin: Instant,
    last_ms: AtomicU64,
}

impl Heartbeat {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn beat(&self) {
        let ms = self.origin.elapsed().as_millis().min(u128::from(u64::MAX - 1)) as u64;
        self.last_ms.store(ms + 1, Ordering::Relaxed);
    }

    fn age(&self) -> Option<Duration> {
        match self.last_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(
                self.origin
                    .elapsed()
                    .saturating_sub(Duration::from_millis(ms - 1)),
            ),
        }
    }
}

/// State shared by every service implementation.
#[derive(Debug)]
pub struct ServiceBase {
    name: String,
    config: Arc<Config>,
    bus: EventBus,
    lifecycle: Lifecycle,
    tracker: TaskTracker,
    requests: mpsc::UnboundedSender<Arc<Request>>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Arc<Request>>>>,
    heartbeat: Heartbeat,
    metrics: Arc<MetricsCollector>,
}

impl ServiceBase {
    /// Creates the base of a not-yet-started service.
    pub fn new(name: impl Into<String>, config: Arc<Config>, bus: EventBus) -> Self {
        let name = name.into();
        let (requests, inbox) = mpsc::unbounded_channel();
        Self {
            metrics: MetricsCollector::new(name.clone()),
            name,
            config,
            bus,
            lifecycle: Lifecycle::default(),
            tracker: TaskTracker::new(),
            requests,
            inbox: Mutex::new(Some(inbox)),
            heartbeat: Heartbeat::new(),
        }
    }

    /// Human-readable name, used as `Request::source` and in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Spawns background work owned by this service.
    ///
    /// [`Service::stop`](super::Service::stop) waits for every spawned task.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(fut)
    }

    /// Queues a request for the service's background loop.
    pub fn send_request(&self, req: Arc<Request>) {
        // The receiver is only gone after the loop exited on stop.
        let _ = self.requests.send(req);
    }

    /// Hands out the inbound queue; only the first call gets it.
    pub fn take_requests(&self) -> Option<mpsc::UnboundedReceiver<Arc<Request>>> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Waits for the next queued request, honouring pause and stop.
    ///
    /// Returns `None` once stop is requested or the queue is closed.
    pub async fn next_request(
        &self,
        inbox: &mut mpsc::UnboundedReceiver<Arc<Request>>,
    ) -> Option<Arc<Request>> {
        self.lifecycle.checkpoint().await.ok()?;
        tokio::select! {
            biased;
            _ = self.lifecycle.token().cancelled() => None,
            req = inbox.recv() => req,
        }
    }

    /// Heartbeat: signals liveness to the idle detector.
    pub fn set_active(&self) {
        self.heartbeat.beat();
    }

    /// True if the heartbeat fired within the configured active window.
    pub fn is_active(&self) -> bool {
        self.heartbeat
            .age()
            .is_some_and(|age| age <= self.config.active_window)
    }

    /// Time since the last heartbeat, if any.
    pub fn last_active(&self) -> Option<Duration> {
        self.heartbeat.age()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(window: Duration) -> ServiceBase {
        let cfg = Config {
            active_window: window,
            ..Config::default()
        };
        ServiceBase::new("svc", Arc::new(cfg), EventBus::new())
    }

    #[test]
    fn heartbeat_drives_activity() {
        let b = base(Duration::from_secs(60));
        assert!(!b.is_active());
        assert_eq!(b.last_active(), None);
        b.set_active();
        assert!(b.is_active());

        let b = base(Duration::ZERO);
        b.set_active();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!b.is_active());
    }

    #[tokio::test]
    async fn request_queue_is_handed_out_once() {
        let b = base(Duration::from_secs(1));
        let mut inbox = b.take_requests().unwrap();
        assert!(b.take_requests().is_none());

        b.send_request(Arc::new(Request::new("a.example.com", "example.com")));
        let req = b.next_request(&mut inbox).await.unwrap();
        assert_eq!(req.name, "a.example.com");

        b.lifecycle().begin_stop();
        b.send_request(Arc::new(Request::new("b.example.com", "example.com")));
        assert!(b.next_request(&mut inbox).await.is_none());
    }
}
