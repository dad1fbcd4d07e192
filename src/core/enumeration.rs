//! # Enumeration: runs every service to completion.
//!
//! The [`Enumeration`] owns the bus, the services and the result sink. It
//! starts the services, closes the registration phase, watches for idleness
//! and performs the graceful shutdown.
//!
//! ## Architecture
//! ```text
//! build():
//!   subscribers ─► bus (all topics)      ResultSink ─► bus (NameResolved)
//!   NameService, BruteForceService, SourceService<Crtsh>, ... (constructed, not started)
//!
//! run():
//!   start every service (they subscribe) ─► bus.seal()
//!   select! {
//!     stop()             ─┐
//!     OS signal          ─┼─► shutdown
//!     idle detector      ─┘     └─ every service stop() within grace, then bus.shutdown()
//!   }
//!   ─► unique results, in discovery order
//!
//! idle detector (every idle_check_interval, after one active_window):
//!   Σ names_remaining == 0  &&  no service active  ─► idle
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use subvisor::{Config, Enumeration};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.add_domain("example.com");
//!     cfg.wordlist = vec!["www".into(), "mail".into()];
//!
//!     let run = Enumeration::builder(cfg).build()?;
//!     for req in run.run().await? {
//!         println!("{}", req.name);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::EnumerationBuilder;
use super::shutdown;
use crate::config::Config;
use crate::error::{RuntimeError, ServiceError};
use crate::events::{Event, EventBus, Request};
use crate::metrics::ServiceStats;
use crate::primitives::StringFilter;
use crate::service::{Service, ServiceState};
use crate::subscribers::Subscribe;

/// Collects unique resolved names.
pub(crate) struct ResultSink {
    seen: StringFilter,
    found: Mutex<Vec<Arc<Request>>>,
    output: Mutex<Option<mpsc::UnboundedSender<Arc<Request>>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Arc<Request>>>>,
}

impl ResultSink {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            seen: StringFilter::new(),
            found: Mutex::new(Vec::new()),
            output: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        }
    }

    fn results(&self) -> Vec<Arc<Request>> {
        self.found.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn close(&self) {
        self.output.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[async_trait]
impl Subscribe for ResultSink {
    async fn on_event(&self, event: &Event) {
        let req = &event.request;
        if self.seen.duplicate(&req.name) {
            return;
        }
        debug!(name = %req.name, tag = %req.tag, source = %req.source, "name discovered");
        self.found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(req));
        if let Some(tx) = self.output.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            let _ = tx.send(Arc::clone(req));
        }
    }

    fn name(&self) -> &str {
        "ResultSink"
    }
}

/// One run-to-completion enumeration job.
pub struct Enumeration {
    config: Arc<Config>,
    bus: EventBus,
    services: Vec<Arc<dyn Service>>,
    sink: Arc<ResultSink>,
    token: CancellationToken,
    started: AtomicBool,
    signals: bool,
}

impl Enumeration {
    /// Starts building an enumeration over `config`.
    pub fn builder(config: Config) -> EnumerationBuilder {
        EnumerationBuilder::new(config)
    }

    pub(crate) fn new_internal(
        config: Arc<Config>,
        bus: EventBus,
        services: Vec<Arc<dyn Service>>,
        sink: Arc<ResultSink>,
        signals: bool,
    ) -> Self {
        Self {
            config,
            bus,
            services,
            sink,
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
            signals,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Names of the managed services, in start order.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name().to_string()).collect()
    }

    /// Streams unique results as they are found; only the first call gets
    /// the receiver. The stream ends after shutdown.
    pub fn output(&self) -> Option<mpsc::UnboundedReceiver<Arc<Request>>> {
        self.sink
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Unique results so far, in discovery order.
    pub fn results(&self) -> Vec<Arc<Request>> {
        self.sink.results()
    }

    /// Per-service stats snapshots.
    pub fn stats(&self) -> Vec<ServiceStats> {
        self.services.iter().map(|s| s.stats()).collect()
    }

    /// Sum of every service's outstanding work.
    pub fn names_remaining(&self) -> usize {
        self.services
            .iter()
            .map(|s| s.base().metrics().names_remaining())
            .sum()
    }

    /// Pauses every service.
    pub fn pause(&self) -> Result<(), ServiceError> {
        self.services.iter().try_for_each(|s| s.pause())
    }

    /// Resumes every service.
    pub fn resume(&self) -> Result<(), ServiceError> {
        self.services.iter().try_for_each(|s| s.resume())
    }

    /// Ends the run early; [`Enumeration::run`] shuts down and returns.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Runs until idle, [`Enumeration::stop`], or an OS signal.
    ///
    /// Returns the unique resolved names in discovery order. Callable once.
    pub async fn run(&self) -> Result<Vec<Arc<Request>>, RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyStarted {
                service: "enumeration".into(),
            }
            .into());
        }

        for svc in &self.services {
            Arc::clone(svc).start()?;
        }
        self.bus.seal();
        info!(
            domains = ?self.config.domains,
            services = self.services.len(),
            "enumeration started"
        );

        let reason: Result<&'static str, RuntimeError> = tokio::select! {
            biased;
            _ = self.token.cancelled() => Ok("stop requested"),
            signal = self.signal() => signal.map_err(RuntimeError::from),
            _ = self.wait_idle() => Ok("enumeration complete"),
        };
        match &reason {
            Ok(reason) => info!(reason = %reason, "shutting down"),
            Err(e) => warn!(error = %e, label = e.as_label(), "shutting down"),
        }

        let shutdown = self.shutdown().await;
        reason?;
        shutdown?;
        Ok(self.results())
    }

    async fn signal(&self) -> std::io::Result<&'static str> {
        if !self.signals {
            return std::future::pending().await;
        }
        shutdown::wait_for_signal().await
    }

    /// Completes once nothing is outstanding and nothing was active for a
    /// full window.
    async fn wait_idle(&self) {
        let started = Instant::now();
        let period = self.config.idle_check_interval.max(Duration::from_millis(1));
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            if started.elapsed() < self.config.active_window {
                continue;
            }
            let remaining = self.names_remaining();
            let active = self.services.iter().any(|s| s.is_active());
            if remaining == 0 && !active {
                return;
            }
            debug!(remaining, active, "enumeration still busy");
        }
    }

    /// Stops every service within the grace period, then drains the bus.
    async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.token.cancel();
        let grace = self.config.grace;
        let stopped = tokio::time::timeout(grace, join_all(self.services.iter().map(|s| s.stop()))).await;

        let result = match stopped {
            Ok(_) => {
                self.bus.shutdown().await;
                info!(found = self.sink.results().len(), "all services stopped within grace");
                Ok(())
            }
            Err(_) => {
                self.bus.seal();
                let stuck: Vec<String> = self
                    .services
                    .iter()
                    .filter(|s| s.state() != ServiceState::Stopped)
                    .map(|s| s.name().to_string())
                    .collect();
                warn!(grace = ?grace, stuck = ?stuck, "grace exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.sink.close();
        result
    }
}

impl std::fmt::Debug for Enumeration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enumeration")
            .field("domains", &self.config.domains)
            .field("services", &self.service_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DnsAnswer, RecordType, Tag};
    use crate::resolve::StaticResolver;

    fn config(words: &[&str]) -> Config {
        Config {
            domains: vec!["example.com".into()],
            wordlist: words.iter().map(|w| w.to_string()).collect(),
            sources_enabled: false,
            active_window: Duration::from_millis(200),
            idle_check_interval: Duration::from_millis(20),
            grace: Duration::from_secs(5),
            ..Config::default()
        }
    }

    fn enumeration(cfg: Config, resolver: StaticResolver) -> Enumeration {
        Enumeration::builder(cfg)
            .with_resolver(Arc::new(resolver))
            .with_signals(false)
            .build()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_until_idle_and_recurses() {
        let resolver = StaticResolver::new()
            .with_record(DnsAnswer::new("www.example.com", RecordType::A, 60, "192.0.2.1"))
            .with_record(DnsAnswer::new("dev.www.example.com", RecordType::A, 60, "192.0.2.2"));
        let run = enumeration(config(&["www", "dev"]), resolver);
        let mut output = run.output().unwrap();
        assert!(run.output().is_none());

        let found = tokio::time::timeout(Duration::from_secs(10), run.run())
            .await
            .unwrap()
            .unwrap();

        let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["www.example.com", "dev.www.example.com"]);
        assert!(found.iter().all(|r| r.tag == Tag::Brute));
        assert_eq!(run.names_remaining(), 0);

        let mut streamed = Vec::new();
        while let Some(req) = output.recv().await {
            streamed.push(req.name.clone());
        }
        assert_eq!(streamed, names);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_ends_a_long_run() {
        let words: Vec<String> = (0..10_000).map(|i| format!("w{i}")).collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        let resolver = StaticResolver::new().with_latency(Duration::from_millis(10));
        let cfg = Config {
            max_dns_queries: 4,
            ..config(&words)
        };
        let run = Arc::new(enumeration(cfg, resolver));

        let stopper = {
            let run = Arc::clone(&run);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                run.pause().unwrap();
                run.resume().unwrap();
                run.stop();
            })
        };
        let found = tokio::time::timeout(Duration::from_secs(10), run.run())
            .await
            .unwrap()
            .unwrap();
        stopper.await.unwrap();

        assert!(found.is_empty());
        assert!(run.stats().iter().all(|s| s.names_remaining == 0));
        assert!(run.run().await.is_err());
    }

    #[tokio::test]
    async fn services_are_wired_in_start_order() {
        let run = enumeration(config(&[]), StaticResolver::new());
        assert_eq!(run.service_names(), vec!["Name Service", "Brute Forcing"]);

        let with_sources = Enumeration::builder(Config {
            sources_enabled: true,
            ..config(&[])
        })
        .with_resolver(Arc::new(StaticResolver::new()))
        .with_signals(false)
        .build()
        .unwrap();
        assert_eq!(
            with_sources.service_names(),
            vec![
                "Name Service",
                "Brute Forcing",
                "crt.sh",
                "Riddler",
                "IPv4Info",
                "Shodan",
                "Censys"
            ]
        );
    }
}
