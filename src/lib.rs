//! # subvisor
//!
//! **Subvisor** enumerates the subdomains of a set of root domains. It
//! combines wordlist brute forcing with third-party intelligence sources, and
//! feeds every candidate through one resolution and deduplication pipeline.
//!
//! Producers and consumers are independent [`Service`]s that only meet on a
//! topic-keyed [`EventBus`]. The [`Enumeration`] starts them, watches their
//! metrics for idleness, and shuts everything down gracefully.
//!
//! ## Architecture
//! ```text
//!   ┌──────────────────┐  ┌────────────┐ ┌────────────┐ ┌────────────┐
//!   │ BruteForceService│  │   crt.sh   │ │  Riddler   │ │ Shodan ... │   (SourceService<S>)
//!   └───┬──────────▲───┘  └─────┬──────┘ └─────┬──────┘ └─────┬──────┘
//!       │          │            │ NewName      │              │
//!       │          │            ▼              ▼              ▼
//!       │          │     ┌──────────────────────────────────────────┐
//!       │          │     │                 EventBus                 │
//!       │          │     │  one FIFO queue + worker per subscriber  │
//!       │          │     └──────┬─────────────────────────▲─────────┘
//!       │          │            ▼ NewName                 │ NameResolved / NewSubdomain
//!       │          │     ┌──────────────┐                 │
//!       │          │     │ NameService  │─────────────────┘
//!       │          │     └──────────────┘
//!       │          └── NameResolved (immediate) / NewSubdomain (times == K): recursive seeds
//!       └──────────────► NameResolved (tag = brute)
//!
//!   every NameResolved ──► ResultSink (unique names) ──► Enumeration::output / run() result
//! ```
//!
//! ### Brute forcing
//! ```text
//! seed ──► dedup ──► dynamic wildcard? ──► remaining += |wordlist|
//!   for word:
//!     ├─► checkpoint (blocks while paused, unwinds on stop)
//!     ├─► acquire permit (global ceiling, cancellable)
//!     └─► spawn: CNAME ─(miss)─► A ─► AAAA ─► wildcard filter ─► publish NameResolved
//!               permit released and remaining -= 1 on every path
//! ```
//!
//! ### Completion
//! ```text
//! every idle_check_interval:
//!   Σ names_remaining == 0 && no heartbeat within active_window  ─► shutdown
//! shutdown: stop every service within grace ─► drain bus ─► results
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Bus**           | Topic-keyed publish/subscribe with isolated subscribers. | [`EventBus`], [`Subscribe`], [`Topic`]      |
//! | **Services**      | Shared lifecycle: start, pause, resume, stop, stats.     | [`Service`], [`ServiceBase`]                |
//! | **Brute forcing** | Bounded-concurrency wordlist expansion with recursion.   | [`BruteForceService`]                       |
//! | **Sources**       | Certificate, scrape and API connectors.                  | [`sources::Source`], [`SourceService`]      |
//! | **Resolution**    | DNS queries and wildcard classification.                 | [`Resolver`], [`DnsResolver`]               |
//! | **Primitives**    | Permit pool and concurrent seen-set.                     | [`Semaphore`], [`StringFilter`]             |
//! | **Run**           | Idle detection, signals, graceful shutdown.              | [`Enumeration`], [`Config`]                 |
//! | **Errors**        | Typed errors with stable log labels.                     | [`RuntimeError`], [`ServiceError`], ...     |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use subvisor::{Config, Enumeration, LogWriter, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.add_domain("example.com");
//!     cfg.wordlist = vec!["www".into(), "mail".into(), "dev".into()];
//!     cfg.min_for_recursive = 2;
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let run = Enumeration::builder(cfg).with_subscribers(subs).build()?;
//!
//!     let mut found = run.output().expect("first call");
//!     tokio::spawn(async move {
//!         while let Some(req) = found.recv().await {
//!             println!("{} ({})", req.name, req.source);
//!         }
//!     });
//!
//!     run.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod metrics;
mod primitives;
mod resolve;
mod service;
mod services;
pub mod sources;
mod subscribers;

// ---- Public re-exports ----

pub use config::{
    ApiKey, Config, DEFAULT_MAX_DNS_QUERIES, RecursiveMode, load_wordlist, normalize_name,
    subdomain_regex,
};
pub use self::core::{Enumeration, EnumerationBuilder};
pub use error::{BusError, ResolveError, RuntimeError, ServiceError, SourceError};
pub use events::{DnsAnswer, Event, EventBus, RecordType, Request, Tag, Topic};
pub use metrics::{MetricsCollector, ServiceStats};
pub use primitives::{Permit, Semaphore, StringFilter};
pub use resolve::{
    DnsResolver, QUERY_TYPES, Resolver, StaticResolver, WildcardDetector, WildcardType,
    query_candidate,
};
pub use service::{Lifecycle, Service, ServiceBase, ServiceState};
pub use services::{BRUTE_FORCE_SOURCE, BruteForceService, NameService, clean_name};
pub use sources::SourceService;
pub use subscribers::{FnSubscriber, LogWriter, Subscribe, SubscriberSet};
