//! # Wordlist brute forcing.
//!
//! [`BruteForceService`] expands the wordlist against every root domain and,
//! recursively, against newly confirmed subdomains.
//!
//! ## Architecture
//! ```text
//! roots ─────────────────────────────┐
//! NameResolved (immediate mode) ──┐  │
//! NewSubdomain (times == K) ──────┴──┴─► request queue ─► expand(seed)
//!                                                            │ dedup + dynamic-wildcard check
//!                                                            │ remaining += |wordlist|
//!                                                            ▼
//!                                      for word: checkpoint ─► acquire permit ─► spawn candidate
//!                                                                                   │ CNAME → A → AAAA
//!                                                                                   │ wildcard filter
//!                                                                                   ▼
//!                                                          publish NameResolved (tag = brute)
//!                                                          release permit, remaining -= 1
//! ```
//!
//! ## Rules
//! - Seeds are lowercased; a seed is expanded at most once.
//! - A lowercased candidate name is dispatched at most once.
//! - Seeds classified as dynamic wildcards are never expanded.
//! - Every dispatched candidate returns its permit and decrements the
//!   remaining counter exactly once, whatever the outcome.
//! - On stop, dispatching ends; admitted candidates run to completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{Config, RecursiveMode, normalize_name};
use crate::error::ServiceError;
use crate::events::{Event, EventBus, Request, Tag, Topic};
use crate::primitives::{Permit, Semaphore, StringFilter};
use crate::resolve::{Resolver, WildcardType, query_candidate};
use crate::service::{Service, ServiceBase};
use crate::subscribers::Subscribe;

/// Name used as provenance on everything this service publishes.
pub const BRUTE_FORCE_SOURCE: &str = "Brute Forcing";

const HEARTBEAT: Duration = Duration::from_secs(1);

/// Brute-force producer.
pub struct BruteForceService {
    base: ServiceBase,
    resolver: Arc<dyn Resolver>,
    filter: StringFilter,
    candidates: StringFilter,
    semaphore: Semaphore,
    remaining: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
    dispatched: AtomicUsize,
}

impl BruteForceService {
    pub fn new(config: Arc<Config>, bus: EventBus, resolver: Arc<dyn Resolver>) -> Self {
        let semaphore = Semaphore::new(config.dns_query_limit());
        let base = ServiceBase::new(BRUTE_FORCE_SOURCE, config, bus);

        let remaining = Arc::new(AtomicUsize::new(0));
        let queued = Arc::new(AtomicUsize::new(0));
        {
            let remaining = Arc::clone(&remaining);
            let queued = Arc::clone(&queued);
            base.metrics().names_remaining_probe(move || {
                remaining.load(Ordering::SeqCst) + queued.load(Ordering::SeqCst)
            });
        }

        Self {
            base,
            resolver,
            filter: StringFilter::new(),
            candidates: StringFilter::new(),
            semaphore,
            remaining,
            queued,
            dispatched: AtomicUsize::new(0),
        }
    }

    /// Candidates counted but not yet completed.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Remaining candidates plus seeds waiting for expansion.
    pub fn names_remaining(&self) -> usize {
        self.base.metrics().names_remaining()
    }

    /// Candidates dispatched since start.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Permits currently held by in-flight candidates.
    pub fn in_flight(&self) -> usize {
        self.semaphore.in_use()
    }

    /// Queues `seed` for expansion.
    pub fn submit(&self, seed: Arc<Request>) {
        if self.base.lifecycle().is_stopping() {
            return;
        }
        self.queued.fetch_add(1, Ordering::SeqCst);
        self.base.send_request(seed);
    }

    async fn expand(self: &Arc<Self>, seed: &Request) {
        let subdomain = normalize_name(&seed.name);
        let domain = normalize_name(&seed.domain);
        if subdomain.is_empty() || domain.is_empty() || self.filter.duplicate(&subdomain) {
            return;
        }

        let probe = Request::new(subdomain.clone(), domain.clone());
        if self.resolver.classify(&probe).await == WildcardType::Dynamic {
            info!(service = %self.base.name(), subdomain = %subdomain, "dynamic wildcard, not expanding");
            return;
        }

        let words = &self.base.config().wordlist;
        self.remaining.fetch_add(words.len(), Ordering::SeqCst);
        debug!(service = %self.base.name(), subdomain = %subdomain, words = words.len(), "expanding");

        let token = self.base.lifecycle().token();
        let mut next_beat = Instant::now();
        for (i, word) in words.iter().enumerate() {
            if Instant::now() >= next_beat {
                self.base.set_active();
                next_beat = Instant::now() + HEARTBEAT;
            }

            let word = word.trim().to_lowercase();
            let name = format!("{word}.{subdomain}");
            if word.is_empty() || self.candidates.duplicate(&name) {
                self.remaining.fetch_sub(1, Ordering::SeqCst);
                continue;
            }

            let permit = match self.base.lifecycle().checkpoint().await {
                Ok(()) => self.semaphore.acquire_cancellable(1, token).await,
                Err(_) => None,
            };
            let Some(permit) = permit else {
                self.remaining.fetch_sub(words.len() - i, Ordering::SeqCst);
                debug!(service = %self.base.name(), subdomain = %subdomain, "expansion stopped");
                return;
            };
            let admission = Admission {
                remaining: Arc::clone(&self.remaining),
                _permit: permit,
            };

            self.dispatched.fetch_add(1, Ordering::SeqCst);
            let me = Arc::clone(self);
            let domain = domain.clone();
            self.base.spawn(async move {
                let _admission = admission;
                me.resolve_candidate(name, domain).await;
            });
        }
    }

    async fn resolve_candidate(&self, name: String, domain: String) {
        let answers = query_candidate(self.resolver.as_ref(), &name, || {
            self.base.metrics().query_time(SystemTime::now());
            self.base.set_active();
        })
        .await;
        if answers.is_empty() {
            return;
        }

        let req = Request::new(name, domain)
            .with_tag(Tag::Brute)
            .with_source(self.base.name())
            .with_records(answers);
        if self.resolver.matches_wildcard(&req).await {
            debug!(service = %self.base.name(), name = %req.name, "wildcard match discarded");
            return;
        }

        debug!(service = %self.base.name(), name = %req.name, "candidate resolved");
        self.base.bus().publish(Topic::NameResolved, req);
    }

    fn subscribe_recursion(self: &Arc<Self>, mode: RecursiveMode) {
        let topic = match mode {
            RecursiveMode::Immediate => Topic::NameResolved,
            RecursiveMode::Threshold(_) => Topic::NewSubdomain,
        };
        let recursion = Arc::new(Recursion {
            engine: Arc::downgrade(self),
            mode,
        });
        if let Err(e) = self.base.bus().subscribe(topic, recursion) {
            warn!(service = %self.base.name(), error = %e, label = e.as_label(), "recursion disabled");
        }
    }
}

#[async_trait]
impl Service for BruteForceService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn on_start(self: Arc<Self>) -> Result<(), ServiceError> {
        let cfg = Arc::clone(self.base.config());
        if !cfg.brute_forcing {
            info!(service = %self.base.name(), "brute forcing disabled");
            return Ok(());
        }
        let Some(mut inbox) = self.base.take_requests() else {
            return Ok(());
        };

        if let Some(mode) = cfg.recursive_mode() {
            self.subscribe_recursion(mode);
        }
        for root in &cfg.domains {
            self.submit(Arc::new(Request::new(root.clone(), root.clone())));
        }

        let me = Arc::clone(&self);
        self.base.spawn(async move {
            me.base.set_active();
            while let Some(seed) = me.base.next_request(&mut inbox).await {
                me.expand(&seed).await;
                me.queued.fetch_sub(1, Ordering::SeqCst);
            }
        });
        Ok(())
    }

    async fn on_stop(&self) {
        self.semaphore.close();
        self.queued.store(0, Ordering::SeqCst);
    }
}

/// One admitted candidate: its permit and its share of the remaining counter.
struct Admission {
    remaining: Arc<AtomicUsize>,
    _permit: Permit,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.remaining.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Feeds confirmed names back into the engine as new seeds.
struct Recursion {
    engine: Weak<BruteForceService>,
    mode: RecursiveMode,
}

#[async_trait]
impl Subscribe for Recursion {
    async fn on_event(&self, event: &Event) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let req = &event.request;
        let seed = match self.mode {
            RecursiveMode::Immediate => {
                engine.base.config().is_domain_in_scope(&req.name) && req.has_address()
            }
            RecursiveMode::Threshold(k) => event.times == Some(k),
        };
        if seed {
            engine.submit(Arc::clone(req));
        }
    }

    fn name(&self) -> &str {
        "BruteForceRecursion"
    }
}
