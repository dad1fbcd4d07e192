//! # Name resolution consumer.
//!
//! [`NameService`] turns scraped candidates into confirmed results and
//! confirmed results into subdomain discoveries:
//!
//! ```text
//! NewName ──► clean + scope + dedup ──► queue ──► permit ──► CNAME → A → AAAA
//!                                                              │ wildcard filter
//!                                                              ▼
//!                                                        NameResolved
//!
//! NameResolved ──► parent subdomain below root? ──► count += 1 ──► NewSubdomain(times = count)
//! ```
//!
//! Provenance (tag, source) of a scraped name is kept on the resolved result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ServiceError;
use crate::events::{Event, EventBus, Request, Topic};
use crate::primitives::{Semaphore, StringFilter};
use crate::resolve::{Resolver, query_candidate};
use crate::service::{Service, ServiceBase};
use crate::subscribers::Subscribe;

/// Resolves `NewName` candidates and reports confirmed subdomains.
pub struct NameService {
    base: ServiceBase,
    resolver: Arc<dyn Resolver>,
    filter: StringFilter,
    semaphore: Semaphore,
    pending: Arc<AtomicUsize>,
    counted: StringFilter,
    subdomains: DashMap<String, usize>,
}

impl NameService {
    pub fn new(config: Arc<Config>, bus: EventBus, resolver: Arc<dyn Resolver>) -> Self {
        let semaphore = Semaphore::new(config.dns_query_limit());
        let base = ServiceBase::new("Name Service", config, bus);
        let pending = Arc::new(AtomicUsize::new(0));
        {
            let pending = Arc::clone(&pending);
            base.metrics()
                .names_remaining_probe(move || pending.load(Ordering::SeqCst));
        }
        Self {
            base,
            resolver,
            filter: StringFilter::new(),
            semaphore,
            pending,
            counted: StringFilter::new(),
            subdomains: DashMap::new(),
        }
    }

    /// Names queued or being resolved.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Confirmed names seen below `subdomain` so far.
    pub fn discoveries(&self, subdomain: &str) -> usize {
        self.subdomains.get(subdomain).map_or(0, |c| *c)
    }

    /// Accepts a scraped candidate if it is new and in scope.
    fn accept(&self, req: &Request) {
        if self.base.lifecycle().is_stopping() {
            return;
        }
        let cfg = self.base.config();
        let name = clean_name(&req.name);
        if name.is_empty() || !cfg.is_domain_in_scope(&name) || self.filter.duplicate(&name) {
            return;
        }
        let domain = match cfg.root_domain_of(&name) {
            Some(root) => root.to_string(),
            None => return,
        };

        let mut accepted = Request::new(name, domain).with_tag(req.tag);
        accepted.source = req.source.clone();
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.base.send_request(Arc::new(accepted));
    }

    async fn resolve(&self, req: Arc<Request>) {
        let answers = query_candidate(self.resolver.as_ref(), &req.name, || {
            self.base.metrics().query_time(SystemTime::now());
            self.base.set_active();
        })
        .await;
        if answers.is_empty() {
            return;
        }

        let mut resolved = Request::clone(&req);
        resolved.records = answers;
        if self.resolver.matches_wildcard(&resolved).await {
            debug!(service = %self.base.name(), name = %resolved.name, "wildcard match discarded");
            return;
        }
        debug!(service = %self.base.name(), name = %resolved.name, source = %resolved.source, "name resolved");
        self.base.bus().publish(Topic::NameResolved, resolved);
    }

    /// Counts `req` towards its parent subdomain and reports the new count.
    /// A name is counted once, whichever producer resolved it.
    fn record_discovery(&self, req: &Arc<Request>) {
        let Some((_, parent)) = req.name.split_once('.') else {
            return;
        };
        let root = req.domain.as_str();
        let below_root = parent.len() > root.len()
            && parent.ends_with(root)
            && parent.as_bytes()[parent.len() - root.len() - 1] == b'.';
        if !below_root || self.counted.duplicate(&req.name) {
            return;
        }

        let times = {
            let mut count = self.subdomains.entry(parent.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let subdomain = Request {
            name: parent.to_string(),
            domain: req.domain.clone(),
            tag: req.tag,
            source: req.source.clone(),
            ..Request::default()
        };
        self.base.bus().publish_subdomain(subdomain, times);
    }
}

#[async_trait]
impl Service for NameService {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn on_start(self: Arc<Self>) -> Result<(), ServiceError> {
        let Some(mut inbox) = self.base.take_requests() else {
            return Ok(());
        };

        for topic in [Topic::NewName, Topic::NameResolved] {
            let hook = Arc::new(NameHook {
                service: Arc::downgrade(&self),
            });
            if let Err(e) = self.base.bus().subscribe(topic, hook) {
                warn!(service = %self.base.name(), topic = %topic, error = %e, label = e.as_label(), "subscription refused");
            }
        }

        let me = Arc::clone(&self);
        self.base.spawn(async move {
            let token = me.base.lifecycle().token().clone();
            while let Some(req) = me.base.next_request(&mut inbox).await {
                let Some(permit) = me.semaphore.acquire_cancellable(1, &token).await else {
                    me.pending.fetch_sub(1, Ordering::SeqCst);
                    break;
                };
                let worker = Arc::clone(&me);
                me.base.spawn(async move {
                    worker.resolve(req).await;
                    drop(permit);
                    worker.pending.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
        Ok(())
    }

    async fn on_stop(&self) {
        self.semaphore.close();
        self.pending.store(0, Ordering::SeqCst);
    }
}

struct NameHook {
    service: Weak<NameService>,
}

#[async_trait]
impl Subscribe for NameHook {
    async fn on_event(&self, event: &Event) {
        let Some(service) = self.service.upgrade() else {
            return;
        };
        match event.topic {
            Topic::NewName => service.accept(&event.request),
            Topic::NameResolved => service.record_discovery(&event.request),
            Topic::NewSubdomain => {}
        }
    }

    fn name(&self) -> &str {
        "NameService"
    }
}

/// Lowercases and trims a scraped name, dropping a leading `*.` and
/// surrounding dots.
pub fn clean_name(raw: &str) -> String {
    let name = raw.trim().to_lowercase();
    let name = name.trim_start_matches("*.");
    name.trim_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::events::{DnsAnswer, RecordType, Tag};
    use crate::resolve::StaticResolver;
    use crate::subscribers::FnSubscriber;

    fn service(resolver: StaticResolver, bus: &EventBus) -> Arc<NameService> {
        let cfg = Config {
            domains: vec!["example.com".into()],
            ..Config::default()
        };
        Arc::new(NameService::new(Arc::new(cfg), bus.clone(), Arc::new(resolver)))
    }

    fn collect(bus: &EventBus, topic: Topic) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(
            topic,
            FnSubscriber::arc("collect", move |e: &Event| sink.lock().unwrap().push(e.clone())),
        )
        .unwrap();
        seen
    }

    async fn drain(svc: &NameService) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while svc.pending() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("name service did not drain");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn cleans_scraped_names() {
        assert_eq!(clean_name(" *.WWW.Example.com. "), "www.example.com");
        assert_eq!(clean_name(".mail.example.com"), "mail.example.com");
        assert_eq!(clean_name("*."), "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn resolves_scraped_names_once_and_keeps_provenance() {
        let resolver = StaticResolver::new()
            .with_record(DnsAnswer::new("api.example.com", RecordType::A, 60, "192.0.2.7"));
        let bus = EventBus::new();
        let resolved = collect(&bus, Topic::NameResolved);
        let svc = service(resolver, &bus);
        Arc::clone(&svc).start().unwrap();

        for raw in ["API.example.com", "*.api.example.com", "api.example.org", "gone.example.com"] {
            let req = Request::new(raw, "example.com")
                .with_tag(Tag::Cert)
                .with_source("crt.sh");
            bus.publish(Topic::NewName, req);
        }
        drain(&svc).await;
        svc.stop().await;

        let resolved = resolved.lock().unwrap();
        assert_eq!(resolved.len(), 1);
        let req = &resolved[0].request;
        assert_eq!(req.name, "api.example.com");
        assert_eq!(req.tag, Tag::Cert);
        assert_eq!(req.source, "crt.sh");
        assert!(req.has_address());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn counts_discoveries_below_the_root() {
        let bus = EventBus::new();
        let found = collect(&bus, Topic::NewSubdomain);
        let svc = service(StaticResolver::new(), &bus);
        Arc::clone(&svc).start().unwrap();

        for name in ["www.example.com", "a.dev.example.com", "b.dev.example.com"] {
            bus.publish(Topic::NameResolved, Request::new(name, "example.com"));
        }
        drain(&svc).await;
        svc.stop().await;

        assert_eq!(svc.discoveries("dev.example.com"), 2);
        assert_eq!(svc.discoveries("example.com"), 0);
        let found = found.lock().unwrap();
        let times: Vec<_> = found.iter().map(|e| (e.request.name.clone(), e.times)).collect();
        assert_eq!(
            times,
            vec![
                ("dev.example.com".to_string(), Some(1)),
                ("dev.example.com".to_string(), Some(2)),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn repeated_results_count_once() {
        let bus = EventBus::new();
        let found = collect(&bus, Topic::NewSubdomain);
        let svc = service(StaticResolver::new(), &bus);
        Arc::clone(&svc).start().unwrap();

        let brute = Request::new("a.dev.example.com", "example.com").with_tag(Tag::Brute);
        let cert = Request::new("a.dev.example.com", "example.com").with_tag(Tag::Cert);
        bus.publish(Topic::NameResolved, brute);
        bus.publish(Topic::NameResolved, cert);
        drain(&svc).await;
        svc.stop().await;

        assert_eq!(svc.discoveries("dev.example.com"), 1);
        let found = found.lock().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].times, Some(1));
    }
}
