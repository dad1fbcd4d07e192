//! # Running a connector as a service.
//!
//! ```text
//! on_start ─► resolve credentials (warn if missing)
//!          └► spawn: for root in domains:
//!                       checkpoint ─► wait rate limit ─► query ─► publish NewName per name
//! ```
//!
//! Query failures are logged and skipped; they never stop the walk.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{KeyPolicy, Source, SourceContext};
use crate::config::Config;
use crate::error::ServiceError;
use crate::events::{EventBus, Request, Topic};
use crate::service::{Service, ServiceBase};

/// Builds the HTTP client shared by every connector.
pub fn http_client(config: &Config) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "http client setup failed, using defaults");
            reqwest::Client::new()
        })
}

/// [`Service`] wrapper around one [`Source`].
pub struct SourceService<S: Source + ?Sized> {
    base: ServiceBase,
    source: Arc<S>,
    client: reqwest::Client,
    remaining: Arc<AtomicUsize>,
}

impl<S: Source + ?Sized> SourceService<S> {
    pub fn new(source: Arc<S>, config: Arc<Config>, bus: EventBus, client: reqwest::Client) -> Self {
        let base = ServiceBase::new(source.name(), config, bus);
        let remaining = Arc::new(AtomicUsize::new(0));
        {
            let remaining = Arc::clone(&remaining);
            base.metrics()
                .names_remaining_probe(move || remaining.load(Ordering::SeqCst));
        }
        Self {
            base,
            source,
            client,
            remaining,
        }
    }

    /// Root domains not yet queried.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    async fn walk(&self, ctx: SourceContext) {
        let base = &self.base;
        let token = base.lifecycle().token();
        let rate_limit = self.source.rate_limit();
        base.set_active();

        for (i, domain) in base.config().domains.iter().enumerate() {
            if base.lifecycle().checkpoint().await.is_err() {
                break;
            }
            if i > 0 && !rate_limit.is_zero() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(rate_limit) => {}
                }
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                r = self.source.query(&ctx, domain) => r,
            };
            base.metrics().query_time(SystemTime::now());
            base.set_active();

            match result {
                Ok(names) => {
                    debug!(service = %base.name(), domain = %domain, found = names.len(), "query done");
                    for name in names {
                        let req = Request::new(name, domain.clone())
                            .with_tag(self.source.tag())
                            .with_source(base.name());
                        base.bus().publish(Topic::NewName, req);
                    }
                }
                Err(e) => {
                    warn!(service = %base.name(), domain = %domain, error = %e, label = e.as_label(), "query failed");
                }
            }
            self.remaining.fetch_sub(1, Ordering::SeqCst);
        }
        self.remaining.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: Source + ?Sized> Service for SourceService<S> {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn on_start(self: Arc<Self>) -> Result<(), ServiceError> {
        let cfg = self.base.config();
        let policy = self.source.key_policy();
        let api_key = match policy {
            KeyPolicy::None => None,
            _ => cfg
                .api_key(self.source.name())
                .filter(|key| self.source.accepts_key(key))
                .cloned(),
        };

        if api_key.is_none() {
            match policy {
                KeyPolicy::None => {}
                KeyPolicy::Optional => {
                    warn!(service = %self.base.name(), "API key data was not provided, using public access")
                }
                KeyPolicy::Required => {
                    warn!(service = %self.base.name(), "API key data was not provided, source disabled");
                    return Ok(());
                }
            }
        }
        if cfg.domains.is_empty() {
            info!(service = %self.base.name(), "no root domains to query");
            return Ok(());
        }

        self.remaining.store(cfg.domains.len(), Ordering::SeqCst);
        let ctx = SourceContext {
            client: self.client.clone(),
            api_key,
        };
        let me = Arc::clone(&self);
        self.base.spawn(async move { me.walk(ctx).await });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::config::ApiKey;
    use crate::error::SourceError;
    use crate::events::{Event, Tag};
    use crate::subscribers::FnSubscriber;

    #[derive(Default)]
    struct Fake {
        policy: Option<KeyPolicy>,
        queried: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Source for Fake {
        fn name(&self) -> &str {
            "Fake"
        }

        fn tag(&self) -> Tag {
            Tag::Scrape
        }

        fn key_policy(&self) -> KeyPolicy {
            self.policy.unwrap_or(KeyPolicy::None)
        }

        async fn query(&self, ctx: &SourceContext, domain: &str) -> Result<Vec<String>, SourceError> {
            self.queried
                .lock()
                .unwrap()
                .push((domain.to_string(), ctx.api_key.is_some()));
            if domain == "broken.org" {
                return Err(SourceError::Status {
                    source_name: "Fake".into(),
                    status: 503,
                });
            }
            Ok(vec![format!("www.{domain}"), format!("api.{domain}")])
        }
    }

    fn run_config(keys: &[(&str, ApiKey)]) -> Arc<Config> {
        let mut cfg = Config {
            domains: vec!["broken.org".into(), "example.com".into()],
            ..Config::default()
        };
        for (name, key) in keys {
            cfg.set_api_key(name, key.clone());
        }
        Arc::new(cfg)
    }

    async fn run(source: Arc<Fake>, config: Arc<Config>) -> Vec<Event> {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(
            Topic::NewName,
            FnSubscriber::arc("collect", move |e: &Event| sink.lock().unwrap().push(e.clone())),
        )
        .unwrap();

        let svc = Arc::new(SourceService::new(source, config, bus.clone(), reqwest::Client::new()));
        Arc::clone(&svc).start().unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while svc.remaining() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        svc.stop().await;
        bus.shutdown().await;

        let events = seen.lock().unwrap().clone();
        events
    }

    #[tokio::test]
    async fn failures_are_skipped_and_names_published_with_provenance() {
        let source = Arc::new(Fake::default());
        let events = run(Arc::clone(&source), run_config(&[])).await;

        assert_eq!(source.queried.lock().unwrap().len(), 2);
        let names: Vec<_> = events.iter().map(|e| e.request.name.clone()).collect();
        assert_eq!(names, vec!["www.example.com", "api.example.com"]);
        assert!(events.iter().all(|e| e.request.tag == Tag::Scrape));
        assert!(events.iter().all(|e| e.request.source == "Fake"));
        assert!(events.iter().all(|e| e.request.domain == "example.com"));
    }

    #[tokio::test]
    async fn required_key_missing_disables_the_source() {
        let source = Arc::new(Fake {
            policy: Some(KeyPolicy::Required),
            ..Fake::default()
        });
        let events = run(Arc::clone(&source), run_config(&[])).await;
        assert!(events.is_empty());
        assert!(source.queried.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn configured_key_reaches_the_connector() {
        let source = Arc::new(Fake {
            policy: Some(KeyPolicy::Optional),
            ..Fake::default()
        });
        run(Arc::clone(&source), run_config(&[("fake", ApiKey::new("k"))])).await;
        assert!(source.queried.lock().unwrap().iter().all(|(_, keyed)| *keyed));
    }
}
