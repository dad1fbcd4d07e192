use std::sync::Arc;

use tracing::warn;

use super::enumeration::{Enumeration, ResultSink};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{EventBus, Topic};
use crate::resolve::{DnsResolver, Resolver};
use crate::service::Service;
use crate::services::{BruteForceService, NameService};
use crate::sources::{self, Source, SourceService};
use crate::subscribers::Subscribe;

/// Builder for an [`Enumeration`].
pub struct EnumerationBuilder {
    config: Config,
    resolver: Option<Arc<dyn Resolver>>,
    sources: Option<Vec<Arc<dyn Source>>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    signals: bool,
}

impl EnumerationBuilder {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config,
            resolver: None,
            sources: None,
            subscribers: Vec::new(),
            signals: true,
        }
    }

    /// Resolver used by every service. Defaults to [`DnsResolver`] on the
    /// system configuration (Cloudflare if that cannot be read).
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Intelligence sources to run. Defaults to [`sources::all`].
    ///
    /// Ignored when `Config::sources_enabled` is false.
    pub fn with_sources(mut self, sources: Vec<Arc<dyn Source>>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Extra subscribers; each receives every topic.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Whether OS termination signals stop the run (default: on).
    pub fn with_signals(mut self, enabled: bool) -> Self {
        self.signals = enabled;
        self
    }

    /// Wires the bus and constructs every service.
    ///
    /// Must be called within a tokio runtime: every subscription gets its
    /// own worker task.
    pub fn build(self) -> Result<Enumeration, RuntimeError> {
        let config = Arc::new(self.config);
        let bus = EventBus::new();

        for sub in self.subscribers {
            for topic in Topic::ALL {
                bus.subscribe(topic, Arc::clone(&sub))?;
            }
        }
        let sink = Arc::new(ResultSink::new());
        bus.subscribe(Topic::NameResolved, sink.clone())?;

        let resolver = match self.resolver {
            Some(r) => r,
            None => {
                let timeout = config.query_timeout();
                let dns = DnsResolver::from_system_conf(timeout).unwrap_or_else(|e| {
                    warn!(error = %e, "system resolver configuration unavailable, using public resolvers");
                    DnsResolver::new(timeout)
                });
                Arc::new(dns)
            }
        };

        let mut services: Vec<Arc<dyn Service>> = vec![
            Arc::new(NameService::new(config.clone(), bus.clone(), resolver.clone())),
            Arc::new(BruteForceService::new(config.clone(), bus.clone(), resolver)),
        ];
        if config.sources_enabled {
            let client = sources::http_client(&config);
            for source in self.sources.unwrap_or_else(sources::all) {
                services.push(Arc::new(SourceService::new(
                    source,
                    config.clone(),
                    bus.clone(),
                    client.clone(),
                )));
            }
        }

        Ok(Enumeration::new_internal(config, bus, services, sink, self.signals))
    }
}
