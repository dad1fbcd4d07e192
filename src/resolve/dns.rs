//! # Network resolver backed by `trust-dns-resolver`.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::rr::RecordType as WireType;

use super::{Resolver, WildcardDetector, WildcardType};
use crate::error::ResolveError;
use crate::events::{DnsAnswer, RecordType, Request};

/// [`Resolver`] over real DNS.
///
/// The resolver's own cache is disabled: every guess is a fresh question and
/// caching millions of negative answers only costs memory.
pub struct DnsResolver {
    inner: TokioAsyncResolver,
    timeout: Option<Duration>,
    wildcards: WildcardDetector,
}

impl DnsResolver {
    /// Uses the public Cloudflare resolvers.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::from_config(ResolverConfig::cloudflare(), timeout)
    }

    /// Uses the given nameservers on port 53.
    pub fn with_nameservers(servers: &[IpAddr], timeout: Option<Duration>) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(servers, 53, true);
        Self::from_config(ResolverConfig::from_parts(None, vec![], group), timeout)
    }

    /// Uses the host's resolver configuration.
    pub fn from_system_conf(
        timeout: Option<Duration>,
    ) -> Result<Self, trust_dns_resolver::error::ResolveError> {
        let (config, _) = trust_dns_resolver::system_conf::read_system_conf()?;
        Ok(Self::from_config(config, timeout))
    }

    fn from_config(config: ResolverConfig, timeout: Option<Duration>) -> Self {
        let mut opts = ResolverOpts::default();
        opts.cache_size = 0;
        opts.attempts = 2;
        opts.preserve_intermediates = true;
        if let Some(t) = timeout {
            opts.timeout = t;
        }
        Self {
            inner: TokioAsyncResolver::tokio(config, opts),
            timeout,
            wildcards: WildcardDetector::new(),
        }
    }

    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Vec<DnsAnswer>, ResolveError> {
        let query = self.inner.lookup(name, to_wire(record_type));
        let result = match self.timeout {
            Some(t) => tokio::time::timeout(t, query)
                .await
                .map_err(|_| ResolveError::Timeout {
                    name: name.to_string(),
                    record_type,
                })?,
            None => query.await,
        };

        let lookup = result.map_err(|e| match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => ResolveError::NoRecords {
                name: name.to_string(),
                record_type,
            },
            ResolveErrorKind::Timeout => ResolveError::Timeout {
                name: name.to_string(),
                record_type,
            },
            _ => ResolveError::Lookup {
                name: name.to_string(),
                record_type,
                error: e.to_string(),
            },
        })?;

        let answers: Vec<DnsAnswer> = lookup
            .record_iter()
            .filter_map(|record| {
                let data = record.data()?;
                Some(DnsAnswer::new(
                    trim_dot(&record.name().to_utf8()),
                    from_wire(record.record_type()),
                    record.ttl(),
                    trim_dot(&data.to_string()),
                ))
            })
            .collect();

        if answers.is_empty() {
            return Err(ResolveError::NoRecords {
                name: name.to_string(),
                record_type,
            });
        }
        Ok(answers)
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, name: &str, record_type: RecordType) -> Result<Vec<DnsAnswer>, ResolveError> {
        self.lookup(name, record_type).await
    }

    async fn classify(&self, req: &Request) -> WildcardType {
        self.wildcards.classify(self, &req.name).await
    }

    async fn matches_wildcard(&self, req: &Request) -> bool {
        self.wildcards.matches(self, req).await
    }
}

impl std::fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn trim_dot(s: &str) -> String {
    s.trim_end_matches('.').to_lowercase()
}

fn to_wire(rt: RecordType) -> WireType {
    match rt {
        RecordType::A => WireType::A,
        RecordType::AAAA => WireType::AAAA,
        RecordType::CNAME => WireType::CNAME,
        RecordType::NS => WireType::NS,
        RecordType::MX => WireType::MX,
        RecordType::TXT => WireType::TXT,
        RecordType::PTR => WireType::PTR,
        RecordType::SOA => WireType::SOA,
        RecordType::SRV => WireType::SRV,
        RecordType::Other(code) => WireType::from(code),
    }
}

fn from_wire(rt: WireType) -> RecordType {
    match rt {
        WireType::A => RecordType::A,
        WireType::AAAA => RecordType::AAAA,
        WireType::CNAME => RecordType::CNAME,
        WireType::NS => RecordType::NS,
        WireType::MX => RecordType::MX,
        WireType::TXT => RecordType::TXT,
        WireType::PTR => RecordType::PTR,
        WireType::SOA => RecordType::SOA,
        WireType::SRV => RecordType::SRV,
        other => RecordType::Other(u16::from(other)),
    }
}
