//! DNS resolution and wildcard classification.
//!
//! The services only see the [`Resolver`] trait:
//! - [`Resolver::resolve`]: one query for one record type;
//! - [`Resolver::classify`]: wildcard classification of a subdomain;
//! - [`Resolver::matches_wildcard`]: whether a resolved result is wildcard noise.
//!
//! Implementations:
//! - [`DnsResolver`]: `trust-dns-resolver` with a [`WildcardDetector`];
//! - [`StaticResolver`]: table-driven, no network (tests, offline replays).
//!
//! [`query_candidate`] is the per-candidate routine shared by the brute-force
//! engine and the name service.

mod dns;
mod fixed;
mod wildcard;

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::events::{DnsAnswer, RecordType, Request};

pub use dns::DnsResolver;
pub use fixed::StaticResolver;
pub use wildcard::WildcardDetector;

/// Record types queried per candidate, in order.
///
/// A successful `CNAME` ends the sequence: the alias target is definitive.
pub const QUERY_TYPES: [RecordType; 3] = [RecordType::CNAME, RecordType::A, RecordType::AAAA];

/// Wildcard classification of a subdomain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WildcardType {
    /// Random names below it do not resolve.
    Normal,
    /// Random names below it resolve to one fixed answer set.
    Static,
    /// Random names below it resolve to changing answers; never brute force it.
    Dynamic,
}

/// Resolution capability consumed by the services.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Queries `name` for `record_type`.
    ///
    /// An empty answer is reported as [`ResolveError::NoRecords`].
    async fn resolve(&self, name: &str, record_type: RecordType) -> Result<Vec<DnsAnswer>, ResolveError>;

    /// Classifies `req.name` as a wildcard parent.
    async fn classify(&self, req: &Request) -> WildcardType;

    /// True if the resolved `req` is explained by a wildcard above it.
    async fn matches_wildcard(&self, req: &Request) -> bool;
}

/// Resolves one candidate over [`QUERY_TYPES`].
///
/// `on_query` runs after every answered query (metrics, heartbeat). Errors
/// are expected (most guesses do not exist) and are dropped here; an empty
/// result means "discard".
pub async fn query_candidate<R, F>(resolver: &R, name: &str, mut on_query: F) -> Vec<DnsAnswer>
where
    R: Resolver + ?Sized,
    F: FnMut(),
{
    let mut answers = Vec::new();
    for record_type in QUERY_TYPES {
        let resolved = resolver.resolve(name, record_type).await;
        on_query();
        if let Ok(found) = resolved {
            answers.extend(found);
            if record_type == RecordType::CNAME {
                break;
            }
        }
    }
    answers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cname_ends_the_sequence() {
        let resolver = StaticResolver::new()
            .with_record(DnsAnswer::new("www.example.com", RecordType::CNAME, 60, "edge.net"))
            .with_record(DnsAnswer::new("www.example.com", RecordType::A, 60, "192.0.2.1"));

        let mut queries = 0;
        let answers = query_candidate(&resolver, "www.example.com", || queries += 1).await;

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].record_type, RecordType::CNAME);
        assert_eq!(queries, 1);
        assert_eq!(resolver.queries_for("www.example.com"), vec![RecordType::CNAME]);
    }

    #[tokio::test]
    async fn falls_through_to_address_records() {
        let resolver = StaticResolver::new()
            .with_record(DnsAnswer::new("mail.example.com", RecordType::A, 60, "192.0.2.25"))
            .with_record(DnsAnswer::new("mail.example.com", RecordType::AAAA, 60, "2001:db8::25"));

        let answers = query_candidate(&resolver, "mail.example.com", || {}).await;
        assert_eq!(answers.len(), 2);
        assert_eq!(
            resolver.queries_for("mail.example.com"),
            vec![RecordType::CNAME, RecordType::A, RecordType::AAAA]
        );

        assert!(query_candidate(&resolver, "nope.example.com", || {}).await.is_empty());
    }
}
