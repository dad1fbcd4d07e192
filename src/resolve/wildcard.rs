//! # Wildcard detection by random probing.
//!
//! To classify a subdomain `S`, three random labels are resolved under `S`
//! (`<random>.S`) over the candidate query types:
//!
//! ```text
//! no probe resolves                      → Normal
//! every probe resolves to the same set   → Static   (answers remembered)
//! anything else                          → Dynamic
//! ```
//!
//! Results are cached per subdomain; concurrent callers for the same
//! subdomain share a single probe run.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Resolver, WildcardType, query_candidate};
use crate::events::Request;

const PROBES: usize = 3;
const LABEL_LEN: usize = 12;

#[derive(Debug, Clone)]
struct Classification {
    kind: WildcardType,
    answers: BTreeSet<String>,
}

/// Per-subdomain wildcard cache.
#[derive(Debug, Default)]
pub struct WildcardDetector {
    cache: DashMap<String, Arc<OnceCell<Classification>>>,
}

impl WildcardDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `subdomain`, probing through `resolver` on first use.
    pub async fn classify<R>(&self, resolver: &R, subdomain: &str) -> WildcardType
    where
        R: Resolver + ?Sized,
    {
        self.classification(resolver, subdomain).await.kind
    }

    /// True if `req` is explained by a wildcard at any level between its
    /// parent and its root domain.
    pub async fn matches<R>(&self, resolver: &R, req: &Request) -> bool
    where
        R: Resolver + ?Sized,
    {
        let data: BTreeSet<&str> = req.records.iter().map(|r| r.data.as_str()).collect();
        let mut level = req.name.as_str();

        while let Some((_, parent)) = level.split_once('.') {
            if parent.len() < req.domain.len() || !parent.ends_with(req.domain.as_str()) {
                break;
            }
            let c = self.classification(resolver, parent).await;
            match c.kind {
                WildcardType::Dynamic => return true,
                WildcardType::Static if data.iter().any(|d| c.answers.contains(*d)) => return true,
                _ => {}
            }
            level = parent;
        }
        false
    }

    async fn classification<R>(&self, resolver: &R, subdomain: &str) -> Classification
    where
        R: Resolver + ?Sized,
    {
        let subdomain = subdomain.to_lowercase();
        let cell = self
            .cache
            .entry(subdomain.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| probe(resolver, subdomain)).await.clone()
    }
}

async fn probe<R>(resolver: &R, subdomain: String) -> Classification
where
    R: Resolver + ?Sized,
{
    let mut sets = Vec::with_capacity(PROBES);
    for _ in 0..PROBES {
        let name = format!("{}.{subdomain}", random_label());
        let answers = query_candidate(resolver, &name, || {}).await;
        sets.push(answers.into_iter().map(|a| a.data).collect::<BTreeSet<String>>());
    }

    let kind = if sets.iter().all(BTreeSet::is_empty) {
        WildcardType::Normal
    } else if sets.windows(2).all(|w| w[0] == w[1]) {
        WildcardType::Static
    } else {
        WildcardType::Dynamic
    };
    debug!(subdomain = %subdomain, kind = ?kind, "wildcard probe");

    Classification {
        kind,
        answers: sets.into_iter().flatten().collect(),
    }
}

fn random_label() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(LABEL_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DnsAnswer, RecordType};
    use crate::resolve::StaticResolver;

    #[tokio::test]
    async fn plain_zone_is_normal() {
        let resolver = StaticResolver::new();
        let detector = WildcardDetector::new();
        assert_eq!(detector.classify(&resolver, "example.com").await, WildcardType::Normal);
    }

    #[tokio::test]
    async fn fixed_catch_all_is_static_and_filters_matching_answers() {
        let resolver = StaticResolver::new().with_catch_all(
            "example.com",
            vec![DnsAnswer::new("*.example.com", RecordType::A, 60, "192.0.2.99")],
        );
        let detector = WildcardDetector::new();
        assert_eq!(detector.classify(&resolver, "example.com").await, WildcardType::Static);

        let noise = Request::new("abc.example.com", "example.com").with_records(vec![
            DnsAnswer::new("abc.example.com", RecordType::A, 60, "192.0.2.99"),
        ]);
        assert!(detector.matches(&resolver, &noise).await);

        let real = Request::new("www.example.com", "example.com").with_records(vec![
            DnsAnswer::new("www.example.com", RecordType::A, 60, "192.0.2.1"),
        ]);
        assert!(!detector.matches(&resolver, &real).await);
    }

    #[tokio::test]
    async fn random_labels_are_lowercase_alnum() {
        let label = random_label();
        assert_eq!(label.len(), LABEL_LEN);
        assert!(label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
