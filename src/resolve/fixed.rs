//! # Table-driven resolver.
//!
//! Answers come from an in-memory table; nothing touches the network.
//! Every query is recorded so callers can assert on what was asked, and the
//! peak number of concurrent queries is tracked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Resolver, WildcardDetector, WildcardType};
use crate::error::ResolveError;
use crate::events::{DnsAnswer, RecordType, Request};

/// [`Resolver`] answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticResolver {
    records: HashMap<(String, RecordType), Vec<DnsAnswer>>,
    catch_all: Vec<(String, Vec<DnsAnswer>)>,
    dynamic: Vec<String>,
    latency: Option<Duration>,
    wildcards: WildcardDetector,
    queries: Mutex<Vec<(String, RecordType)>>,
    rotation: AtomicU32,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one answer for `answer.name` / `answer.record_type`.
    pub fn with_record(mut self, answer: DnsAnswer) -> Self {
        let key = (answer.name.to_lowercase(), answer.record_type);
        self.records.entry(key).or_default().push(answer);
        self
    }

    /// Every unknown name below `zone` answers with `answers`.
    pub fn with_catch_all(mut self, zone: &str, answers: Vec<DnsAnswer>) -> Self {
        self.catch_all.push((zone.to_lowercase(), answers));
        self
    }

    /// Every unknown name below `zone` answers an `A` record that changes on
    /// each query.
    pub fn with_dynamic_wildcard(mut self, zone: &str) -> Self {
        self.dynamic.push(zone.to_lowercase());
        self
    }

    /// Delays every query.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// All queries so far, in order.
    pub fn queries(&self) -> Vec<(String, RecordType)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Types queried for `name`, in order.
    pub fn queries_for(&self, name: &str) -> Vec<RecordType> {
        self.queries()
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, rt)| rt)
            .collect()
    }

    /// Number of distinct names queried (wildcard probes included).
    pub fn names_queried(&self) -> usize {
        let mut names: Vec<String> = self.queries().into_iter().map(|(n, _)| n).collect();
        names.sort();
        names.dedup();
        names.len()
    }

    /// Highest number of queries that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn answer(&self, name: &str, record_type: RecordType) -> Vec<DnsAnswer> {
        if let Some(found) = self.records.get(&(name.to_string(), record_type)) {
            return found.clone();
        }
        if self.records.keys().any(|(n, _)| n == name) {
            return Vec::new();
        }

        if record_type == RecordType::A && self.dynamic.iter().any(|zone| below(name, zone)) {
            let n = self.rotation.fetch_add(1, Ordering::Relaxed);
            let data = format!("198.51.{}.{}", (n >> 8) & 0xff, n & 0xff);
            return vec![DnsAnswer::new(name, RecordType::A, 60, data)];
        }

        self.catch_all
            .iter()
            .filter(|(zone, _)| below(name, zone))
            .flat_map(|(_, answers)| answers.iter())
            .filter(|a| a.record_type == record_type)
            .map(|a| DnsAnswer::new(name, a.record_type, a.ttl, a.data.clone()))
            .collect()
    }
}

fn below(name: &str, zone: &str) -> bool {
    name.len() > zone.len() && name.ends_with(zone) && name.as_bytes()[name.len() - zone.len() - 1] == b'.'
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, name: &str, record_type: RecordType) -> Result<Vec<DnsAnswer>, ResolveError> {
        let name = name.to_lowercase();
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.clone(), record_type));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let answers = self.answer(&name, record_type);
        if answers.is_empty() {
            return Err(ResolveError::NoRecords { name, record_type });
        }
        Ok(answers)
    }

    async fn classify(&self, req: &Request) -> WildcardType {
        self.wildcards.classify(self, &req.name).await
    }

    async fn matches_wildcard(&self, req: &Request) -> bool {
        self.wildcards.matches(self, req).await
    }
}
