//! # Events delivered by the bus.
//!
//! An [`Event`] wraps one immutable [`Request`] together with the topic it was
//! published on and some delivery metadata.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Delivery across subscribers is unordered; `seq` lets a
//! consumer restore publish order if it cares.
//!
//! ## Example
//! ```rust
//! use subvisor::{Event, Request, Topic};
//!
//! let ev = Event::new(Topic::NewSubdomain, Request::new("dev.example.com", "example.com"))
//!     .with_times(2);
//!
//! assert_eq!(ev.topic, Topic::NewSubdomain);
//! assert_eq!(ev.request.name, "dev.example.com");
//! assert_eq!(ev.times, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use super::{Request, Topic};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// One published value.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock publish time.
    pub at: SystemTime,
    /// Topic the event was published on.
    pub topic: Topic,
    /// The published record, shared by every subscriber.
    pub request: Arc<Request>,
    /// Running discovery count (set on [`Topic::NewSubdomain`] only).
    pub times: Option<usize>,
}

impl Event {
    /// Creates a new event with the current timestamp and next sequence number.
    pub fn new(topic: Topic, request: impl Into<Arc<Request>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            topic,
            request: request.into(),
            times: None,
        }
    }

    /// Attaches a discovery count.
    #[inline]
    pub fn with_times(mut self, times: usize) -> Self {
        self.times = Some(times);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_increases() {
        let a = Event::new(Topic::NewName, Request::new("a.example.com", "example.com"));
        let b = Event::new(Topic::NewName, Request::new("b.example.com", "example.com"));
        assert!(b.seq > a.seq);
        assert_eq!(a.times, None);
    }
}
