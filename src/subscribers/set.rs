//! # SubscriberSet: non-blocking fan-out for one topic
//!
//! [`SubscriberSet`] distributes each [`Event`] to every subscriber of a topic
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Arc<Event>)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//!
//! ## What it does **not** guarantee
//! - No ordering across different subscribers.
//! - No delivery after [`SubscriberSet::close`].
//!
//! ## Diagram
//! ```text
//!    emit(&Arc<Event>)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```
//!
//! Queues are unbounded: publishers never wait and never lose a discovery.
//! Growth is bounded upstream by the brute-force semaphore.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use crate::events::Event;

use super::Subscribe;

/// Per-subscriber channel with metadata
struct SubscriberChannel {
    name: String,
    sender: mpsc::UnboundedSender<Arc<Event>>,
}

/// Fan-out over the subscribers of a single topic.
#[derive(Default)]
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
}

impl SubscriberSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber and spawns its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add(&mut self, sub: Arc<dyn Subscribe>) -> JoinHandle<()> {
        let name = sub.name().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Event>>();

        let handle = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let fut = sub.on_event(ev.as_ref());
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    warn!(
                        subscriber = sub.name(),
                        topic = %ev.topic,
                        name = %ev.request.name,
                        panic = panic_message(panic_err.as_ref()),
                        "subscriber panicked"
                    );
                }
            }
        });

        self.channels.push(SubscriberChannel { name, sender: tx });
        handle
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// If a subscriber's worker is gone, the event is dropped for it and a
    /// warning is logged with the subscriber's name.
    pub fn emit(&self, event: &Arc<Event>) {
        for channel in &self.channels {
            if channel.sender.send(Arc::clone(event)).is_err() {
                warn!(
                    subscriber = %channel.name,
                    topic = %event.topic,
                    "subscriber dropped event: worker closed"
                );
            }
        }
    }

    /// Closes every queue; workers exit after draining what is already queued.
    pub fn close(&mut self) {
        self.channels.clear();
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::events::{Request, Topic};

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _ev: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &str {
            "exploder"
        }
    }

    struct Sleeper;

    #[async_trait]
    impl Subscribe for Sleeper {
        async fn on_event(&self, _ev: &Event) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    #[tokio::test]
    async fn panicking_and_slow_subscribers_do_not_affect_others() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut set = SubscriberSet::new();
        set.add(Arc::new(Exploder));
        set.add(Arc::new(Sleeper));
        let counter = set.add(Arc::new(Counter(seen.clone())));
        assert_eq!(set.len(), 3);

        for i in 0..5 {
            let ev = Event::new(
                Topic::NewName,
                Request::new(format!("n{i}.example.com"), "example.com"),
            );
            set.emit(&Arc::new(ev));
        }
        set.close();
        assert!(set.is_empty());

        counter.await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
