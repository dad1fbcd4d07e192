//! # Topic-keyed event bus.
//!
//! [`EventBus`] connects every service without direct references between them.
//! Each topic owns a [`SubscriberSet`]; publishing fans the event out to each
//! subscriber's own queue and returns immediately.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                         Subscribers (per topic):
//!   BruteForceService ──┐
//!   NameService       ──┼── publish(topic) ──► routes[topic] ──► [queue] ─► worker ─► on_event
//!   Sources (N)       ──┘                                   └──► [queue] ─► worker ─► on_event
//! ```
//!
//! ## Rules
//! - **Registration phase**: `subscribe()` is allowed until [`EventBus::seal`].
//!   After sealing, subscriptions fail with [`BusError::Sealed`].
//! - **Run phase**: `publish()` only takes the read side of the registry lock,
//!   so publishers never contend with each other in steady state.
//! - **Non-blocking publish**: never awaits a subscriber.
//! - **Isolation**: a slow or panicking subscriber only affects its own queue.
//! - **No persistence**: values published on a topic nobody subscribed to are dropped.
//! - Subscription order does not imply delivery-completion order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::task::JoinHandle;

use super::{Event, Request, Topic};
use crate::error::BusError;
use crate::subscribers::{Subscribe, SubscriberSet};

#[derive(Default)]
struct Inner {
    routes: RwLock<HashMap<Topic, SubscriberSet>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sealed: AtomicBool,
}

/// Publish/subscribe hub shared by every service.
///
/// Cheap to clone (internally holds an `Arc`).
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    /// Creates an empty, unsealed bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` for every value subsequently published on `topic`.
    ///
    /// Registration is additive; there is no unsubscribe. Must be called from
    /// within a tokio runtime (a worker task is spawned per subscription).
    pub fn subscribe(&self, topic: Topic, subscriber: Arc<dyn Subscribe>) -> Result<(), BusError> {
        if self.is_sealed() {
            return Err(BusError::Sealed { topic });
        }

        let handle = {
            let mut routes = self.inner.routes.write().unwrap_or_else(PoisonError::into_inner);
            routes.entry(topic).or_default().add(subscriber)
        };
        self.inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }

    /// Ends the registration phase.
    pub fn seal(&self) {
        self.inner.sealed.store(true, Ordering::Release);
    }

    /// True once [`EventBus::seal`] has been called.
    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.load(Ordering::Acquire)
    }

    /// Publishes `request` on `topic`.
    pub fn publish(&self, topic: Topic, request: impl Into<Arc<Request>>) {
        self.emit(Event::new(topic, request));
    }

    /// Publishes a confirmed subdomain together with its running discovery count.
    pub fn publish_subdomain(&self, request: impl Into<Arc<Request>>, times: usize) {
        self.emit(Event::new(Topic::NewSubdomain, request).with_times(times));
    }

    /// Publishes a prebuilt event.
    pub fn emit(&self, event: Event) {
        let routes = self.inner.routes.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(set) = routes.get(&event.topic) {
            set.emit(&Arc::new(event));
        }
    }

    /// Number of subscribers registered on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .map_or(0, SubscriberSet::len)
    }

    /// Closes every subscriber queue and waits for the workers to drain.
    ///
    /// Later publishes are dropped silently.
    pub async fn shutdown(&self) {
        self.seal();
        {
            let mut routes = self.inner.routes.write().unwrap_or_else(PoisonError::into_inner);
            for set in routes.values_mut() {
                set.close();
            }
        }
        let workers: Vec<JoinHandle<()>> = {
            let mut workers = self.inner.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.drain(..).collect()
        };
        for h in workers {
            let _ = h.await;
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::subscribers::FnSubscriber;

    fn recorder(out: Arc<StdMutex<Vec<String>>>) -> Arc<dyn Subscribe> {
        FnSubscriber::arc("recorder", move |ev: &Event| {
            out.lock().unwrap().push(ev.request.name.clone());
        })
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_of_the_topic_only() {
        let bus = EventBus::new();
        let a = Arc::new(StdMutex::new(Vec::new()));
        let b = Arc::new(StdMutex::new(Vec::new()));
        let other = Arc::new(StdMutex::new(Vec::new()));

        bus.subscribe(Topic::NameResolved, recorder(a.clone())).unwrap();
        bus.subscribe(Topic::NameResolved, recorder(b.clone())).unwrap();
        bus.subscribe(Topic::NewName, recorder(other.clone())).unwrap();
        bus.seal();

        bus.publish(
            Topic::NameResolved,
            Request::new("www.example.com", "example.com"),
        );
        bus.shutdown().await;

        assert_eq!(*a.lock().unwrap(), vec!["www.example.com".to_string()]);
        assert_eq!(*b.lock().unwrap(), vec!["www.example.com".to_string()]);
        assert!(other.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribe_after_seal_is_rejected() {
        let bus = EventBus::new();
        bus.seal();
        let err = bus
            .subscribe(Topic::NewName, recorder(Arc::default()))
            .unwrap_err();
        assert_eq!(
            err,
            BusError::Sealed {
                topic: Topic::NewName
            }
        );
        assert_eq!(bus.subscriber_count(Topic::NewName), 0);
    }

    #[tokio::test]
    async fn times_travel_with_new_subdomain() {
        let bus = EventBus::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(
            Topic::NewSubdomain,
            FnSubscriber::arc("times", move |ev: &Event| {
                sink.lock().unwrap().push(ev.times);
            }),
        )
        .unwrap();

        bus.publish_subdomain(Request::new("dev.example.com", "example.com"), 3);
        bus.publish(Topic::NewName, Request::new("x.example.com", "example.com"));
        bus.shutdown().await;

        assert_eq!(*seen.lock().unwrap(), vec![Some(3)]);
    }
}
