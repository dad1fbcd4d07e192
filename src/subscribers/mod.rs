//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the per-topic fan-out
//! ([`SubscriberSet`]) used by the [`EventBus`](crate::EventBus), and two
//! ready-made subscribers.
//!
//! ## Architecture
//! ```text
//! Service ── publish(topic, Request) ──► EventBus ──► SubscriberSet[topic]
//!                                                         │
//!                                        ┌────────────────┼──────────────┐
//!                                        ▼                ▼              ▼
//!                                  BruteForceService  NameService   LogWriter / FnSubscriber
//! ```
//!
//! ## Subscriber types
//! - **Services** hand the request to their own background work.
//! - **Passive subscribers** observe (logging, result collection).

mod callback;
mod log;
mod set;
mod subscriber;

pub use callback::FnSubscriber;
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
