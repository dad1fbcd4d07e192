//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], the callback type registered on the
//! [`EventBus`](crate::EventBus) for a [`Topic`](crate::Topic).
//!
//! Each subscription gets:
//! - **Dedicated worker task** (runs independently of the publisher)
//! - **Per-subscription FIFO queue**
//! - **Panic isolation** (panics are caught and logged, the worker keeps going)
//!
//! ## Rules
//! - A slow subscriber only delays its own queue.
//! - Events are processed sequentially (FIFO) per subscription.
//! - Subscribers must not block on network I/O inside `on_event`; hand the
//!   work to a background task (the services push onto their request queue).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use subvisor::{Event, Subscribe, Topic};
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl Subscribe for Printer {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.topic == Topic::NameResolved {
//!             println!("{}", ev.request.name);
//!         }
//!     }
//!
//!     fn name(&self) -> &str { "printer" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Callback registered on one or more bus topics.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Do not mutate the shared request; build a new one if needed.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, not in the publisher context.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
