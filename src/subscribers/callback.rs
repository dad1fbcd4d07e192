//! # Closure-backed subscriber.
//!
//! [`FnSubscriber`] turns a synchronous callback into a [`Subscribe`]
//! implementation, for wiring a consumer onto the bus without a dedicated type.
//! The callback runs on the subscription's worker task and must not block.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Function-backed subscriber.
pub struct FnSubscriber<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    /// Creates a new function-backed subscriber.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the subscriber and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F> Subscribe for FnSubscriber<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &Event) {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
