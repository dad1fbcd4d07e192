//! # Service abstraction.
//!
//! Every producer and consumer (brute-force engine, name service, each
//! intelligence source) implements [`Service`]. Implementors provide the
//! embedded [`ServiceBase`] and the two hooks; the lifecycle operations are
//! provided once, here.
//!
//! ## Lifecycle
//! ```text
//! start()  ─► Created→Running ─► metrics.start() ─► on_start(): subscribe + spawn background work
//! pause()  ─► Running→Paused   (background work blocks at its next checkpoint)
//! resume() ─► Paused→Running
//! stop()   ─► Stopping ─► stop token fired ─► join background work ─► on_stop() ─► Stopped
//! ```
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use subvisor::{Config, EventBus, Service, ServiceBase, ServiceError};
//!
//! struct Idle {
//!     base: ServiceBase,
//! }
//!
//! impl Service for Idle {
//!     fn base(&self) -> &ServiceBase { &self.base }
//!
//!     fn on_start(self: Arc<Self>) -> Result<(), ServiceError> {
//!         let me = self.clone();
//!         self.base.spawn(async move {
//!             while me.base.lifecycle().checkpoint().await.is_ok() {
//!                 me.base.set_active();
//!                 tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!             }
//!         });
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{ServiceBase, ServiceState};
use crate::error::ServiceError;
use crate::metrics::ServiceStats;

/// Lifecycle capability set shared by every producer and consumer.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// The embedded shared state.
    fn base(&self) -> &ServiceBase;

    /// One-time setup: subscribe to topics and launch background work.
    fn on_start(self: Arc<Self>) -> Result<(), ServiceError>;

    /// Releases owned resources after background work has returned.
    async fn on_stop(&self) {}

    /// Human-readable name.
    fn name(&self) -> &str {
        self.base().name()
    }

    fn state(&self) -> ServiceState {
        self.base().lifecycle().state()
    }

    /// `Created → Running`. Calling it twice is a contract violation
    /// reported as [`ServiceError::AlreadyStarted`].
    fn start(self: Arc<Self>) -> Result<(), ServiceError> {
        let base = self.base();
        base.lifecycle().begin_start(base.name())?;
        base.metrics().start(base.config().stats_interval);
        info!(service = %base.name(), "service started");
        self.on_start()
    }

    fn pause(&self) -> Result<(), ServiceError> {
        self.base().lifecycle().pause(self.name())?;
        info!(service = %self.name(), "service paused");
        Ok(())
    }

    fn resume(&self) -> Result<(), ServiceError> {
        self.base().lifecycle().resume(self.name())?;
        info!(service = %self.name(), "service resumed");
        Ok(())
    }

    /// Fires the stop signal and returns once all background work has
    /// observed it and returned. Already-admitted units of work run to
    /// completion. Idempotent.
    async fn stop(&self) {
        let base = self.base();
        if !base.lifecycle().begin_stop() {
            return;
        }
        base.tracker().close();
        base.tracker().wait().await;
        self.on_stop().await;
        base.metrics().stop();
        base.lifecycle().finish_stop();
        info!(service = %base.name(), "service stopped");
    }

    /// True if the service signalled liveness recently.
    fn is_active(&self) -> bool {
        self.base().is_active()
    }

    fn stats(&self) -> ServiceStats {
        self.base().metrics().stats()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::events::EventBus;

    struct Ticker {
        base: ServiceBase,
        ticks: AtomicUsize,
        cleaned: AtomicBool,
    }

    #[async_trait]
    impl Service for Ticker {
        fn base(&self) -> &ServiceBase {
            &self.base
        }

        fn on_start(self: Arc<Self>) -> Result<(), ServiceError> {
            let me = self.clone();
            self.base.spawn(async move {
                while me.base.lifecycle().checkpoint().await.is_ok() {
                    me.ticks.fetch_add(1, Ordering::SeqCst);
                    me.base.set_active();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            });
            Ok(())
        }

        async fn on_stop(&self) {
            self.cleaned.store(true, Ordering::SeqCst);
        }
    }

    fn ticker() -> Arc<Ticker> {
        Arc::new(Ticker {
            base: ServiceBase::new("ticker", Arc::new(Config::default()), EventBus::new()),
            ticks: AtomicUsize::new(0),
            cleaned: AtomicBool::new(false),
        })
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let svc = ticker();
        assert_eq!(svc.state(), ServiceState::Created);
        svc.clone().start().unwrap();
        assert!(matches!(
            svc.clone().start(),
            Err(ServiceError::AlreadyStarted { .. })
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(svc.is_active());

        svc.pause().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let paused_at = svc.ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(svc.ticks.load(Ordering::SeqCst) <= paused_at + 1);

        svc.resume().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(svc.ticks.load(Ordering::SeqCst) > paused_at + 1);

        svc.stop().await;
        assert_eq!(svc.state(), ServiceState::Stopped);
        assert!(svc.cleaned.load(Ordering::SeqCst));
        let stopped_at = svc.ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(svc.ticks.load(Ordering::SeqCst), stopped_at);
    }

    #[tokio::test]
    async fn stop_while_paused_unwinds() {
        let svc = ticker();
        svc.clone().start().unwrap();
        svc.pause().unwrap();
        tokio::time::timeout(Duration::from_secs(1), svc.stop())
            .await
            .expect("stop must not wait for resume");
        assert_eq!(svc.state(), ServiceState::Stopped);
    }
}
