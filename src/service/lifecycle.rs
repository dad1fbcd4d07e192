//! # Service lifecycle state machine.
//!
//! ```text
//! Created ──start──► Running ──pause──► Paused
//!                       ▲                 │
//!                       └─────resume──────┘
//! Running | Paused ──stop──► Stopping ──(background work joined)──► Stopped
//! ```
//!
//! ## Rules
//! - `start` is only valid from `Created`.
//! - Stop is always checked in preference to pause: [`Lifecycle::checkpoint`]
//!   returns `Err(Stopped)` even while paused.
//! - Background work calls `checkpoint()` at safe points; it blocks while
//!   paused and returns as soon as either resume or stop arrives.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// Externally visible service state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Created => "created",
            ServiceState::Running => "running",
            ServiceState::Paused => "paused",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// State, stop signal and pause signal of one service.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<ServiceState>,
    stop: CancellationToken,
    pause: watch::Sender<bool>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl Lifecycle {
    /// Creates a lifecycle whose stop signal is `stop`.
    pub fn new(stop: CancellationToken) -> Self {
        let (pause, _) = watch::channel(false);
        Self {
            state: Mutex::new(ServiceState::Created),
            stop,
            pause,
        }
    }

    /// Current state.
    pub fn state(&self) -> ServiceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The stop signal observed by background work.
    pub fn token(&self) -> &CancellationToken {
        &self.stop
    }

    /// True once stop was requested.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// True while paused.
    pub fn is_paused(&self) -> bool {
        *self.pause.borrow()
    }

    /// `Created → Running`.
    pub(crate) fn begin_start(&self, service: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != ServiceState::Created {
            return Err(ServiceError::AlreadyStarted {
                service: service.to_string(),
            });
        }
        *state = ServiceState::Running;
        Ok(())
    }

    /// `Running → Paused` (idempotent while paused).
    pub(crate) fn pause(&self, service: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            ServiceState::Running | ServiceState::Paused => {
                *state = ServiceState::Paused;
                self.pause.send_replace(true);
                Ok(())
            }
            _ => Err(ServiceError::NotRunning {
                service: service.to_string(),
            }),
        }
    }

    /// `Paused → Running` (idempotent while running).
    pub(crate) fn resume(&self, service: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            ServiceState::Running | ServiceState::Paused => {
                *state = ServiceState::Running;
                self.pause.send_replace(false);
                Ok(())
            }
            _ => Err(ServiceError::NotRunning {
                service: service.to_string(),
            }),
        }
    }

    /// Moves to `Stopping` and fires the stop signal.
    ///
    /// Returns `false` if a stop is already underway or done.
    pub(crate) fn begin_stop(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            ServiceState::Stopping | ServiceState::Stopped => false,
            _ => {
                *state = ServiceState::Stopping;
                self.stop.cancel();
                true
            }
        }
    }

    /// `Stopping → Stopped`.
    pub(crate) fn finish_stop(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ServiceState::Stopped;
    }

    /// Safe point for background work.
    ///
    /// Returns immediately when running, waits while paused, and returns
    /// `Err(ServiceError::Stopped)` as soon as stop is requested.
    pub async fn checkpoint(&self) -> Result<(), ServiceError> {
        if self.stop.is_cancelled() {
            return Err(ServiceError::Stopped);
        }
        if !self.is_paused() {
            return Ok(());
        }

        let mut paused = self.pause.subscribe();
        loop {
            if self.stop.is_cancelled() {
                return Err(ServiceError::Stopped);
            }
            if !*paused.borrow_and_update() {
                return Ok(());
            }
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return Err(ServiceError::Stopped),
                changed = paused.changed() => {
                    if changed.is_err() {
                        return Err(ServiceError::Stopped);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn transitions() {
        let lc = Lifecycle::default();
        assert_eq!(lc.state(), ServiceState::Created);
        assert!(lc.pause("svc").is_err());

        lc.begin_start("svc").unwrap();
        assert_eq!(
            lc.begin_start("svc"),
            Err(ServiceError::AlreadyStarted {
                service: "svc".into()
            })
        );

        lc.pause("svc").unwrap();
        assert_eq!(lc.state(), ServiceState::Paused);
        assert!(lc.is_paused());
        lc.resume("svc").unwrap();
        assert_eq!(lc.state(), ServiceState::Running);

        assert!(lc.begin_stop());
        assert!(!lc.begin_stop());
        assert!(lc.is_stopping());
        lc.finish_stop();
        assert_eq!(lc.state(), ServiceState::Stopped);
        assert!(lc.resume("svc").is_err());
    }

    #[tokio::test]
    async fn checkpoint_blocks_while_paused_until_resume() {
        let lc = Arc::new(Lifecycle::default());
        lc.begin_start("svc").unwrap();
        lc.pause("svc").unwrap();

        let waiter = {
            let lc = lc.clone();
            tokio::spawn(async move { lc.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        lc.resume("svc").unwrap();
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn stop_wins_over_pause() {
        let lc = Arc::new(Lifecycle::default());
        lc.begin_start("svc").unwrap();
        lc.pause("svc").unwrap();

        let waiter = {
            let lc = lc.clone();
            tokio::spawn(async move { lc.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        lc.begin_stop();
        assert_eq!(waiter.await.unwrap(), Err(ServiceError::Stopped));
        assert_eq!(lc.checkpoint().await, Err(ServiceError::Stopped));
    }
}
