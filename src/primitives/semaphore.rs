//! # Counting permit pool.
//!
//! [`Semaphore`] bounds the number of in-flight resolution attempts. It wraps
//! [`tokio::sync::Semaphore`] and hands out RAII [`Permit`]s: a permit returns
//! its `n` permits exactly once, when dropped or explicitly [`released`](Permit::release),
//! so early returns and panics inside a unit of work cannot leak capacity.
//!
//! ## Rules
//! - Outstanding permits never exceed [`Semaphore::capacity`].
//! - `acquire` blocks (backpressure), it never fails while the pool is open.
//! - Fairness is not required, double-granting is impossible.
//! - [`Semaphore::close`] wakes every blocked acquirer with `None`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore as TokioSemaphore};
use tokio_util::sync::CancellationToken;

/// Fixed-capacity permit pool.
#[derive(Clone, Debug)]
pub struct Semaphore {
    inner: Arc<TokioSemaphore>,
    capacity: usize,
    in_use: Arc<AtomicUsize>,
}

impl Semaphore {
    /// Creates a pool with `capacity` permits (clamped to `1..=MAX_PERMITS`).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, TokioSemaphore::MAX_PERMITS);
        Self {
            inner: Arc::new(TokioSemaphore::new(capacity)),
            capacity,
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits until `n` permits are available and reserves them.
    ///
    /// Returns `None` only if the pool was closed.
    pub async fn acquire(&self, n: usize) -> Option<Permit> {
        let n = self.clamp_request(n);
        let permit = Arc::clone(&self.inner).acquire_many_owned(n).await.ok()?;
        Some(self.track(permit, n))
    }

    /// Like [`Semaphore::acquire`], but gives up as soon as `token` is cancelled.
    ///
    /// Stop is checked before waiting and preferred if both are ready.
    pub async fn acquire_cancellable(&self, n: usize, token: &CancellationToken) -> Option<Permit> {
        if token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            permit = self.acquire(n) => permit,
        }
    }

    /// Reserves `n` permits if they are available right now.
    pub fn try_acquire(&self, n: usize) -> Option<Permit> {
        let n = self.clamp_request(n);
        let permit = Arc::clone(&self.inner).try_acquire_many_owned(n).ok()?;
        Some(self.track(permit, n))
    }

    /// Closes the pool; blocked and future acquirers get `None`.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Total number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.inner.available_permits()
    }

    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    fn clamp_request(&self, n: usize) -> u32 {
        debug_assert!(n <= self.capacity, "requested {n} permits from a pool of {}", self.capacity);
        // capacity <= MAX_PERMITS < u32::MAX
        n.min(self.capacity) as u32
    }

    fn track(&self, permit: OwnedSemaphorePermit, n: u32) -> Permit {
        let n = n as usize;
        let held = self.in_use.fetch_add(n, Ordering::AcqRel) + n;
        debug_assert!(held <= self.capacity);
        Permit {
            permit: Some(permit),
            n,
            in_use: Arc::clone(&self.in_use),
        }
    }
}

/// Reserved permits; released exactly once on drop.
#[derive(Debug)]
#[must_use = "permits are released as soon as the guard is dropped"]
pub struct Permit {
    permit: Option<OwnedSemaphorePermit>,
    n: usize,
    in_use: Arc<AtomicUsize>,
}

impl Permit {
    /// Number of permits held.
    pub fn count(&self) -> usize {
        self.n
    }

    /// Returns the permits to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            // Decrement before the pool can hand the permits out again.
            self.in_use.fetch_sub(self.n, Ordering::AcqRel);
            drop(permit);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn acquire_and_release_balance() {
        let sem = Semaphore::new(4);
        let a = sem.acquire(3).await.unwrap();
        assert_eq!(a.count(), 3);
        assert_eq!(sem.available(), 1);
        assert_eq!(sem.in_use(), 3);
        assert!(sem.try_acquire(2).is_none());

        let b = sem.try_acquire(1).unwrap();
        assert_eq!(sem.available(), 0);
        a.release();
        drop(b);
        assert_eq!(sem.available(), 4);
        assert_eq!(sem.in_use(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_use_never_exceeds_capacity() {
        let sem = Semaphore::new(8);
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for i in 0..200 {
            let sem = sem.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let permit = sem.acquire(1 + i % 3).await.unwrap();
                peak.fetch_max(sem.in_use(), Ordering::SeqCst);
                tokio::task::yield_now().await;
                drop(permit);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 8);
        assert_eq!(sem.in_use(), 0);
        assert_eq!(sem.available(), 8);
    }

    #[tokio::test]
    async fn blocked_acquire_observes_cancellation() {
        let sem = Semaphore::new(1);
        let _held = sem.acquire(1).await.unwrap();
        let token = CancellationToken::new();

        let waiter = {
            let sem = sem.clone();
            let token = token.clone();
            tokio::spawn(async move { sem.acquire_cancellable(1, &token).await.is_none() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        assert!(waiter.await.unwrap());
        assert_eq!(sem.in_use(), 1);
    }

    #[tokio::test]
    async fn close_wakes_waiters() {
        let sem = Semaphore::new(1);
        let _held = sem.acquire(1).await.unwrap();
        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.acquire(1).await.is_none() })
        };
        tokio::task::yield_now().await;
        sem.close();
        assert!(waiter.await.unwrap());
    }
}
