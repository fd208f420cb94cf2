//! Bounded pool of encode slots.
//!
//! At most `max_concurrent` encodes run at once. Up to `max_queued` further
//! callers may wait for a slot; beyond that, callers are rejected
//! immediately instead of piling up behind a busy encoder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::debug;

use crate::error::PoolError;

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub active: usize,
    pub waiting: usize,
    pub max_concurrent: usize,
    pub max_queued: usize,
}

struct PoolInner {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    max_queued: usize,
    waiting: AtomicUsize,
}

/// Shared encode slot pool. Cloning shares the same slots.
#[derive(Clone)]
pub struct EncodePool {
    inner: Arc<PoolInner>,
}

/// A held encode slot, released on drop.
#[derive(Debug)]
pub struct EncodePermit {
    _permit: OwnedSemaphorePermit,
}

/// Decrements the waiter count when an `acquire` finishes or is dropped.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EncodePool {
    /// Create a pool. `max_concurrent` is raised to at least 1.
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                max_queued,
                waiting: AtomicUsize::new(0),
            }),
        }
    }

    /// Take a free slot without waiting.
    pub fn try_acquire(&self) -> Option<EncodePermit> {
        match self.inner.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Some(EncodePermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Wait for a slot, or fail fast when the wait queue is full.
    pub async fn acquire(&self) -> Result<EncodePermit, PoolError> {
        if let Some(permit) = self.try_acquire() {
            return Ok(permit);
        }

        let inner = &self.inner;
        let waiting = inner.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitingGuard(&inner.waiting);

        if waiting >= inner.max_queued {
            debug!(waiting, max_queued = inner.max_queued, "Encode queue saturated");
            return Err(PoolError::Saturated {
                waiting,
                max_queued: inner.max_queued,
            });
        }

        let permit = inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        Ok(EncodePermit { _permit: permit })
    }

    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        PoolStats {
            active: inner
                .max_concurrent
                .saturating_sub(inner.semaphore.available_permits()),
            waiting: inner.waiting.load(Ordering::SeqCst),
            max_concurrent: inner.max_concurrent,
            max_queued: inner.max_queued,
        }
    }
}

impl Default for EncodePool {
    fn default() -> Self {
        Self::new(2, 8)
    }
}

impl std::fmt::Debug for EncodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodePool").field("stats", &self.stats()).finish()
    }
}
