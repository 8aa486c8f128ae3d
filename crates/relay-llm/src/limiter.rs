//! Bound on simultaneously open upstream connections

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::RelayError;

/// Semaphore gating upstream connections
///
/// A permit is held for the whole life of a relayed stream. When none is
/// free the caller waits up to `queue_timeout`; a zero timeout rejects
/// immediately.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

impl ConnectionLimiter {
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    /// Take a connection slot
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Overloaded` when no slot frees up in time
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, RelayError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => return Err(closed()),
            Err(TryAcquireError::NoPermits) => {}
        }

        if self.queue_timeout.is_zero() {
            return Err(RelayError::Overloaded);
        }

        tracing::debug!(capacity = self.capacity, "all upstream slots busy, queueing");

        match tokio::time::timeout(self.queue_timeout, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(closed()),
            Err(_) => Err(RelayError::Overloaded),
        }
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured number of slots
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

fn closed() -> RelayError {
    RelayError::Internal(anyhow::anyhow!("connection limiter closed"))
}
