//! Coordination service contract and per-partition lock handles.
//!
//! The partition client never implements mutual exclusion itself. It talks
//! to an external coordination service (ZooKeeper-style) through three
//! traits:
//!
//! - [`CoordinationBackend`] opens sessions against an endpoint
//! - [`CoordinationSession`] owns the session lifecycle and hands out locks
//! - [`ExclusiveLock`] is one cluster-wide lock addressed by a path
//!
//! [`PartitionLockHandle`] wraps an [`ExclusiveLock`] with the semantics the
//! reconciler needs: non-blocking acquire, best-effort release and cancel,
//! and a `cancelled` flag that acquisition tasks back off on while a stale
//! acquisition of the same lock is being withdrawn.

pub mod memory;

pub use memory::{FailureMode, MemoryCoordinator, MemorySession};

use crate::error::CoordinationError;
use crate::types::{lock_path, PartitionId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Result type for coordination service operations.
pub type CoordinationResult<T> = std::result::Result<T, CoordinationError>;

/// Factory for sessions against a coordination service.
#[async_trait]
pub trait CoordinationBackend: Send + Sync + std::fmt::Debug {
    /// Connect to `endpoint` on behalf of the node named `identifier`.
    async fn connect(
        &self,
        endpoint: &str,
        identifier: &str,
    ) -> CoordinationResult<Arc<dyn CoordinationSession>>;
}

/// A session with the coordination service.
///
/// Locks acquired through a session are owned by it; stopping or closing the
/// session gives them up.
#[async_trait]
pub trait CoordinationSession: Send + Sync + std::fmt::Debug {
    /// Unique identifier of this session.
    fn session_id(&self) -> String;

    /// Start the session.
    async fn start(&self) -> CoordinationResult<()>;

    /// Create the exclusive lock at `path`. `identifier` is recorded as the
    /// contender name.
    fn lock(&self, path: &str, identifier: &str) -> Arc<dyn ExclusiveLock>;

    /// Stop the session, dropping every lock it holds.
    async fn stop(&self) -> CoordinationResult<()>;

    /// Free the session's resources. Only valid after `stop`.
    async fn close(&self) -> CoordinationResult<()>;
}

/// A cluster-wide exclusive lock.
#[async_trait]
pub trait ExclusiveLock: Send + Sync + std::fmt::Debug {
    /// Path identifying the lock in the coordination service.
    fn path(&self) -> &str;

    /// Try to take the lock without waiting.
    ///
    /// Returns `Ok(true)` if this contender now holds the lock and `Ok(false)`
    /// if someone else does. Locks may be reentrant: a contender already
    /// holding the lock gets `Ok(true)` again.
    async fn try_acquire(&self) -> CoordinationResult<bool>;

    /// Give up the lock.
    async fn release(&self) -> CoordinationResult<()>;

    /// Abort an acquisition in progress inside the service.
    async fn cancel(&self) -> CoordinationResult<()>;
}

/// Lock handle for a single partition.
#[derive(Debug)]
pub struct PartitionLockHandle {
    partition: PartitionId,
    lock: Arc<dyn ExclusiveLock>,
    /// Withdrawals (cancel or stale release) in progress.
    cancelling: AtomicUsize,
}

impl PartitionLockHandle {
    /// Wrap `lock` as the handle of `partition`.
    pub fn new(partition: PartitionId, lock: Arc<dyn ExclusiveLock>) -> Self {
        Self {
            partition,
            lock,
            cancelling: AtomicUsize::new(0),
        }
    }

    /// Create the handle for `partition` of `app_name` on `session`.
    pub fn open(
        session: &dyn CoordinationSession,
        app_name: &str,
        partition: PartitionId,
        identifier: &str,
    ) -> Self {
        let path = lock_path(app_name, partition);
        Self::new(partition, session.lock(&path, identifier))
    }

    /// The partition this handle guards.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Path of the underlying lock.
    pub fn path(&self) -> &str {
        self.lock.path()
    }

    /// Attempt to acquire the lock without blocking.
    ///
    /// Service errors are logged and reported as a failed attempt.
    pub async fn acquire(&self) -> bool {
        match self.lock.try_acquire().await {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::debug!(
                    partition = self.partition,
                    path = self.path(),
                    error = %e,
                    "Lock acquisition attempt failed"
                );
                false
            }
        }
    }

    /// Release the lock. Failures are logged and swallowed.
    ///
    /// Returns whether the service confirmed the release.
    pub async fn release(&self) -> bool {
        match self.lock.release().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    partition = self.partition,
                    path = self.path(),
                    error = %e,
                    "Failed to release partition lock"
                );
                false
            }
        }
    }

    /// Cancel an in-flight acquisition. Failures are logged and swallowed.
    ///
    /// The `cancelled` flag stays set for the duration of the call so that
    /// acquisition tasks wait instead of racing the cancellation.
    pub async fn cancel(&self) -> bool {
        self.begin_cancel();
        let result = self.lock.cancel().await;
        self.end_cancel();

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    partition = self.partition,
                    path = self.path(),
                    error = %e,
                    "Failed to cancel partition lock acquisition"
                );
                false
            }
        }
    }

    /// Whether a cancellation or stale release is in progress.
    pub fn is_cancelled(&self) -> bool {
        self.cancelling.load(Ordering::Acquire) > 0
    }

    /// Raise the `cancelled` flag. Every call must be paired with
    /// [`end_cancel`](Self::end_cancel); overlapping withdrawals keep the
    /// flag raised until the last one ends.
    pub fn begin_cancel(&self) {
        self.cancelling.fetch_add(1, Ordering::AcqRel);
    }

    /// Lower the flag raised by [`begin_cancel`](Self::begin_cancel).
    pub fn end_cancel(&self) {
        let _ = self
            .cancelling
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}
