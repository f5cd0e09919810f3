//! Acquisition task: keeps trying to lock one partition until it succeeds or
//! is killed.

use super::state::Shared;
use crate::coordination::PartitionLockHandle;
use crate::types::PartitionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How an acquisition task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquireOutcome {
    /// The partition was added to the owned set.
    Acquired,
    /// The lock was obtained after the task was killed and given back.
    Discarded,
    /// The task was killed before obtaining the lock.
    Cancelled,
}

/// Handle to a spawned acquisition task.
#[derive(Debug)]
pub(crate) struct AcquisitionTask {
    token: CancellationToken,
    handle: JoinHandle<AcquireOutcome>,
}

impl AcquisitionTask {
    /// Spawn a task acquiring `lock` on the current tokio runtime.
    pub(crate) fn spawn(
        lock: Arc<PartitionLockHandle>,
        shared: Arc<Shared>,
        retry_interval: Duration,
        cancel_backoff: Duration,
    ) -> Self {
        let partition = lock.partition();
        let token = CancellationToken::new();
        let acquirer = Acquirer {
            partition,
            lock,
            shared,
            token: token.clone(),
            retry_interval,
            cancel_backoff,
        };

        tracing::debug!(partition, "Spawning lock acquisition task");
        let handle = tokio::spawn(acquirer.run());

        Self { token, handle }
    }

    /// Stop the task at its next suspension point. Idempotent, never blocks.
    pub(crate) fn kill(&self) {
        self.token.cancel();
    }

    /// Whether the task has run to completion.
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Kill the task, abort it if it is stuck in the lock service, and wait
    /// for it to stop running.
    pub(crate) async fn shutdown(mut self) -> Option<AcquireOutcome> {
        self.token.cancel();
        self.handle.abort();
        (&mut self.handle).await.ok()
    }
}

impl Drop for AcquisitionTask {
    fn drop(&mut self) {
        // An untracked task must not keep retrying in the background.
        self.token.cancel();
    }
}

struct Acquirer {
    partition: PartitionId,
    lock: Arc<PartitionLockHandle>,
    shared: Arc<Shared>,
    token: CancellationToken,
    retry_interval: Duration,
    cancel_backoff: Duration,
}

impl Acquirer {
    async fn run(self) -> AcquireOutcome {
        loop {
            if self.token.is_cancelled() {
                return AcquireOutcome::Cancelled;
            }

            if self.lock.is_cancelled() {
                tracing::debug!(
                    partition = self.partition,
                    "Lock acquisition is getting cancelled, waiting"
                );
                if !self.pause(self.cancel_backoff).await {
                    return AcquireOutcome::Cancelled;
                }
                continue;
            }

            self.shared.metrics.record_attempt();
            if self.lock.acquire().await {
                return match self.commit() {
                    Commit::Owned => AcquireOutcome::Acquired,
                    Commit::AlreadyOwned => {
                        tracing::debug!(
                            partition = self.partition,
                            "Lock acquired again by a stale task, already owned"
                        );
                        self.shared.metrics.record_discarded();
                        AcquireOutcome::Discarded
                    }
                    Commit::Release => {
                        tracing::info!(
                            partition = self.partition,
                            "Acquired lock after cancellation, releasing"
                        );
                        self.shared.metrics.record_discarded();
                        self.lock.release().await;
                        self.lock.end_cancel();
                        AcquireOutcome::Discarded
                    }
                };
            }

            if !self.pause(self.retry_interval).await {
                return AcquireOutcome::Cancelled;
            }
        }
    }

    /// Sleep for `delay`. Returns false if the task was killed meanwhile.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.token.cancelled() => false,
        }
    }

    /// Decide, under the state lock, what happens to a lock just acquired.
    ///
    /// A live task owns the partition if it is still targeted. A killed task
    /// takes over for the newer task tracked for the same partition, since
    /// reentrant locks hand both the same grant. The lock is released only
    /// when nothing tracks the partition; the `cancelled` flag stays raised
    /// until then so later tasks cannot be granted the lock being dropped.
    fn commit(&self) -> Commit {
        let mut state = self.shared.state.lock();
        let part = self.partition;

        if state.current.contains(&part) {
            return Commit::AlreadyOwned;
        }

        let killed = self.token.is_cancelled();
        let superseded = killed && state.pending.contains_key(&part);
        if !state.target.contains(&part) || (killed && !superseded) {
            self.lock.begin_cancel();
            return Commit::Release;
        }

        state.current.insert(part);
        if superseded {
            if let Some(newer) = state.pending.remove(&part) {
                newer.kill();
            }
            tracing::info!(partition = part, "Acquired lock for superseded task");
        } else {
            tracing::info!(partition = part, "Acquired lock");
        }

        self.shared.metrics.record_acquired();
        self.shared.refresh_gauges(&state);
        self.shared.notify(&state);
        Commit::Owned
    }
}

/// Fate of a lock an acquisition task has just obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Commit {
    /// Added to the owned set.
    Owned,
    /// Another task already committed the same grant.
    AlreadyOwned,
    /// Nothing tracks the partition; give the lock back.
    Release,
}
