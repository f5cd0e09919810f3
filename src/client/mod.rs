//! Partition client: keeps the local node's partition ownership in line with
//! the consistent hash ring.
//!
//! # Reconciliation
//!
//! ```text
//!  update_cluster_list(["s1","s2"])
//!        │
//!        ▼
//!  HashRing add/del deltas ──► target_partitions(ring, self)
//!        │
//!        ▼
//!  ReconcilePlan(target, current, pending)
//!        │
//!        ├── Acquire(p)        spawn AcquisitionTask ──► lock ──► current += p ──► listener
//!        ├── CancelAcquire(p)  kill task, cancel lock request
//!        └── Release(p)        current -= p, release lock ──► listener (once per pass)
//! ```
//!
//! Newly acquired partitions are reported one by one as each task succeeds;
//! all releases of a pass are reported together.

mod state;
mod task;

use crate::config::{ensure_member, PartitionConfig};
use crate::coordination::{CoordinationBackend, CoordinationSession, PartitionLockHandle};
use crate::error::{Error, Result};
use crate::listener::OwnershipListener;
use crate::metrics::PartitionMetrics;
use crate::partitioning::{
    target_partitions, HashRing, MembershipDelta, ReconcileAction, ReconcilePlan,
};
use crate::types::{NodeName, PartitionId};
use state::Shared;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use task::AcquisitionTask;

/// Ring and member list, guarded together so reconciliation passes run one
/// at a time.
#[derive(Debug)]
struct Membership {
    ring: HashRing,
    cluster: Vec<NodeName>,
}

/// Lock-service work left after the planning step of a pass.
#[derive(Debug, Clone, Copy)]
enum Cleanup {
    Cancel(PartitionId),
    Release(PartitionId),
}

/// Client owning a slice of the partition space `0..max_partition`.
///
/// Construction and cluster updates must happen inside a tokio runtime;
/// acquisition tasks run on it in the background.
pub struct PartitionClient {
    config: PartitionConfig,
    session: Arc<dyn CoordinationSession>,
    locks: Vec<Arc<PartitionLockHandle>>,
    membership: tokio::sync::Mutex<Membership>,
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl PartitionClient {
    /// Create a client, connect to the coordination service and start
    /// acquiring the partitions the ring assigns to this node.
    ///
    /// Fails with [`Error::Config`] if `self_name` is not in `cluster_list`,
    /// or with [`Error::Coordination`] if the session cannot be opened.
    #[tracing::instrument(
        skip_all,
        fields(app = %config.app_name, node = %config.self_name, max_partition = config.max_partition)
    )]
    pub async fn new<L>(
        config: PartitionConfig,
        backend: &dyn CoordinationBackend,
        listener: L,
    ) -> Result<Self>
    where
        L: OwnershipListener,
    {
        config.validate()?;

        let ring = HashRing::from_nodes(config.vnodes_per_node, config.cluster_list.iter().cloned());

        let session = backend
            .connect(&config.coordination_endpoint, &config.self_name)
            .await?;
        if let Err(e) = session.start().await {
            if let Err(close_err) = session.close().await {
                tracing::debug!(error = %close_err, "Failed to close unstarted session");
            }
            return Err(e.into());
        }

        let locks = (0..config.max_partition)
            .map(|part| {
                Arc::new(PartitionLockHandle::open(
                    session.as_ref(),
                    &config.app_name,
                    part,
                    &config.self_name,
                ))
            })
            .collect();

        let shared = Arc::new(Shared::new(Box::new(listener)));
        shared.metrics.cluster_members.set_count(ring.node_count());

        let client = Self {
            membership: tokio::sync::Mutex::new(Membership {
                ring,
                cluster: config.cluster_list.clone(),
            }),
            config,
            session,
            locks,
            shared,
            closed: AtomicBool::new(false),
        };

        tracing::info!(session = %client.session.session_id(), "Partition client started");

        let membership = client.membership.lock().await;
        let target = client.compute_target(&membership.ring);
        client.reconcile(target).await;
        drop(membership);

        Ok(client)
    }

    /// Replace the cluster member list and rebalance ownership.
    ///
    /// Fails with [`Error::Config`] if the local node is missing from the new
    /// list, or [`Error::Closed`] after [`close`](Self::close).
    #[tracing::instrument(skip_all, fields(node = %self.config.self_name, members = cluster_list.len()))]
    pub async fn update_cluster_list(&self, cluster_list: Vec<NodeName>) -> Result<()> {
        ensure_member(&self.config.self_name, &cluster_list)?;

        let mut membership = self.membership.lock().await;
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let delta = MembershipDelta::between(&membership.cluster, &cluster_list);
        tracing::info!(added = ?delta.added, removed = ?delta.removed, "Cluster list updated");

        if !delta.added.is_empty() {
            membership.ring.add_nodes(delta.added.iter().cloned());
        }
        if !delta.removed.is_empty() {
            membership.ring.del_nodes(&delta.removed);
        }
        membership.cluster = cluster_list;

        self.shared.metrics.membership_updates.inc();
        self.shared
            .metrics
            .cluster_members
            .set_count(membership.ring.node_count());

        let target = self.compute_target(&membership.ring);
        self.reconcile(target).await;
        Ok(())
    }

    /// Whether the local node currently holds the lock of `partition`.
    pub fn own_partition(&self, partition: PartitionId) -> bool {
        self.shared.state.lock().current.contains(&partition)
    }

    /// Kill pending acquisitions and tear down the coordination session.
    ///
    /// Every step is best-effort; failures are logged. Calling `close` more
    /// than once is a no-op.
    #[tracing::instrument(skip_all, fields(node = %self.config.self_name))]
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Wait for an in-progress reconciliation pass to finish.
        let _membership = self.membership.lock().await;

        let tasks: Vec<AcquisitionTask> = {
            let mut state = self.shared.state.lock();
            state.pending.drain().map(|(_, task)| task).collect()
        };
        for task in &tasks {
            task.kill();
        }
        let killed = tasks.len();
        for task in tasks {
            task.shutdown().await;
        }

        if let Err(e) = self.session.stop().await {
            tracing::warn!(error = %e, "Failed to stop coordination session");
        }
        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Failed to close coordination session");
        }

        // The session's locks are gone with it.
        {
            let mut state = self.shared.state.lock();
            state.current.clear();
            self.shared.refresh_gauges(&state);
        }

        tracing::info!(killed, "Partition client closed");
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Partitions currently owned, ascending.
    pub fn owned_partitions(&self) -> Vec<PartitionId> {
        self.shared.state.lock().owned()
    }

    /// Partitions the ring currently assigns to this node, ascending.
    pub fn target_partitions(&self) -> Vec<PartitionId> {
        self.shared.state.lock().target.iter().copied().collect()
    }

    /// Partitions with an acquisition in progress, ascending.
    pub fn pending_partitions(&self) -> Vec<PartitionId> {
        self.shared.state.lock().pending_partitions()
    }

    /// The member list last applied.
    pub async fn cluster_members(&self) -> Vec<NodeName> {
        self.membership.lock().await.cluster.clone()
    }

    /// Name of the local node.
    pub fn self_name(&self) -> &str {
        &self.config.self_name
    }

    /// Size of the partition space.
    pub fn max_partition(&self) -> PartitionId {
        self.config.max_partition
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Client metrics.
    pub fn metrics(&self) -> &PartitionMetrics {
        &self.shared.metrics
    }

    fn compute_target(&self, ring: &HashRing) -> BTreeSet<PartitionId> {
        target_partitions(ring, &self.config.self_name, self.config.max_partition)
    }

    /// Run one reconciliation pass toward `target`.
    ///
    /// Must be called with the membership lock held.
    async fn reconcile(&self, target: BTreeSet<PartitionId>) {
        let cleanups = self.plan_and_apply(target);

        let mut released = 0;
        for cleanup in cleanups {
            match cleanup {
                Cleanup::Cancel(part) => {
                    let lock = &self.locks[part as usize];
                    let ok = lock.cancel().await;
                    lock.end_cancel();
                    self.shared.metrics.record_cancel(ok);
                    tracing::info!(partition = part, "Cancelled lock acquisition");
                }
                Cleanup::Release(part) => {
                    let lock = &self.locks[part as usize];
                    let ok = lock.release().await;
                    self.shared.metrics.record_release(ok);
                    released += 1;
                    tracing::info!(partition = part, "Gave up ownership");
                }
            }
        }

        if released > 0 {
            let state = self.shared.state.lock();
            self.shared.notify(&state);
        }
    }

    /// Planning step of a pass. Runs entirely under the state lock so no
    /// acquisition task observes a half-applied pass.
    fn plan_and_apply(&self, target: BTreeSet<PartitionId>) -> Vec<Cleanup> {
        let mut state = self.shared.state.lock();
        state.target = target;

        let collected = state.collect_finished();
        if collected > 0 {
            tracing::debug!(collected, "Collected finished acquisition tasks");
        }

        let plan = ReconcilePlan::compute(
            self.config.max_partition,
            &state.target,
            &state.current,
            |part| state.pending.contains_key(&part),
        );

        let mut cleanups = Vec::new();
        for action in plan.actions() {
            match *action {
                ReconcileAction::Acquire(part) => {
                    let task = AcquisitionTask::spawn(
                        Arc::clone(&self.locks[part as usize]),
                        Arc::clone(&self.shared),
                        self.config.retry_interval,
                        self.config.cancel_backoff,
                    );
                    state.pending.insert(part, task);
                }
                ReconcileAction::CancelAcquire(part) => {
                    if let Some(task) = state.pending.remove(&part) {
                        task.kill();
                    }
                    self.locks[part as usize].begin_cancel();
                    cleanups.push(Cleanup::Cancel(part));
                }
                ReconcileAction::Release(part) => {
                    state.current.remove(&part);
                    cleanups.push(Cleanup::Release(part));
                }
            }
        }

        self.shared.metrics.reconcile_passes.inc();
        self.shared.refresh_gauges(&state);

        tracing::debug!(
            targeted = state.target.len(),
            owned = state.current.len(),
            acquiring = plan.acquires().count(),
            cancelling = plan.cancels().count(),
            releasing = plan.releases().count(),
            "Reconciliation planned"
        );

        cleanups
    }
}

impl Drop for PartitionClient {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        let pending = std::mem::take(&mut self.shared.state.lock().pending);
        for task in pending.values() {
            task.kill();
        }
        tracing::warn!(
            node = %self.config.self_name,
            killed = pending.len(),
            "Partition client dropped without close"
        );
    }
}

impl std::fmt::Debug for PartitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionClient")
            .field("app_name", &self.config.app_name)
            .field("self_name", &self.config.self_name)
            .field("max_partition", &self.config.max_partition)
            .field("closed", &self.is_closed())
            .field("state", &self.shared)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{FailureMode, MemoryCoordinator};
    use crate::listener::NoopListener;
    use std::time::Duration;

    fn config(self_name: &str, cluster: &[&str], max_partition: PartitionId) -> PartitionConfig {
        PartitionConfig::new(
            "unit",
            self_name,
            cluster.iter().map(|s| s.to_string()).collect(),
            max_partition,
            "mem:2181",
        )
        .with_retry_interval(Duration::from_millis(10))
        .with_cancel_backoff(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_rejects_missing_self() {
        let coordinator = MemoryCoordinator::new();
        let err = PartitionClient::new(config("s4", &["s1", "s2"], 8), &coordinator, NoopListener)
            .await
            .unwrap_err();
        assert!(err.is_config());
        assert_eq!(coordinator.held_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let coordinator = MemoryCoordinator::new();
        coordinator.inject_failure(FailureMode::Connect, true);

        let err = PartitionClient::new(config("s1", &["s1"], 8), &coordinator, NoopListener)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Coordination(_)));
    }

    #[tokio::test]
    async fn test_initial_pass_spawns_target() {
        let coordinator = MemoryCoordinator::new();
        // Keep every lock contended so tasks stay pending.
        coordinator.inject_failure(FailureMode::Acquire, true);

        let client = PartitionClient::new(config("s1", &["s1", "s2"], 16), &coordinator, NoopListener)
            .await
            .unwrap();

        assert_eq!(client.pending_partitions(), client.target_partitions());
        assert!(client.owned_partitions().is_empty());
        assert_eq!(client.metrics().reconcile_passes.get(), 1);
        assert_eq!(client.self_name(), "s1");
        assert_eq!(client.max_partition(), 16);

        client.close().await;
        assert!(client.pending_partitions().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_missing_self() {
        let coordinator = MemoryCoordinator::new();
        let client = PartitionClient::new(config("s1", &["s1", "s2"], 8), &coordinator, NoopListener)
            .await
            .unwrap();

        let err = client
            .update_cluster_list(vec!["s2".to_string(), "s3".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_config());
        assert_eq!(client.cluster_members().await, vec!["s1".to_string(), "s2".to_string()]);

        client.close().await;
        let err = client.update_cluster_list(vec!["s1".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn test_out_of_range_partition_not_owned() {
        let coordinator = MemoryCoordinator::new();
        let client = PartitionClient::new(config("s1", &["s1"], 4), &coordinator, NoopListener)
            .await
            .unwrap();

        assert!(!client.own_partition(4));
        assert!(!client.own_partition(PartitionId::MAX));
        client.close().await;
    }

    #[tokio::test]
    async fn test_empty_partition_space() {
        let coordinator = MemoryCoordinator::new();
        let client = PartitionClient::new(config("s1", &["s1"], 0), &coordinator, NoopListener)
            .await
            .unwrap();

        assert!(client.target_partitions().is_empty());
        assert!(!client.own_partition(0));
        client.close().await;
        client.close().await;
        assert!(client.is_closed());
    }
}
