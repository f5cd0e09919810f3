//! Ownership state shared between the reconciler and acquisition tasks.

use super::task::AcquisitionTask;
use crate::listener::OwnershipListener;
use crate::metrics::PartitionMetrics;
use crate::types::PartitionId;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

/// Target, current and pending ownership of the local node.
#[derive(Debug, Default)]
pub(crate) struct OwnershipState {
    /// Partitions the ring assigns to this node.
    pub(crate) target: BTreeSet<PartitionId>,

    /// Partitions whose lock this node holds.
    pub(crate) current: BTreeSet<PartitionId>,

    /// Acquisition tasks, at most one per partition.
    pub(crate) pending: HashMap<PartitionId, AcquisitionTask>,
}

impl OwnershipState {
    /// Drop tracking entries of tasks that already ran to completion.
    ///
    /// Returns the number of entries removed.
    pub(crate) fn collect_finished(&mut self) -> usize {
        let before = self.pending.len();
        let current = &self.current;
        self.pending
            .retain(|part, task| !task.is_finished() && !current.contains(part));
        before - self.pending.len()
    }

    /// Partitions with an acquisition still outstanding, ascending.
    pub(crate) fn pending_partitions(&self) -> Vec<PartitionId> {
        let mut parts: Vec<PartitionId> = self
            .pending
            .keys()
            .filter(|p| !self.current.contains(p))
            .copied()
            .collect();
        parts.sort_unstable();
        parts
    }

    /// Current ownership as an ascending list.
    pub(crate) fn owned(&self) -> Vec<PartitionId> {
        self.current.iter().copied().collect()
    }
}

/// State and collaborators reachable from both the client and its tasks.
pub(crate) struct Shared {
    pub(crate) state: Mutex<OwnershipState>,
    pub(crate) metrics: PartitionMetrics,
    listener: Box<dyn OwnershipListener>,
}

impl Shared {
    pub(crate) fn new(listener: Box<dyn OwnershipListener>) -> Self {
        Self {
            state: Mutex::new(OwnershipState::default()),
            metrics: PartitionMetrics::new(),
            listener,
        }
    }

    /// Deliver the full current ownership list to the listener.
    ///
    /// Called with the state lock held so notifications are totally ordered.
    pub(crate) fn notify(&self, state: &OwnershipState) {
        let owned = state.owned();
        tracing::debug!(count = owned.len(), "Notifying ownership change");
        self.listener.on_ownership_change(&owned);
    }

    /// Refresh the ownership gauges from `state`.
    pub(crate) fn refresh_gauges(&self, state: &OwnershipState) {
        self.metrics.set_ownership(
            state.current.len(),
            state.target.len(),
            state.pending_partitions().len(),
        );
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("Shared");
        // The listener may format the client while the state is locked.
        if let Some(state) = self.state.try_lock() {
            dbg.field("target", &state.target.len())
                .field("current", &state.current.len())
                .field("pending", &state.pending.len());
        }
        dbg.finish_non_exhaustive()
    }
}
