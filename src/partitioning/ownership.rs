//! Partition ownership calculation.
//!
//! Everything here is a pure function of its inputs: the set of partitions a
//! node should own, the difference between two membership lists, and the
//! actions needed to move the current ownership set toward the target.

use crate::partitioning::hashring::HashRing;
use crate::types::{partition_key, NodeName, PartitionId};
use std::collections::{BTreeSet, HashSet};

/// Compute the partitions the ring assigns to `node`.
pub fn target_partitions(
    ring: &HashRing,
    node: &str,
    max_partition: PartitionId,
) -> BTreeSet<PartitionId> {
    (0..max_partition)
        .filter(|&p| ring.is_owner(&partition_key(p), node))
        .collect()
}

/// Members added and removed between two cluster lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDelta {
    /// Members present in the new list only, in list order.
    pub added: Vec<NodeName>,

    /// Members present in the old list only, in list order.
    pub removed: Vec<NodeName>,
}

impl MembershipDelta {
    /// Compute the symmetric difference between `old` and `new`.
    ///
    /// Duplicates within a list are ignored.
    pub fn between(old: &[NodeName], new: &[NodeName]) -> Self {
        let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
        let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();

        let mut added: Vec<NodeName> = Vec::new();
        for node in new {
            if !old_set.contains(node.as_str()) && !added.contains(node) {
                added.push(node.clone());
            }
        }

        let mut removed: Vec<NodeName> = Vec::new();
        for node in old {
            if !new_set.contains(node.as_str()) && !removed.contains(node) {
                removed.push(node.clone());
            }
        }

        Self { added, removed }
    }

    /// Whether membership is unchanged.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A single step of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Start an acquisition task for the partition.
    Acquire(PartitionId),

    /// Kill the pending acquisition task and cancel the in-flight lock request.
    CancelAcquire(PartitionId),

    /// Release a lock held for a partition no longer targeted.
    Release(PartitionId),
}

impl ReconcileAction {
    /// The partition this action applies to.
    pub fn partition(&self) -> PartitionId {
        match self {
            ReconcileAction::Acquire(p)
            | ReconcileAction::CancelAcquire(p)
            | ReconcileAction::Release(p) => *p,
        }
    }
}

/// Ordered list of actions produced by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    actions: Vec<ReconcileAction>,
}

impl ReconcilePlan {
    /// Diff `target` against `current` for every partition in `0..max_partition`.
    ///
    /// `has_pending` reports whether an acquisition task is already tracked
    /// for a partition. Partitions are visited in increasing order; for an
    /// untargeted partition a cancellation always precedes its release.
    pub fn compute<F>(
        max_partition: PartitionId,
        target: &BTreeSet<PartitionId>,
        current: &BTreeSet<PartitionId>,
        has_pending: F,
    ) -> Self
    where
        F: Fn(PartitionId) -> bool,
    {
        let mut actions = Vec::new();

        for part in 0..max_partition {
            if target.contains(&part) {
                if !current.contains(&part) && !has_pending(part) {
                    actions.push(ReconcileAction::Acquire(part));
                }
            } else {
                if has_pending(part) {
                    actions.push(ReconcileAction::CancelAcquire(part));
                }
                if current.contains(&part) {
                    actions.push(ReconcileAction::Release(part));
                }
            }
        }

        Self { actions }
    }

    /// All actions in execution order.
    pub fn actions(&self) -> &[ReconcileAction] {
        &self.actions
    }

    /// Whether the pass has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Partitions needing a new acquisition task.
    pub fn acquires(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.actions.iter().filter_map(|a| match a {
            ReconcileAction::Acquire(p) => Some(*p),
            _ => None,
        })
    }

    /// Partitions whose pending acquisition must be cancelled.
    pub fn cancels(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.actions.iter().filter_map(|a| match a {
            ReconcileAction::CancelAcquire(p) => Some(*p),
            _ => None,
        })
    }

    /// Partitions whose lock must be released.
    pub fn releases(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.actions.iter().filter_map(|a| match a {
            ReconcileAction::Release(p) => Some(*p),
            _ => None,
        })
    }
}
