//! Metrics module for monitoring partition ownership.
//!
//! This module provides Prometheus-style metrics for the partition client:
//! - Counters for lock attempts, acquisitions, releases and cancellations
//! - Gauges for the owned, targeted and pending partition counts
//!
//! # Example
//!
//! ```rust
//! use partition_client::metrics::PartitionMetrics;
//!
//! let metrics = PartitionMetrics::new();
//! metrics.record_acquired();
//! metrics.set_ownership(1, 4, 3);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.owned_partitions, 1);
//! assert!((snapshot.convergence() - 0.25).abs() < f64::EPSILON);
//! ```

mod counters;
mod gauges;

pub use counters::Counter;
pub use gauges::Gauge;

/// Metrics for a partition client.
#[derive(Debug)]
pub struct PartitionMetrics {
    // Lock activity
    /// Lock acquisition attempts.
    pub acquire_attempts: Counter,
    /// Partitions acquired and added to the owned set.
    pub acquisitions: Counter,
    /// Locks obtained after the partition stopped being targeted.
    pub acquisitions_discarded: Counter,
    /// Locks released.
    pub releases: Counter,
    /// Lock releases the coordination service rejected.
    pub release_failures: Counter,
    /// Pending acquisitions cancelled.
    pub cancellations: Counter,
    /// Cancellations the coordination service rejected.
    pub cancel_failures: Counter,

    // Reconciliation
    /// Reconciliation passes run.
    pub reconcile_passes: Counter,
    /// Cluster list updates applied.
    pub membership_updates: Counter,

    // State gauges
    /// Partitions currently owned.
    pub owned_partitions: Gauge,
    /// Partitions assigned to this node by the ring.
    pub target_partitions: Gauge,
    /// Acquisition tasks currently tracked.
    pub pending_acquisitions: Gauge,
    /// Cluster members known to the ring.
    pub cluster_members: Gauge,
}

impl PartitionMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            acquire_attempts: Counter::new(
                "partition_acquire_attempts_total",
                "Lock acquisition attempts",
            ),
            acquisitions: Counter::new("partition_acquisitions_total", "Partitions acquired"),
            acquisitions_discarded: Counter::new(
                "partition_acquisitions_discarded_total",
                "Locks acquired after the partition was no longer targeted",
            ),
            releases: Counter::new("partition_releases_total", "Partition locks released"),
            release_failures: Counter::new(
                "partition_release_failures_total",
                "Failed partition lock releases",
            ),
            cancellations: Counter::new(
                "partition_cancellations_total",
                "Pending acquisitions cancelled",
            ),
            cancel_failures: Counter::new(
                "partition_cancel_failures_total",
                "Failed acquisition cancellations",
            ),

            reconcile_passes: Counter::new(
                "partition_reconcile_passes_total",
                "Reconciliation passes",
            ),
            membership_updates: Counter::new(
                "partition_membership_updates_total",
                "Cluster list updates",
            ),

            owned_partitions: Gauge::new("partition_owned", "Partitions owned by this node"),
            target_partitions: Gauge::new(
                "partition_target",
                "Partitions assigned to this node",
            ),
            pending_acquisitions: Gauge::new(
                "partition_pending_acquisitions",
                "Acquisition tasks in flight",
            ),
            cluster_members: Gauge::new("partition_cluster_members", "Cluster members"),
        }
    }

    /// Record a lock acquisition attempt.
    pub fn record_attempt(&self) {
        self.acquire_attempts.inc();
    }

    /// Record a partition added to the owned set.
    pub fn record_acquired(&self) {
        self.acquisitions.inc();
    }

    /// Record a lock that was acquired but immediately given back.
    pub fn record_discarded(&self) {
        self.acquisitions_discarded.inc();
    }

    /// Record a release and whether the service confirmed it.
    pub fn record_release(&self, success: bool) {
        self.releases.inc();
        if !success {
            self.release_failures.inc();
        }
    }

    /// Record a cancellation and whether the service confirmed it.
    pub fn record_cancel(&self, success: bool) {
        self.cancellations.inc();
        if !success {
            self.cancel_failures.inc();
        }
    }

    /// Update the ownership gauges.
    pub fn set_ownership(&self, owned: usize, target: usize, pending: usize) {
        self.owned_partitions.set_count(owned);
        self.target_partitions.set_count(target);
        self.pending_acquisitions.set_count(pending);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            acquire_attempts: self.acquire_attempts.get(),
            acquisitions: self.acquisitions.get(),
            acquisitions_discarded: self.acquisitions_discarded.get(),
            releases: self.releases.get(),
            release_failures: self.release_failures.get(),
            cancellations: self.cancellations.get(),
            cancel_failures: self.cancel_failures.get(),
            reconcile_passes: self.reconcile_passes.get(),
            membership_updates: self.membership_updates.get(),
            owned_partitions: self.owned_partitions.get(),
            target_partitions: self.target_partitions.get(),
            pending_acquisitions: self.pending_acquisitions.get(),
            cluster_members: self.cluster_members.get(),
        }
    }

    /// Format metrics in Prometheus exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        for counter in [
            &self.acquire_attempts,
            &self.acquisitions,
            &self.acquisitions_discarded,
            &self.releases,
            &self.release_failures,
            &self.cancellations,
            &self.cancel_failures,
            &self.reconcile_passes,
            &self.membership_updates,
        ] {
            counter.write_prometheus(&mut output);
        }

        for gauge in [
            &self.owned_partitions,
            &self.target_partitions,
            &self.pending_acquisitions,
            &self.cluster_members,
        ] {
            gauge.write_prometheus(&mut output);
        }

        output
    }
}

impl Default for PartitionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of partition metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub acquire_attempts: u64,
    pub acquisitions: u64,
    pub acquisitions_discarded: u64,
    pub releases: u64,
    pub release_failures: u64,
    pub cancellations: u64,
    pub cancel_failures: u64,
    pub reconcile_passes: u64,
    pub membership_updates: u64,
    pub owned_partitions: i64,
    pub target_partitions: i64,
    pub pending_acquisitions: i64,
    pub cluster_members: i64,
}

impl MetricsSnapshot {
    /// Fraction of targeted partitions already owned.
    ///
    /// Reports 1.0 when nothing is targeted.
    pub fn convergence(&self) -> f64 {
        if self.target_partitions <= 0 {
            1.0
        } else {
            self.owned_partitions as f64 / self.target_partitions as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_metrics() {
        let metrics = PartitionMetrics::new();

        metrics.record_attempt();
        metrics.record_attempt();
        metrics.record_acquired();
        metrics.record_release(true);
        metrics.record_release(false);
        metrics.record_cancel(false);

        assert_eq!(metrics.acquire_attempts.get(), 2);
        assert_eq!(metrics.acquisitions.get(), 1);
        assert_eq!(metrics.releases.get(), 2);
        assert_eq!(metrics.release_failures.get(), 1);
        assert_eq!(metrics.cancellations.get(), 1);
        assert_eq!(metrics.cancel_failures.get(), 1);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = PartitionMetrics::new();
        metrics.set_ownership(2, 8, 6);

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.owned_partitions, 2);
        assert_eq!(snapshot.pending_acquisitions, 6);
        assert!((snapshot.convergence() - 0.25).abs() < 0.001);
        assert!((MetricsSnapshot::default().convergence() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = PartitionMetrics::new();
        metrics.record_acquired();

        let output = metrics.to_prometheus();

        assert!(output.contains("# TYPE partition_acquisitions_total counter"));
        assert!(output.contains("partition_acquisitions_total 1"));
        assert!(output.contains("# TYPE partition_owned gauge"));
    }
}
