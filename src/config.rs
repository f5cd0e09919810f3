//! Configuration types for the partition client.

use crate::error::{Error, Result};
use crate::partitioning::DEFAULT_VNODES_PER_NODE;
use crate::types::{NodeName, PartitionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between two lock acquisition attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default delay while a lock's in-flight acquisition is being cancelled.
pub const DEFAULT_CANCEL_BACKOFF: Duration = Duration::from_secs(1);

/// Main configuration for a partition client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Application name, used to namespace lock paths.
    pub app_name: String,

    /// Name of the local node. Must be a member of `cluster_list`.
    pub self_name: NodeName,

    /// Initial cluster membership, including the local node.
    pub cluster_list: Vec<NodeName>,

    /// Size of the partition space; partitions are `0..max_partition`.
    pub max_partition: PartitionId,

    /// Address of the coordination service (e.g. `host:port`).
    pub coordination_endpoint: String,

    /// Delay between acquisition attempts for a contended lock.
    pub retry_interval: Duration,

    /// Delay an acquisition task waits while its lock is being cancelled.
    pub cancel_backoff: Duration,

    /// Virtual nodes per cluster member on the hash ring.
    pub vnodes_per_node: usize,
}

impl PartitionConfig {
    /// Create a new configuration with the required parameters.
    pub fn new(
        app_name: impl Into<String>,
        self_name: impl Into<NodeName>,
        cluster_list: Vec<NodeName>,
        max_partition: PartitionId,
        coordination_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            self_name: self_name.into(),
            cluster_list,
            max_partition,
            coordination_endpoint: coordination_endpoint.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            cancel_backoff: DEFAULT_CANCEL_BACKOFF,
            vnodes_per_node: DEFAULT_VNODES_PER_NODE,
        }
    }

    /// Set the delay between acquisition attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the backoff used while a lock acquisition is being cancelled.
    pub fn with_cancel_backoff(mut self, backoff: Duration) -> Self {
        self.cancel_backoff = backoff;
        self
    }

    /// Set the number of virtual nodes per member.
    pub fn with_vnodes_per_node(mut self, vnodes: usize) -> Self {
        self.vnodes_per_node = vnodes;
        self
    }

    /// Check the configuration.
    ///
    /// The local node must appear in the cluster list and the ring needs at
    /// least one virtual node per member.
    pub fn validate(&self) -> Result<()> {
        ensure_member(&self.self_name, &self.cluster_list)?;
        if self.vnodes_per_node == 0 {
            return Err(Error::config("vnodes_per_node must be at least 1"));
        }
        Ok(())
    }
}

/// Fail with a configuration error unless `self_name` is in `cluster_list`.
pub(crate) fn ensure_member(self_name: &str, cluster_list: &[NodeName]) -> Result<()> {
    if cluster_list.iter().any(|n| n == self_name) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "cluster list is missing local server name '{}'",
            self_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Vec<NodeName> {
        vec!["s1".to_string(), "s2".to_string(), "s3".to_string()]
    }

    #[test]
    fn test_default_config() {
        let config = PartitionConfig::new("test", "s1", cluster(), 32, "zk1:2181");
        assert_eq!(config.max_partition, 32);
        assert_eq!(config.retry_interval, DEFAULT_RETRY_INTERVAL);
        assert_eq!(config.cancel_backoff, DEFAULT_CANCEL_BACKOFF);
        assert_eq!(config.vnodes_per_node, DEFAULT_VNODES_PER_NODE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PartitionConfig::new("test", "s2", cluster(), 8, "zk1:2181")
            .with_retry_interval(Duration::from_millis(20))
            .with_cancel_backoff(Duration::from_millis(5))
            .with_vnodes_per_node(64);

        assert_eq!(config.retry_interval, Duration::from_millis(20));
        assert_eq!(config.cancel_backoff, Duration::from_millis(5));
        assert_eq!(config.vnodes_per_node, 64);
    }

    #[test]
    fn test_missing_self_name() {
        let config = PartitionConfig::new("test", "s9", cluster(), 32, "zk1:2181");
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_vnodes_rejected() {
        let config =
            PartitionConfig::new("test", "s1", cluster(), 32, "zk1:2181").with_vnodes_per_node(0);
        assert!(config.validate().is_err());
    }
}
