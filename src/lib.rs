//! Partition ownership for fixed-size clusters.
//!
//! Every node of a cluster runs a [`PartitionClient`]. The clients agree on
//! who should own each partition of the fixed space `0..max_partition`
//! through a consistent hash ring over the member names, and each node
//! proves ownership by holding the partition's lock in an external
//! coordination service.
//!
//! # Features
//!
//! - Deterministic assignment via consistent hashing with virtual nodes
//! - Minimal partition movement when members join or leave
//! - Background, retry-forever lock acquisition per partition
//! - Best-effort release and cancellation that never fail the caller
//! - Ownership change notifications and Prometheus-style metrics
//!
//! # Example
//!
//! ```rust,no_run
//! use partition_client::{MemoryCoordinator, PartitionClient, PartitionConfig, PartitionId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = MemoryCoordinator::new();
//!     let cluster = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];
//!     let config = PartitionConfig::new("test", "s1", cluster, 32, "zookeeper_s1:2181");
//!
//!     let client = PartitionClient::new(config, &coordinator, |owned: &[PartitionId]| {
//!         println!("ownership change: {:?}", owned);
//!     })
//!     .await?;
//!
//!     if client.own_partition(1) {
//!         // do something with partition #1
//!     }
//!
//!     client
//!         .update_cluster_list(vec!["s1".to_string(), "s2".to_string()])
//!         .await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Application                   │
//! │   own_partition(p)   update_cluster_list()  │
//! └─────────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────────┐
//! │        PartitionClient (reconciler)         │
//! │  target ◄── HashRing     current ◄── tasks  │
//! └─────────────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┐
//!     ▼               ▼               ▼
//! ┌─────────┐   ┌──────────┐   ┌────────────┐
//! │HashRing │   │Acquisition│  │Coordination│
//! │(xxHash) │   │  Tasks    │  │  Session   │
//! └─────────┘   └──────────┘   └────────────┘
//! ```
//!
//! # Consistency Model
//!
//! - **Assignment**: every client with the same member list computes the same
//!   target sets; they never overlap and always cover the space
//! - **Exclusion**: two nodes never hold a partition at once, as guaranteed
//!   by the coordination service's locks
//! - **Convergence**: a node owns its whole target set once every lock it
//!   needs has been freed by the previous owner

pub mod client;
pub mod config;
pub mod coordination;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod partitioning;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use client::PartitionClient;
pub use config::PartitionConfig;
pub use error::{CoordinationError, Error, Result};
pub use types::{lock_path, NodeName, PartitionId};

// Re-export coordination types
pub use coordination::{
    CoordinationBackend, CoordinationSession, ExclusiveLock, FailureMode, MemoryCoordinator,
    PartitionLockHandle,
};

// Re-export listener types
pub use listener::{LoggingListener, NoopListener, OwnershipListener};

// Re-export partitioning types
pub use partitioning::{HashRing, MembershipDelta, ReconcileAction, ReconcilePlan};

// Re-export metrics types
pub use metrics::{Counter, Gauge, MetricsSnapshot, PartitionMetrics};
