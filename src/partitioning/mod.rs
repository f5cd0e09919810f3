//! Partitioning module for distributing partitions across cluster nodes.
//!
//! This module implements consistent hashing for partition assignment:
//! - Deterministic mapping from a partition to exactly one member
//! - Minimal redistribution when members join/leave
//! - Pure reconciliation planning between target and current ownership
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HashRing                               │
//! │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐            │
//! │  │s1:0 │→│s2:7 │→│s3:2 │→│s1:9 │→│s2:1 │→│s3:4 │  ...       │
//! │  └─────┘ └─────┘ └─────┘ └─────┘ └─────┘ └─────┘            │
//! │      256 virtual nodes per member                           │
//! └─────────────────────────────────────────────────────────────┘
//!             │ target_partitions(ring, "s1", 32)
//!             ▼
//!   target {0, 5, 9, ...} ──┐
//!                           ├─► ReconcilePlan { Acquire, CancelAcquire, Release }
//!   current {0, 9, ...}  ───┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use partition_client::partitioning::{target_partitions, HashRing, DEFAULT_VNODES_PER_NODE};
//!
//! let ring = HashRing::from_nodes(DEFAULT_VNODES_PER_NODE, ["s1", "s2", "s3"]);
//! let owner = ring.get_node("7").unwrap();
//! assert!(target_partitions(&ring, owner, 32).contains(&7));
//! ```

mod hashring;
mod ownership;

pub use hashring::{HashRing, DEFAULT_VNODES_PER_NODE};
pub use ownership::{target_partitions, MembershipDelta, ReconcileAction, ReconcilePlan};
