//! Testing utilities for the partition client.
//!
//! This module provides tools for running several clients against one
//! in-memory coordination service:
//! - A cluster fixture that starts, updates and stops clients
//! - A listener that records every ownership notification
//! - Polling helpers for waiting on convergence
//! - A backend that delays lock replies, for kill/acquire races
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 TestCluster                   │
//! │                                               │
//! │   ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//! │   │client s1 │   │client s2 │   │client s3 │  │
//! │   └──────────┘   └──────────┘   └──────────┘  │
//! │         │              │              │       │
//! │         └──────────────┼──────────────┘       │
//! │                        ▼                      │
//! │              ┌───────────────────┐            │
//! │              │ MemoryCoordinator │            │
//! │              └───────────────────┘            │
//! └───────────────────────────────────────────────┘
//! ```

mod utils;

pub(crate) use utils::{
    names, test_config, wait_for, wait_settled, RecordingListener, SlowAcquireCoordinator,
    TestCluster, CHECK, RETRY, SETTLE,
};
