//! In-process coordination service.
//!
//! `MemoryCoordinator` behaves like a single coordination server shared by
//! every session created from it (clones share state). Locks are keyed by
//! path and held by one lock object at a time. A session's locks are
//! ephemeral: they disappear when the session stops.
//!
//! Failure injection lets tests exercise the best-effort cleanup paths.

use super::{CoordinationBackend, CoordinationResult, CoordinationSession, ExclusiveLock};
use crate::error::CoordinationError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureMode {
    /// `CoordinationBackend::connect`.
    Connect,
    /// `ExclusiveLock::try_acquire`.
    Acquire,
    /// `ExclusiveLock::release`.
    Release,
    /// `ExclusiveLock::cancel`.
    Cancel,
    /// `CoordinationSession::stop`.
    Stop,
    /// `CoordinationSession::close`.
    Close,
}

/// Current holder of a lock path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Holder {
    session: Uuid,
    lock_id: Uuid,
    identifier: String,
}

#[derive(Debug, Default)]
struct ServerState {
    holders: DashMap<String, Holder>,
    failures: RwLock<HashSet<FailureMode>>,
    acquire_attempts: AtomicU64,
    cancel_calls: AtomicU64,
}

impl ServerState {
    fn check(&self, mode: FailureMode, path: &str) -> CoordinationResult<()> {
        if self.failures.read().contains(&mode) {
            return Err(CoordinationError::OperationFailed {
                path: path.to_string(),
                reason: format!("injected {:?} failure", mode),
            });
        }
        Ok(())
    }
}

/// Shared in-memory coordination server.
#[derive(Debug, Clone, Default)]
pub struct MemoryCoordinator {
    state: Arc<ServerState>,
}

impl MemoryCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `mode` operations fail (`true`) or succeed again (`false`).
    pub fn inject_failure(&self, mode: FailureMode, enabled: bool) {
        let mut failures = self.state.failures.write();
        if enabled {
            failures.insert(mode);
        } else {
            failures.remove(&mode);
        }
    }

    /// Identifier of the contender holding `path`, if any.
    pub fn holder(&self, path: &str) -> Option<String> {
        self.state.holders.get(path).map(|h| h.identifier.clone())
    }

    /// Paths currently held by contenders named `identifier`, sorted.
    pub fn held_by(&self, identifier: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .state
            .holders
            .iter()
            .filter(|e| e.value().identifier == identifier)
            .map(|e| e.key().clone())
            .collect();
        paths.sort();
        paths
    }

    /// Number of locks currently held.
    pub fn held_count(&self) -> usize {
        self.state.holders.len()
    }

    /// Total `try_acquire` calls seen.
    pub fn acquire_attempts(&self) -> u64 {
        self.state.acquire_attempts.load(Ordering::Relaxed)
    }

    /// Total `cancel` calls seen.
    pub fn cancel_calls(&self) -> u64 {
        self.state.cancel_calls.load(Ordering::Relaxed)
    }

    /// Open a session directly, without going through the trait object.
    pub fn session(&self, identifier: &str) -> Arc<MemorySession> {
        Arc::new(MemorySession {
            shared: Arc::new(SessionShared {
                id: Uuid::new_v4(),
                identifier: identifier.to_string(),
                phase: Mutex::new(SessionPhase::Created),
                server: Arc::clone(&self.state),
            }),
        })
    }
}

#[async_trait]
impl CoordinationBackend for MemoryCoordinator {
    async fn connect(
        &self,
        endpoint: &str,
        identifier: &str,
    ) -> CoordinationResult<Arc<dyn CoordinationSession>> {
        if endpoint.is_empty() || self.state.failures.read().contains(&FailureMode::Connect) {
            return Err(CoordinationError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: "unreachable".to_string(),
            });
        }

        let session = self.session(identifier);
        tracing::debug!(endpoint, identifier, session = %session.shared.id, "Session opened");
        Ok(session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Created,
    Started,
    Stopped,
    Closed,
}

#[derive(Debug)]
struct SessionShared {
    id: Uuid,
    identifier: String,
    phase: Mutex<SessionPhase>,
    server: Arc<ServerState>,
}

impl SessionShared {
    fn ensure_started(&self) -> CoordinationResult<()> {
        if *self.phase.lock() == SessionPhase::Started {
            Ok(())
        } else {
            Err(CoordinationError::SessionClosed)
        }
    }

    fn drop_locks(&self) -> usize {
        let before = self.server.holders.len();
        self.server.holders.retain(|_, h| h.session != self.id);
        before.saturating_sub(self.server.holders.len())
    }
}

/// A session on a [`MemoryCoordinator`].
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<SessionShared>,
}

impl MemorySession {
    /// Whether the session is started and usable.
    pub fn is_active(&self) -> bool {
        *self.shared.phase.lock() == SessionPhase::Started
    }
}

#[async_trait]
impl CoordinationSession for MemorySession {
    fn session_id(&self) -> String {
        self.shared.id.to_string()
    }

    async fn start(&self) -> CoordinationResult<()> {
        let mut phase = self.shared.phase.lock();
        match *phase {
            SessionPhase::Created | SessionPhase::Stopped => {
                *phase = SessionPhase::Started;
                Ok(())
            }
            SessionPhase::Started => Ok(()),
            SessionPhase::Closed => Err(CoordinationError::SessionClosed),
        }
    }

    fn lock(&self, path: &str, identifier: &str) -> Arc<dyn ExclusiveLock> {
        Arc::new(MemoryLock {
            path: path.to_string(),
            identifier: identifier.to_string(),
            lock_id: Uuid::new_v4(),
            session: Arc::clone(&self.shared),
        })
    }

    async fn stop(&self) -> CoordinationResult<()> {
        self.shared.server.check(FailureMode::Stop, "/")?;

        let mut phase = self.shared.phase.lock();
        if *phase == SessionPhase::Started {
            *phase = SessionPhase::Stopped;
            let dropped = self.shared.drop_locks();
            tracing::debug!(
                session = %self.shared.id,
                identifier = %self.shared.identifier,
                dropped,
                "Session stopped"
            );
        }
        Ok(())
    }

    async fn close(&self) -> CoordinationResult<()> {
        self.shared.server.check(FailureMode::Close, "/")?;

        let mut phase = self.shared.phase.lock();
        if *phase != SessionPhase::Closed {
            *phase = SessionPhase::Closed;
            // Closing without a prior stop still drops ephemeral locks.
            self.shared.drop_locks();
        }
        Ok(())
    }
}

/// An exclusive lock on a [`MemoryCoordinator`].
#[derive(Debug)]
struct MemoryLock {
    path: String,
    identifier: String,
    lock_id: Uuid,
    session: Arc<SessionShared>,
}

#[async_trait]
impl ExclusiveLock for MemoryLock {
    fn path(&self) -> &str {
        &self.path
    }

    async fn try_acquire(&self) -> CoordinationResult<bool> {
        let server = &self.session.server;
        server.acquire_attempts.fetch_add(1, Ordering::Relaxed);
        server.check(FailureMode::Acquire, &self.path)?;
        self.session.ensure_started()?;

        match server.holders.entry(self.path.clone()) {
            Entry::Occupied(e) => Ok(e.get().lock_id == self.lock_id),
            Entry::Vacant(e) => {
                e.insert(Holder {
                    session: self.session.id,
                    lock_id: self.lock_id,
                    identifier: self.identifier.clone(),
                });
                Ok(true)
            }
        }
    }

    async fn release(&self) -> CoordinationResult<()> {
        let server = &self.session.server;
        server.check(FailureMode::Release, &self.path)?;

        let removed = server
            .holders
            .remove_if(&self.path, |_, h| h.lock_id == self.lock_id);
        if removed.is_some() {
            Ok(())
        } else {
            Err(CoordinationError::NotHeld(self.path.clone()))
        }
    }

    async fn cancel(&self) -> CoordinationResult<()> {
        let server = &self.session.server;
        server.cancel_calls.fetch_add(1, Ordering::Relaxed);
        server.check(FailureMode::Cancel, &self.path)?;
        // Non-blocking acquisitions never queue, so nothing is left to withdraw.
        Ok(())
    }
}
