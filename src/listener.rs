//! Ownership change notifications.

use crate::types::PartitionId;

/// Receives the full set of partitions owned by the local node whenever it
/// changes.
///
/// Implementations must not call back into the partition client: the
/// notification is delivered while the client's ownership state is locked.
pub trait OwnershipListener: Send + Sync + 'static {
    /// Called with every partition currently owned, in ascending order.
    fn on_ownership_change(&self, owned: &[PartitionId]);
}

impl<F> OwnershipListener for F
where
    F: Fn(&[PartitionId]) + Send + Sync + 'static,
{
    fn on_ownership_change(&self, owned: &[PartitionId]) {
        self(owned)
    }
}

/// No-op listener.
pub struct NoopListener;

impl OwnershipListener for NoopListener {
    fn on_ownership_change(&self, _owned: &[PartitionId]) {}
}

/// Listener that logs every change.
pub struct LoggingListener;

impl OwnershipListener for LoggingListener {
    fn on_ownership_change(&self, owned: &[PartitionId]) {
        tracing::info!(count = owned.len(), partitions = ?owned, "Partition ownership changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closure_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = move |owned: &[PartitionId]| sink.lock().push(owned.to_vec());

        listener.on_ownership_change(&[1, 4]);
        listener.on_ownership_change(&[]);
        NoopListener.on_ownership_change(&[2]);
        LoggingListener.on_ownership_change(&[3]);

        assert_eq!(*seen.lock(), vec![vec![1, 4], vec![]]);
    }
}
