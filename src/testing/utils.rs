use crate::coordination::{
    CoordinationBackend, CoordinationResult, CoordinationSession, ExclusiveLock, MemoryCoordinator,
};
use crate::listener::OwnershipListener;
use crate::types::{NodeName, PartitionId};
use crate::{PartitionClient, PartitionConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

pub(crate) const RETRY: Duration = Duration::from_millis(10);
pub(crate) const SETTLE: Duration = Duration::from_secs(5);
pub(crate) const CHECK: Duration = Duration::from_millis(5);

/// Turn string literals into owned node names.
pub(crate) fn names(list: &[&str]) -> Vec<NodeName> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Client config with retry intervals short enough for tests.
pub(crate) fn test_config(
    app: &str,
    self_name: &str,
    cluster: &[&str],
    max_partition: PartitionId,
) -> PartitionConfig {
    PartitionConfig::new(app, self_name, names(cluster), max_partition, "memory:2181")
        .with_retry_interval(RETRY)
        .with_cancel_backoff(RETRY / 2)
}

/// Listener recording every ownership list it is handed.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingListener {
    calls: Arc<Mutex<Vec<Vec<PartitionId>>>>,
}

impl RecordingListener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub(crate) fn last(&self) -> Option<Vec<PartitionId>> {
        self.calls.lock().last().cloned()
    }

    pub(crate) fn calls(&self) -> Vec<Vec<PartitionId>> {
        self.calls.lock().clone()
    }
}

impl OwnershipListener for RecordingListener {
    fn on_ownership_change(&self, owned: &[PartitionId]) {
        self.calls.lock().push(owned.to_vec());
    }
}

/// Backend whose locks are granted at once but answer `try_acquire` only
/// after `delay`, so a task can be killed while holding an unreported grant.
#[derive(Debug, Clone)]
pub(crate) struct SlowAcquireCoordinator {
    pub(crate) inner: MemoryCoordinator,
    delay: Duration,
}

impl SlowAcquireCoordinator {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryCoordinator::new(),
            delay,
        }
    }
}

#[async_trait]
impl CoordinationBackend for SlowAcquireCoordinator {
    async fn connect(
        &self,
        endpoint: &str,
        identifier: &str,
    ) -> CoordinationResult<Arc<dyn CoordinationSession>> {
        let inner = self.inner.connect(endpoint, identifier).await?;
        Ok(Arc::new(SlowSession {
            inner,
            delay: self.delay,
        }))
    }
}

#[derive(Debug)]
struct SlowSession {
    inner: Arc<dyn CoordinationSession>,
    delay: Duration,
}

#[async_trait]
impl CoordinationSession for SlowSession {
    fn session_id(&self) -> String {
        self.inner.session_id()
    }

    async fn start(&self) -> CoordinationResult<()> {
        self.inner.start().await
    }

    fn lock(&self, path: &str, identifier: &str) -> Arc<dyn ExclusiveLock> {
        Arc::new(SlowLock {
            inner: self.inner.lock(path, identifier),
            delay: self.delay,
        })
    }

    async fn stop(&self) -> CoordinationResult<()> {
        self.inner.stop().await
    }

    async fn close(&self) -> CoordinationResult<()> {
        self.inner.close().await
    }
}

#[derive(Debug)]
struct SlowLock {
    inner: Arc<dyn ExclusiveLock>,
    delay: Duration,
}

#[async_trait]
impl ExclusiveLock for SlowLock {
    fn path(&self) -> &str {
        self.inner.path()
    }

    async fn try_acquire(&self) -> CoordinationResult<bool> {
        let granted = self.inner.try_acquire().await;
        sleep(self.delay).await;
        granted
    }

    async fn release(&self) -> CoordinationResult<()> {
        self.inner.release().await
    }

    async fn cancel(&self) -> CoordinationResult<()> {
        self.inner.cancel().await
    }
}

/// Wait for a condition with timeout
pub(crate) async fn wait_for<F>(condition: F, timeout: Duration, check_interval: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(check_interval).await;
    }
    condition()
}

/// Wait until `client` owns exactly its target set.
pub(crate) async fn wait_settled(client: &PartitionClient) -> bool {
    wait_for(
        || client.owned_partitions() == client.target_partitions(),
        SETTLE,
        CHECK,
    )
    .await
}

/// A set of clients sharing one in-memory coordination service.
pub(crate) struct TestCluster {
    pub(crate) coordinator: MemoryCoordinator,
    pub(crate) clients: Vec<PartitionClient>,
    pub(crate) listeners: Vec<RecordingListener>,
    app: String,
    max_partition: PartitionId,
}

impl TestCluster {
    /// Start one client per member of `members`, all seeing the same list.
    pub(crate) async fn start(app: &str, members: &[&str], max_partition: PartitionId) -> Self {
        let mut cluster = Self {
            coordinator: MemoryCoordinator::new(),
            clients: Vec::new(),
            listeners: Vec::new(),
            app: app.to_string(),
            max_partition,
        };
        for name in members {
            cluster.spawn_client(name, members).await;
        }
        cluster
    }

    /// Start a client for `name` that sees `members`.
    pub(crate) async fn spawn_client(&mut self, name: &str, members: &[&str]) {
        let listener = RecordingListener::new();
        let config = test_config(&self.app, name, members, self.max_partition);
        let client = PartitionClient::new(config, &self.coordinator, listener.clone())
            .await
            .unwrap();
        self.clients.push(client);
        self.listeners.push(listener);
    }

    pub(crate) fn client(&self, name: &str) -> &PartitionClient {
        self.clients
            .iter()
            .find(|c| c.self_name() == name)
            .expect("unknown client")
    }

    pub(crate) fn listener(&self, name: &str) -> &RecordingListener {
        let idx = self
            .clients
            .iter()
            .position(|c| c.self_name() == name)
            .expect("unknown client");
        &self.listeners[idx]
    }

    /// Push `members` to every running client that is part of it.
    pub(crate) async fn update_all(&self, members: &[&str]) {
        for client in &self.clients {
            if members.contains(&client.self_name()) {
                client.update_cluster_list(names(members)).await.unwrap();
            }
        }
    }

    /// Close the client named `name` and forget it.
    pub(crate) async fn stop_client(&mut self, name: &str) {
        let idx = self
            .clients
            .iter()
            .position(|c| c.self_name() == name)
            .expect("unknown client");
        let client = self.clients.remove(idx);
        self.listeners.remove(idx);
        client.close().await;
    }

    /// Every running client owns exactly its target set.
    pub(crate) fn settled(&self) -> bool {
        self.clients
            .iter()
            .all(|c| c.owned_partitions() == c.target_partitions())
    }

    pub(crate) async fn wait_settled(&self) -> bool {
        wait_for(|| self.settled(), SETTLE, CHECK).await
    }

    /// Union of all owned partitions, failing on overlap.
    pub(crate) fn owned_union(&self) -> BTreeSet<PartitionId> {
        let mut union = BTreeSet::new();
        for client in &self.clients {
            for part in client.owned_partitions() {
                assert!(union.insert(part), "partition {} owned twice", part);
            }
        }
        union
    }

    pub(crate) async fn close_all(&self) {
        for client in &self.clients {
            client.close().await;
        }
    }
}
