//! In-memory implementation of the Store trait.
//!
//! State and registry live behind one `std::sync::Mutex`. Each trait method
//! takes the lock once, does its in-memory work and releases it before
//! returning, so no guard ever crosses an `.await`.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rumor_core::{MergeReport, NodeIdentity, ReplicatedState, Timestamp};

use crate::error::{Result, StoreError};
use crate::registry::Registry;
use crate::traits::{Evicted, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped.
pub struct MemoryStore {
    local: NodeIdentity,
    inner: Mutex<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Replicated membership records.
    state: ReplicatedState,

    /// Neighbors this node initiates exchanges with.
    registry: Registry,
}

impl MemoryStoreInner {
    fn evict(&mut self, local: &NodeIdentity, now: Timestamp, ttl: Duration) -> Evicted {
        let removed = self.state.evict_expired_except(now, ttl, local);
        let neighbors_pruned = self.registry.prune(&removed);

        for id in &removed {
            tracing::info!(member = %id, %now, "evicted expired member");
        }

        Evicted {
            removed,
            neighbors_pruned,
        }
    }

    fn touch(&mut self, local: &NodeIdentity, now: Timestamp) {
        self.state.touch(local, now);
    }
}

impl MemoryStore {
    /// Create a store with no neighbors.
    pub fn new(local: NodeIdentity, now: Timestamp) -> Self {
        Self::seeded(local, std::iter::empty(), now)
    }

    /// Create the startup store: the local identity and each neighbor get a
    /// record stamped `at`, and every neighbor except the local identity is
    /// registered.
    pub fn seeded(
        local: NodeIdentity,
        neighbors: impl IntoIterator<Item = NodeIdentity>,
        at: Timestamp,
    ) -> Self {
        let registry = Registry::seeded(neighbors, &local);
        let state = ReplicatedState::seeded(&local, registry.iter().cloned(), at);

        Self {
            local,
            inner: Mutex::new(MemoryStoreInner { state, registry }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStoreInner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` with the guard held.
    fn with_inner<T>(&self, f: impl FnOnce(&mut MemoryStoreInner) -> T) -> Result<T> {
        let mut inner = self.lock()?;
        Ok(f(&mut inner))
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn local_id(&self) -> &NodeIdentity {
        &self.local
    }

    async fn snapshot(&self) -> Result<ReplicatedState> {
        self.with_inner(|inner| inner.state.clone())
    }

    async fn last_seen(&self, id: &NodeIdentity) -> Result<Option<Timestamp>> {
        self.with_inner(|inner| inner.state.get(id))
    }

    async fn neighbors(&self) -> Result<Vec<NodeIdentity>> {
        self.with_inner(|inner| inner.registry.iter().cloned().collect())
    }

    async fn choose_neighbor(&self) -> Result<Option<NodeIdentity>> {
        self.with_inner(|inner| inner.registry.choose(&mut rand::thread_rng()).cloned())
    }

    async fn merge(&self, remote: &ReplicatedState) -> Result<MergeReport> {
        self.with_inner(|inner| inner.state.merge(remote))
    }

    async fn touch_self(&self, now: Timestamp) -> Result<()> {
        let local = &self.local;
        self.with_inner(|inner| inner.touch(local, now))
    }

    async fn evict_expired(&self, now: Timestamp, ttl: Duration) -> Result<Evicted> {
        let local = &self.local;
        self.with_inner(|inner| inner.evict(local, now, ttl))
    }

    async fn prepare_push(&self, now: Timestamp) -> Result<ReplicatedState> {
        let local = &self.local;
        self.with_inner(|inner| {
            inner.touch(local, now);
            inner.state.clone()
        })
    }

    async fn absorb(
        &self,
        remote: &ReplicatedState,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<Evicted> {
        let local = &self.local;
        self.with_inner(|inner| {
            let report = inner.state.merge(remote);
            tracing::trace!(
                adopted = report.adopted.len(),
                refreshed = report.refreshed.len(),
                "merged remote snapshot"
            );
            inner.evict(local, now, ttl)
        })
    }

    async fn respond(
        &self,
        remote: &ReplicatedState,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<(ReplicatedState, Evicted)> {
        let local = &self.local;
        self.with_inner(|inner| {
            inner.state.merge(remote);
            let evicted = inner.evict(local, now, ttl);
            inner.touch(local, now);
            (inner.state.clone(), evicted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(60);

    fn id(name: &str) -> NodeIdentity {
        NodeIdentity::new(name, 7000)
    }

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn state(entries: &[(&str, i64)]) -> ReplicatedState {
        entries.iter().map(|(n, t)| (id(n), ts(*t))).collect()
    }

    #[tokio::test]
    async fn test_seeded_store() {
        let store = MemoryStore::seeded(id("a"), [id("b"), id("a"), id("c")], ts(5));

        assert_eq!(store.neighbors().await.unwrap(), vec![id("b"), id("c")]);
        assert_eq!(store.snapshot().await.unwrap(), state(&[("a", 5), ("b", 5), ("c", 5)]));
    }

    #[tokio::test]
    async fn test_prepare_push_touches_self() {
        let store = MemoryStore::new(id("a"), ts(0));
        let push = store.prepare_push(ts(1234)).await.unwrap();
        assert_eq!(push.get(&id("a")), Some(ts(1234)));
    }

    #[tokio::test]
    async fn test_absorb_keeps_fresher_self() {
        let store = MemoryStore::new(id("a"), ts(0));
        let push = store.prepare_push(ts(100)).await.unwrap();
        assert_eq!(push, state(&[("a", 100)]));

        store.absorb(&state(&[("a", 90), ("c", 50)]), ts(100), TTL).await.unwrap();

        assert_eq!(store.snapshot().await.unwrap(), state(&[("a", 100), ("c", 50)]));
    }

    #[tokio::test]
    async fn test_stale_neighbor_evicted_from_state_and_registry() {
        let now = 1_000_000;
        let store = MemoryStore::seeded(id("a"), [id("b"), id("c")], ts(now));
        let later = ts(now + 61_000);
        store.merge(&state(&[("c", later.as_millis())])).await.unwrap();

        let evicted = store.evict_expired(later, TTL).await.unwrap();

        assert!(evicted.contains(&id("b")));
        assert_eq!(evicted.neighbors_pruned, 1);
        assert_eq!(store.neighbors().await.unwrap(), vec![id("c")]);
        assert_eq!(store.last_seen(&id("b")).await.unwrap(), None);
        // The local record was never touched, but the owner is never evicted.
        assert!(store.last_seen(&id("a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_respond_merges_evicts_touches() {
        let store = MemoryStore::seeded(id("a"), [id("b")], ts(0));
        let now = ts(120_000);

        let (reply, evicted) = store
            .respond(&state(&[("c", 100_000), ("d", 10)]), now, TTL)
            .await
            .unwrap();

        assert!(evicted.contains(&id("b")));
        assert!(evicted.contains(&id("d")));
        assert_eq!(reply, state(&[("a", 120_000), ("c", 100_000)]));
        assert!(store.neighbors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evict_if_expired_retains_fresh_peer() {
        let store = MemoryStore::seeded(id("a"), [id("b")], ts(1_000));

        let evicted = store.evict_if_expired(&id("b"), ts(30_000), TTL).await.unwrap();
        assert!(evicted.is_empty());
        assert_eq!(store.neighbors().await.unwrap(), vec![id("b")]);

        let evicted = store.evict_if_expired(&id("b"), ts(61_001), TTL).await.unwrap();
        assert!(evicted.contains(&id("b")));
        assert!(store.neighbors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evicted_member_can_be_relearned_but_not_readmitted() {
        let store = MemoryStore::seeded(id("a"), [id("b")], ts(0));
        store.evict_expired(ts(61_000), TTL).await.unwrap();

        store.absorb(&state(&[("b", 61_000)]), ts(61_000), TTL).await.unwrap();

        assert_eq!(store.last_seen(&id("b")).await.unwrap(), Some(ts(61_000)));
        assert!(store.neighbors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_choose_neighbor() {
        let empty = MemoryStore::new(id("a"), ts(0));
        assert_eq!(empty.choose_neighbor().await.unwrap(), None);

        let one = MemoryStore::seeded(id("a"), [id("b")], ts(0));
        assert_eq!(one.choose_neighbor().await.unwrap(), Some(id("b")));
    }

    #[tokio::test]
    async fn test_alive_members() {
        let store = MemoryStore::seeded(id("a"), [id("b")], ts(0));
        store.touch_self(ts(100_000)).await.unwrap();

        let alive = store.alive_members(ts(100_000), TTL).await.unwrap();
        assert_eq!(alive, vec![(id("a"), ts(100_000))]);
    }

    /// Every remote snapshot carries a pair of records with equal timestamps.
    /// If a merge were ever observed half-applied, a returned snapshot would
    /// show the pair with different timestamps.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_exchanges_never_observe_torn_state() {
        let store = Arc::new(MemoryStore::new(id("self"), ts(0)));
        let ttl = Duration::from_secs(3600);
        let mut tasks = Vec::new();

        for worker in 0..8i64 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                for round in 0..200i64 {
                    let stamp = worker * 1_000 + round;
                    let remote = state(&[("x", stamp), ("y", stamp)]);
                    let snapshot = if worker % 2 == 0 {
                        store.respond(&remote, ts(stamp), ttl).await.unwrap().0
                    } else {
                        store.prepare_push(ts(stamp)).await.unwrap();
                        store.absorb(&remote, ts(stamp), ttl).await.unwrap();
                        store.snapshot().await.unwrap()
                    };
                    assert_eq!(snapshot.get(&id("x")), snapshot.get(&id("y")));
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        let last = store.snapshot().await.unwrap();
        assert_eq!(last.get(&id("x")), Some(ts(7_199)));
    }
}
