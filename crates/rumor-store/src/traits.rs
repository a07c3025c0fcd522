//! Store trait: the abstract interface for membership state.
//!
//! This trait keeps the gossip engine storage-agnostic. The only
//! implementation shipped is in-memory; membership is never persisted.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use rumor_core::{MergeReport, NodeIdentity, ReplicatedState, Timestamp};

use crate::error::Result;

/// Identities removed by one eviction pass.
///
/// Every removed identity is gone from the replicated state, and from the
/// registry if it was a neighbor, in the same critical section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evicted {
    /// Identities removed from the replicated state.
    pub removed: BTreeSet<NodeIdentity>,
    /// How many of them were also neighbors.
    pub neighbors_pruned: usize,
}

impl Evicted {
    /// True when nothing was evicted.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    /// Number of evicted identities.
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    /// Whether `id` was evicted.
    pub fn contains(&self, id: &NodeIdentity) -> bool {
        self.removed.contains(id)
    }

    /// Iterate evicted identities.
    pub fn iter(&self) -> btree_set::Iter<'_, NodeIdentity> {
        self.removed.iter()
    }
}

/// The Store trait: async interface for membership state.
///
/// Every method is one critical section against the shared state and
/// registry. Implementations must never hold their guard across an `.await`.
///
/// # Design Notes
///
/// - **Owner-only touch**: only [`touch_self`](Store::touch_self) writes a
///   fresh timestamp, and only for [`local_id`](Store::local_id).
/// - **Paired eviction**: eviction removes an identity from the state and the
///   registry together.
/// - **Local immunity**: the local identity is never evicted from its own store.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The identity of the node owning this store.
    fn local_id(&self) -> &NodeIdentity;

    /// A consistent, independent copy of the replicated state.
    async fn snapshot(&self) -> Result<ReplicatedState>;

    /// Last-seen timestamp for `id`, if known.
    async fn last_seen(&self, id: &NodeIdentity) -> Result<Option<Timestamp>>;

    /// Current neighbors, in identity order.
    async fn neighbors(&self) -> Result<Vec<NodeIdentity>>;

    /// A neighbor chosen uniformly at random, or `None` if there are none.
    async fn choose_neighbor(&self) -> Result<Option<NodeIdentity>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Primitive mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge a remote snapshot (last-write-wins), without evicting.
    async fn merge(&self, remote: &ReplicatedState) -> Result<MergeReport>;

    /// Stamp the local identity with `now`.
    async fn touch_self(&self, now: Timestamp) -> Result<()>;

    /// Evict every record with `now - ts > ttl` from state and registry.
    ///
    /// This is the single eviction path: the composite operations below and
    /// the failed-exchange path all go through it.
    async fn evict_expired(&self, now: Timestamp, ttl: Duration) -> Result<Evicted>;

    // ─────────────────────────────────────────────────────────────────────────
    // Exchange steps (each one critical section)
    // ─────────────────────────────────────────────────────────────────────────

    /// Outbound push: touch self, then snapshot.
    async fn prepare_push(&self, now: Timestamp) -> Result<ReplicatedState>;

    /// Outbound merge-evict: merge the peer's reply, then evict.
    async fn absorb(
        &self,
        remote: &ReplicatedState,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<Evicted>;

    /// Inbound exchange: merge, evict, touch self, then snapshot the result.
    async fn respond(
        &self,
        remote: &ReplicatedState,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<(ReplicatedState, Evicted)>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Eviction after an exchange attempt that produced no reply.
    ///
    /// A failed exchange is a soft signal: the unreachable `peer` is only
    /// removed if its last-known record is already older than `ttl`;
    /// otherwise it stays a neighbor and is retried on a later cycle.
    fn evict_if_expired(
        &self,
        peer: &NodeIdentity,
        now: Timestamp,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<Evicted>> + Send;

    /// Members whose records are within `ttl` of `now`, with their timestamps.
    fn alive_members(
        &self,
        now: Timestamp,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<Vec<(NodeIdentity, Timestamp)>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn evict_if_expired(
        &self,
        peer: &NodeIdentity,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<Evicted> {
        let evicted = self.evict_expired(now, ttl).await?;
        if evicted.contains(peer) {
            tracing::warn!(%peer, "unreachable neighbor exceeded ttl, evicted");
        } else {
            tracing::debug!(%peer, "unreachable neighbor still within ttl, will retry");
        }
        Ok(evicted)
    }

    async fn alive_members(
        &self,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<Vec<(NodeIdentity, Timestamp)>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .iter()
            .filter(|(_, ts)| !ts.is_expired(now, ttl))
            .map(|(id, ts)| (id.clone(), ts))
            .collect())
    }
}
