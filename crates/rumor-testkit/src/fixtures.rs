//! Test fixtures and helpers.
//!
//! [`MemoryCluster`] runs the exchange steps directly against a set of
//! stores, with no transport in between, so convergence and eviction can be
//! studied round by round under a [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rumor_core::{duration_millis, Clock, NodeIdentity, ReplicatedState, Timestamp};
use rumor_store::{Evicted, MemoryStore, Store, StoreExt};
use rumor_sync::{verify_convergence, ConvergenceResult};

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// A clock reading `millis`.
    pub fn at(millis: i64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicI64::new(millis),
        })
    }

    /// Jump to `millis`.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.millis.fetch_add(duration_millis(d), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Who each node is configured to gossip with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Node `i` knows only node `i + 1`; the last node knows nobody.
    Line,
    /// Node `i` knows node `i + 1`, wrapping around.
    Ring,
    /// Every node knows every other node.
    Complete,
}

impl Topology {
    fn neighbors(self, i: usize, n: usize) -> Vec<usize> {
        match self {
            Topology::Line if i + 1 < n => vec![i + 1],
            Topology::Line => vec![],
            Topology::Ring if n > 1 => vec![(i + 1) % n],
            Topology::Ring => vec![],
            Topology::Complete => (0..n).filter(|&j| j != i).collect(),
        }
    }
}

/// Identity of the `i`th simulated node.
pub fn node_id(i: usize) -> NodeIdentity {
    NodeIdentity::new(format!("node-{i}"), 7000)
}

/// An in-process cluster of stores sharing one manual clock.
pub struct MemoryCluster {
    stores: Vec<Arc<MemoryStore>>,
    /// Nodes that no longer take part in exchanges.
    down: Vec<bool>,
    clock: Arc<ManualClock>,
    ttl: Duration,
}

impl MemoryCluster {
    /// Default TTL, matching the node default.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

    /// Create `n` nodes wired by `topology`, seeded at time 1 000 000 ms.
    pub fn new(n: usize, topology: Topology) -> Self {
        let clock = ManualClock::at(1_000_000);
        let stores = (0..n)
            .map(|i| {
                let neighbors = topology.neighbors(i, n).into_iter().map(node_id);
                Arc::new(MemoryStore::seeded(node_id(i), neighbors, clock.now()))
            })
            .collect();

        Self {
            stores,
            down: vec![false; n],
            clock,
            ttl: Self::DEFAULT_TTL,
        }
    }

    /// Use a different TTL for exchanges.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of nodes, including stopped ones.
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// True if the cluster has no nodes.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// The shared clock.
    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Store of node `i`.
    pub fn store(&self, i: usize) -> &Arc<MemoryStore> {
        &self.stores[i]
    }

    /// Stop node `i`: it neither initiates nor answers exchanges.
    pub fn stop(&mut self, i: usize) {
        self.down[i] = true;
    }

    /// One full exchange from `from` to `to`.
    ///
    /// Returns `None` when `to` is stopped, after running the same
    /// TTL-conditional eviction a real failed exchange triggers.
    pub async fn exchange(
        &self,
        from: usize,
        to: usize,
    ) -> rumor_store::Result<Option<(Evicted, Evicted)>> {
        let now = self.clock.now();
        let initiator = &self.stores[from];

        if self.down[to] {
            let peer = self.stores[to].local_id();
            initiator.evict_if_expired(peer, now, self.ttl).await?;
            return Ok(None);
        }

        let push = initiator.prepare_push(now).await?;
        let (reply, responder_evicted) = self.stores[to].respond(&push, now, self.ttl).await?;
        let initiator_evicted = initiator.absorb(&reply, now, self.ttl).await?;
        Ok(Some((initiator_evicted, responder_evicted)))
    }

    /// Every running node with neighbors gossips once with a random
    /// neighbor, in a shuffled order.
    pub async fn gossip_round(&self, rng: &mut StdRng) -> rumor_store::Result<()> {
        let mut order: Vec<usize> = (0..self.len()).filter(|&i| !self.down[i]).collect();
        order.shuffle(rng);

        for from in order {
            let neighbors = self.stores[from].neighbors().await?;
            let Some(peer) = neighbors.choose(rng) else {
                continue;
            };
            if let Some(to) = self.index_of(peer) {
                self.exchange(from, to).await?;
            }
        }
        Ok(())
    }

    /// Gossip until the running nodes agree, for at most `max_rounds`.
    ///
    /// Returns the number of rounds taken, or `None` if they never agreed.
    pub async fn run_until_converged(
        &self,
        seed: u64,
        max_rounds: usize,
    ) -> rumor_store::Result<Option<usize>> {
        let mut rng = StdRng::seed_from_u64(seed);
        for round in 1..=max_rounds {
            self.gossip_round(&mut rng).await?;
            if self.convergence().await?.is_converged() {
                return Ok(Some(round));
            }
        }
        Ok(None)
    }

    /// Convergence of the running nodes.
    pub async fn convergence(&self) -> rumor_store::Result<ConvergenceResult> {
        let mut running = Vec::with_capacity(self.len());
        for (store, down) in self.stores.iter().zip(&self.down) {
            if !down {
                running.push(store.snapshot().await?);
            }
        }
        Ok(verify_convergence(&running))
    }

    /// Snapshots of every node, stopped ones included.
    pub async fn snapshots(&self) -> rumor_store::Result<Vec<ReplicatedState>> {
        let mut out = Vec::with_capacity(self.len());
        for store in &self.stores {
            out.push(store.snapshot().await?);
        }
        Ok(out)
    }

    fn index_of(&self, id: &NodeIdentity) -> Option<usize> {
        self.stores.iter().position(|s| s.local_id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::at(10);
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now(), Timestamp::from_millis(15));
        clock.set(-3);
        assert_eq!(clock.now(), Timestamp::from_millis(-3));
    }

    #[test]
    fn test_topologies() {
        assert_eq!(Topology::Line.neighbors(0, 3), vec![1]);
        assert!(Topology::Line.neighbors(2, 3).is_empty());
        assert_eq!(Topology::Ring.neighbors(2, 3), vec![0]);
        assert_eq!(Topology::Complete.neighbors(1, 3), vec![0, 2]);
        assert!(Topology::Ring.neighbors(0, 1).is_empty());
    }

    #[tokio::test]
    async fn test_exchange_to_stopped_node() {
        let mut cluster = MemoryCluster::new(2, Topology::Line);
        cluster.stop(1);
        assert!(cluster.exchange(0, 1).await.unwrap().is_none());
        assert_eq!(cluster.store(0).neighbors().await.unwrap(), vec![node_id(1)]);
    }
}
