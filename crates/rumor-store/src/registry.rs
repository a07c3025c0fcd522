//! The membership registry: neighbors this node actively gossips with.
//!
//! The registry is seeded once from configuration and afterwards only shrinks,
//! when an eviction pass removes a neighbor's record. Evicted neighbors are
//! never re-admitted.

use std::collections::BTreeSet;

use rand::seq::IteratorRandom;
use rand::Rng;
use rumor_core::NodeIdentity;

/// The neighbor set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    neighbors: BTreeSet<NodeIdentity>,
}

impl Registry {
    /// Seed from configuration. The local identity and duplicates are dropped.
    pub fn seeded(neighbors: impl IntoIterator<Item = NodeIdentity>, local: &NodeIdentity) -> Self {
        Self {
            neighbors: neighbors.into_iter().filter(|id| id != local).collect(),
        }
    }

    /// Whether `id` is a neighbor.
    pub fn contains(&self, id: &NodeIdentity) -> bool {
        self.neighbors.contains(id)
    }

    /// Number of neighbors.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Whether no neighbors remain.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Iterate neighbors in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeIdentity> + '_ {
        self.neighbors.iter()
    }

    /// Pick a neighbor uniformly at random.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&NodeIdentity> {
        self.neighbors.iter().choose(rng)
    }

    /// Remove every listed identity. Returns how many were neighbors.
    pub(crate) fn prune<'a>(&mut self, evicted: impl IntoIterator<Item = &'a NodeIdentity>) -> usize {
        evicted
            .into_iter()
            .filter(|id| self.neighbors.remove(*id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn id(port: u16) -> NodeIdentity {
        NodeIdentity::new("127.0.0.1", port)
    }

    #[test]
    fn test_seeded_drops_local_and_duplicates() {
        let registry = Registry::seeded([id(1), id(2), id(2), id(9)], &id(9));
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&id(9)));
    }

    #[test]
    fn test_choose_on_empty() {
        let registry = Registry::default();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(registry.choose(&mut rng).is_none());
    }

    #[test]
    fn test_choose_reaches_every_neighbor() {
        let registry = Registry::seeded((1..=5).map(id), &id(0));
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = BTreeSet::new();
        for _ in 0..500 {
            seen.insert(registry.choose(&mut rng).cloned().unwrap());
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_prune_counts_only_neighbors() {
        let mut registry = Registry::seeded([id(1), id(2)], &id(0));
        let removed = registry.prune([id(2), id(3)].iter());
        assert_eq!(removed, 1);
        assert_eq!(registry.iter().collect::<Vec<_>>(), vec![&id(1)]);
    }

    proptest::proptest! {
        #[test]
        fn prune_removes_exactly_the_evicted_neighbors(
            seeded in proptest::collection::btree_set(1u16..32, 0..16),
            evicted in proptest::collection::btree_set(1u16..48, 0..16),
        ) {
            let mut registry = Registry::seeded(seeded.iter().copied().map(id), &id(0));
            let evicted: Vec<NodeIdentity> = evicted.into_iter().map(id).collect();

            let removed = registry.prune(evicted.iter());

            let expected: BTreeSet<NodeIdentity> = seeded
                .iter()
                .copied()
                .map(id)
                .filter(|n| !evicted.contains(n))
                .collect();
            proptest::prop_assert_eq!(removed, seeded.len() - expected.len());
            proptest::prop_assert_eq!(registry.iter().cloned().collect::<BTreeSet<_>>(), expected);
        }
    }
}
