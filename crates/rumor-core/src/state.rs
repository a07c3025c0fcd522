//! Replicated membership state: who is alive and when they were last heard from.
//!
//! A [`ReplicatedState`] maps each known [`NodeIdentity`] to the newest
//! [`Timestamp`] this replica has seen for it. Replicas repair each other by
//! exchanging whole snapshots and merging them.
//!
//! Merge rule (last-write-wins):
//! 1. An identity absent locally is adopted.
//! 2. An identity present on both sides keeps the strictly greater timestamp.
//! 3. Ties keep the local value, which equals the remote one anyway.
//!
//! Because the rule is a pointwise `max` over a union of keys, merge is a
//! join: idempotent, commutative and associative.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::types::{NodeIdentity, Timestamp};

/// The unit that is gossiped, merged and expired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicatedState {
    records: BTreeMap<NodeIdentity, Timestamp>,
}

/// What a merge changed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Identities that were not known before the merge.
    pub adopted: Vec<NodeIdentity>,
    /// Known identities whose timestamp moved forward.
    pub refreshed: Vec<NodeIdentity>,
}

impl MergeReport {
    /// True when the merge left the local state untouched.
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.refreshed.is_empty()
    }
}

impl ReplicatedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the startup state: the local identity plus every configured
    /// neighbor, all stamped `at`.
    pub fn seeded(
        local: &NodeIdentity,
        neighbors: impl IntoIterator<Item = NodeIdentity>,
        at: Timestamp,
    ) -> Self {
        let mut records: BTreeMap<_, _> = neighbors.into_iter().map(|id| (id, at)).collect();
        records.insert(local.clone(), at);
        Self { records }
    }

    /// Last-seen timestamp for `id`, if known.
    pub fn get(&self, id: &NodeIdentity) -> Option<Timestamp> {
        self.records.get(id).copied()
    }

    /// Whether `id` has a record.
    pub fn contains(&self, id: &NodeIdentity) -> bool {
        self.records.contains_key(id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeIdentity, Timestamp)> + '_ {
        self.records.iter().map(|(id, ts)| (id, *ts))
    }

    /// Iterate identities in order.
    pub fn identities(&self) -> impl Iterator<Item = &NodeIdentity> + '_ {
        self.records.keys()
    }

    /// Unconditionally stamp the owning node's own record with `now`.
    ///
    /// Must only ever be called with the identity of the node that owns this
    /// replica.
    pub fn touch(&mut self, local: &NodeIdentity, now: Timestamp) {
        self.records.insert(local.clone(), now);
    }

    /// Merge `remote` into this state (last-write-wins).
    pub fn merge(&mut self, remote: &ReplicatedState) -> MergeReport {
        let mut report = MergeReport::default();

        for (id, &remote_ts) in &remote.records {
            match self.records.entry(id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(remote_ts);
                    report.adopted.push(id.clone());
                }
                Entry::Occupied(mut slot) => {
                    if remote_ts > *slot.get() {
                        slot.insert(remote_ts);
                        report.refreshed.push(id.clone());
                    }
                }
            }
        }

        report
    }

    /// Owned variant of [`merge`](Self::merge) for expression-style use.
    pub fn merged(mut self, remote: &ReplicatedState) -> Self {
        self.merge(remote);
        self
    }

    /// Remove every record with `now - ts > ttl` and return the removed identities.
    pub fn evict_expired(&mut self, now: Timestamp, ttl: Duration) -> BTreeSet<NodeIdentity> {
        self.evict_where(now, ttl, None)
    }

    /// Like [`evict_expired`](Self::evict_expired) but never removes `keep`.
    pub fn evict_expired_except(
        &mut self,
        now: Timestamp,
        ttl: Duration,
        keep: &NodeIdentity,
    ) -> BTreeSet<NodeIdentity> {
        self.evict_where(now, ttl, Some(keep))
    }

    fn evict_where(
        &mut self,
        now: Timestamp,
        ttl: Duration,
        keep: Option<&NodeIdentity>,
    ) -> BTreeSet<NodeIdentity> {
        let mut removed = BTreeSet::new();
        self.records.retain(|id, ts| {
            let expired = ts.is_expired(now, ttl) && keep != Some(id);
            if expired {
                removed.insert(id.clone());
            }
            !expired
        });
        removed
    }
}

impl FromIterator<(NodeIdentity, Timestamp)> for ReplicatedState {
    /// Collect records; a repeated identity keeps its greatest timestamp.
    fn from_iter<I: IntoIterator<Item = (NodeIdentity, Timestamp)>>(iter: I) -> Self {
        let mut records = BTreeMap::new();
        for (id, ts) in iter {
            let slot = records.entry(id).or_insert(ts);
            if ts > *slot {
                *slot = ts;
            }
        }
        Self { records }
    }
}

impl<'a> IntoIterator for &'a ReplicatedState {
    type Item = (&'a NodeIdentity, &'a Timestamp);
    type IntoIter = std::collections::btree_map::Iter<'a, NodeIdentity, Timestamp>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(name: &str) -> NodeIdentity {
        NodeIdentity::new(name, 7000)
    }

    fn state(entries: &[(&str, i64)]) -> ReplicatedState {
        entries
            .iter()
            .map(|(name, ts)| (id(name), Timestamp::from_millis(*ts)))
            .collect()
    }

    fn arb_state() -> impl Strategy<Value = ReplicatedState> {
        prop::collection::vec(("[a-e]", 7000u16..7003, -5i64..50), 0..12).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(host, port, ts)| (NodeIdentity::new(host, port), Timestamp::from_millis(ts)))
                .collect()
        })
    }

    #[test]
    fn test_merge_keeps_fresher_self_and_adopts_unknown() {
        let mut a = state(&[("a", 100)]);
        let report = a.merge(&state(&[("a", 90), ("c", 50)]));

        assert_eq!(a, state(&[("a", 100), ("c", 50)]));
        assert_eq!(report.adopted, vec![id("c")]);
        assert!(report.refreshed.is_empty());
    }

    #[test]
    fn test_merge_takes_strictly_greater() {
        let mut a = state(&[("b", 10)]);
        let report = a.merge(&state(&[("b", 11)]));
        assert_eq!(a.get(&id("b")), Some(Timestamp::from_millis(11)));
        assert_eq!(report.refreshed, vec![id("b")]);

        let report = a.merge(&state(&[("b", 11)]));
        assert!(report.is_empty());
    }

    #[test]
    fn test_seeded_contains_local_and_neighbors() {
        let s = ReplicatedState::seeded(&id("self"), [id("n1"), id("n2")], Timestamp::from_millis(5));
        assert_eq!(s.len(), 3);
        assert!(s.iter().all(|(_, ts)| ts == Timestamp::from_millis(5)));
    }

    #[test]
    fn test_touch_is_unconditional() {
        let mut s = state(&[("a", 100)]);
        s.touch(&id("a"), Timestamp::from_millis(40));
        assert_eq!(s.get(&id("a")), Some(Timestamp::from_millis(40)));
    }

    #[test]
    fn test_evict_boundary() {
        let ttl = Duration::from_secs(60);
        let now = Timestamp::from_millis(100_000);
        let mut s = state(&[("stale", 39_999), ("edge", 40_000), ("fresh", 99_000)]);

        let removed = s.evict_expired(now, ttl);

        assert_eq!(removed.into_iter().collect::<Vec<_>>(), vec![id("stale")]);
        assert_eq!(s, state(&[("edge", 40_000), ("fresh", 99_000)]));
    }

    #[test]
    fn test_evict_except_spares_local() {
        let ttl = Duration::from_secs(1);
        let mut s = state(&[("me", 0), ("other", 0)]);
        let removed = s.evict_expired_except(Timestamp::from_millis(10_000), ttl, &id("me"));
        assert_eq!(removed.len(), 1);
        assert!(s.contains(&id("me")));
    }

    #[test]
    fn test_from_iter_keeps_max_on_duplicates() {
        let s: ReplicatedState = vec![
            (id("a"), Timestamp::from_millis(3)),
            (id("a"), Timestamp::from_millis(9)),
            (id("a"), Timestamp::from_millis(4)),
        ]
        .into_iter()
        .collect();
        assert_eq!(s.get(&id("a")), Some(Timestamp::from_millis(9)));
    }

    proptest! {
        #[test]
        fn prop_merge_idempotent(s in arb_state()) {
            prop_assert_eq!(s.clone().merged(&s), s);
        }

        #[test]
        fn prop_merge_commutative(a in arb_state(), b in arb_state()) {
            prop_assert_eq!(a.clone().merged(&b), b.merged(&a));
        }

        #[test]
        fn prop_merge_associative(a in arb_state(), b in arb_state(), c in arb_state()) {
            let left = a.clone().merged(&b).merged(&c);
            let right = a.merged(&b.merged(&c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_merge_never_lowers_a_timestamp(a in arb_state(), b in arb_state()) {
            let merged = a.clone().merged(&b);
            for (id, ts) in a.iter() {
                prop_assert!(merged.get(id).unwrap() >= ts);
            }
        }

        #[test]
        fn prop_evict_removes_exactly_the_expired(s in arb_state(), now in 0i64..60, ttl_ms in 0u64..20) {
            let ttl = Duration::from_millis(ttl_ms);
            let now = Timestamp::from_millis(now);
            let mut after = s.clone();
            let removed = after.evict_expired(now, ttl);

            for (id, ts) in s.iter() {
                let expired = now.as_millis() - ts.as_millis() > ttl_ms as i64;
                prop_assert_eq!(removed.contains(id), expired);
                prop_assert_eq!(after.get(id), if expired { None } else { Some(ts) });
            }
        }
    }
}
