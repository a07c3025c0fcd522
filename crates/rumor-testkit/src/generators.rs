//! Proptest generators for property-based testing.
//!
//! Identities are drawn from a small pool so that generated states overlap
//! and merges actually have conflicts to resolve.

use proptest::prelude::*;

use rumor_core::{NodeIdentity, ReplicatedState, Timestamp};

const HOSTS: &[&str] = &["10.0.0.1", "10.0.0.2", "node-a", "node-b.example", "::1"];

/// Generate an identity from a small pool of hosts and ports.
pub fn node_identity() -> impl Strategy<Value = NodeIdentity> {
    (prop::sample::select(HOSTS), 7000u16..7004)
        .prop_map(|(host, port)| NodeIdentity::new(host, port))
}

/// Generate an identity with an arbitrary host and port.
pub fn any_node_identity() -> impl Strategy<Value = NodeIdentity> {
    ("[a-z0-9.-]{1,24}", any::<u16>()).prop_map(|(host, port)| NodeIdentity::new(host, port))
}

/// Generate a timestamp, including values before the epoch.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    prop_oneof![
        4 => (0i64..=2_000_000_000_000).prop_map(Timestamp::from_millis),
        1 => (-1_000_000i64..0).prop_map(Timestamp::from_millis),
        1 => any::<i64>().prop_map(Timestamp::from_millis),
    ]
}

/// Generate a state with up to `max_len` records.
pub fn replicated_state(max_len: usize) -> impl Strategy<Value = ReplicatedState> {
    prop::collection::vec((node_identity(), timestamp()), 0..=max_len)
        .prop_map(|records| records.into_iter().collect())
}

/// Generate a state with arbitrary identities.
pub fn wide_replicated_state(max_len: usize) -> impl Strategy<Value = ReplicatedState> {
    prop::collection::btree_map(any_node_identity(), timestamp(), 0..=max_len)
        .prop_map(|records| records.into_iter().collect())
}
