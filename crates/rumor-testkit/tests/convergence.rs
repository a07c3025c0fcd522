//! Cluster-level properties: convergence, eviction and merge laws.

use std::time::Duration;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rumor_core::Clock;
use rumor_store::Store;
use rumor_sync::{state_digest, verify_convergence};
use rumor_testkit::fixtures::{node_id, MemoryCluster, Topology};
use rumor_testkit::generators::replicated_state;

#[tokio::test]
async fn test_ring_converges() {
    let cluster = MemoryCluster::new(8, Topology::Ring);
    let rounds = cluster.run_until_converged(1, 200).await.unwrap();
    assert!(rounds.is_some(), "ring of 8 did not converge");

    let snapshots = cluster.snapshots().await.unwrap();
    assert_eq!(snapshots[0].len(), 8);
}

#[tokio::test]
async fn test_line_converges_through_one_way_links() {
    // The last node has no neighbors and only ever answers.
    let cluster = MemoryCluster::new(6, Topology::Line);
    assert!(cluster.run_until_converged(2, 200).await.unwrap().is_some());
    assert!(cluster.store(5).neighbors().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_convergence_independent_of_gossip_order() {
    let a = MemoryCluster::new(5, Topology::Complete);
    let b = MemoryCluster::new(5, Topology::Complete);
    a.run_until_converged(10, 200).await.unwrap().unwrap();
    b.run_until_converged(99, 200).await.unwrap().unwrap();

    let sa = a.snapshots().await.unwrap();
    let sb = b.snapshots().await.unwrap();
    assert_eq!(state_digest(&sa[0]), state_digest(&sb[0]));
}

#[tokio::test]
async fn test_stopped_node_evicted_everywhere() {
    let mut cluster = MemoryCluster::new(4, Topology::Complete);
    cluster.run_until_converged(3, 200).await.unwrap().unwrap();

    cluster.stop(3);

    // Small steps: the running nodes keep refreshing each other while the
    // stopped node's record ages past the TTL.
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..90 {
        cluster.clock().advance(Duration::from_secs(1));
        cluster.gossip_round(&mut rng).await.unwrap();
    }

    for i in 0..3 {
        let store = cluster.store(i);
        assert!(!store.snapshot().await.unwrap().contains(&node_id(3)), "node {i} state");
        assert!(!store.neighbors().await.unwrap().contains(&node_id(3)), "node {i} neighbors");
    }
}

#[tokio::test]
async fn test_live_nodes_survive_clock_advance() {
    let cluster = MemoryCluster::new(3, Topology::Complete);
    let mut rng = StdRng::seed_from_u64(5);

    // Gossip keeps refreshing everyone, so nobody expires even though the
    // total elapsed time is three TTLs.
    for _ in 0..180 {
        cluster.clock().advance(Duration::from_secs(1));
        cluster.gossip_round(&mut rng).await.unwrap();
    }

    for i in 0..3 {
        assert_eq!(cluster.store(i).neighbors().await.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_exchange_scenario() {
    let cluster = MemoryCluster::new(2, Topology::Line);
    let now = cluster.clock().now();

    let a = cluster.store(0);
    let b = cluster.store(1);
    let extra = node_id(9);
    b.merge(&[(extra.clone(), now)].into_iter().collect()).await.unwrap();

    let (a_evicted, b_evicted) = cluster.exchange(0, 1).await.unwrap().unwrap();
    assert!(a_evicted.is_empty() && b_evicted.is_empty());

    let sa = a.snapshot().await.unwrap();
    assert_eq!(sa, b.snapshot().await.unwrap());
    assert_eq!(sa.get(&extra), Some(now));
    assert_eq!(sa.get(&node_id(0)), Some(now));
}

proptest! {
    #[test]
    fn merge_order_does_not_matter(
        states in prop::collection::vec(replicated_state(12), 1..6),
        rotate in 0usize..6,
    ) {
        let forward = states
            .iter()
            .fold(rumor_core::ReplicatedState::new(), |acc, s| acc.merged(s));

        let mut rotated = states.clone();
        let k = rotate % rotated.len();
        rotated.rotate_left(k);
        let backward = rotated
            .iter()
            .rev()
            .fold(rumor_core::ReplicatedState::new(), |acc, s| acc.merged(s));

        prop_assert!(verify_convergence([&forward, &backward]).is_converged());
    }

    #[test]
    fn merged_state_dominates_inputs(
        a in replicated_state(12),
        b in replicated_state(12),
    ) {
        let m = a.clone().merged(&b);
        for (id, ts) in a.iter().chain(b.iter()) {
            prop_assert!(m.get(id).is_some_and(|got| got >= ts));
        }
        prop_assert!(m.len() <= a.len() + b.len());
    }
}
