//! Golden test vectors for the snapshot encoding.
//!
//! Every implementation of the wire format must produce these exact bytes,
//! and decode them back to the same records.

use rumor_core::{encode_state, NodeIdentity, ReplicatedState, Timestamp};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Records as `(host, port, timestamp_ms)`.
    pub records: &'static [(&'static str, u16, i64)],
    /// Expected canonical CBOR encoding (hex).
    pub expected_hex: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty snapshot",
            records: &[],
            expected_hex: "a0",
        },
        GoldenVector {
            name: "single short record",
            records: &[("a", 1, 5)],
            expected_hex: "a18261610105",
        },
        GoldenVector {
            name: "ipv4 host with wall-clock timestamp",
            records: &[("10.0.0.1", 7000, 1_736_870_400_000)], // 2025-01-14T16:00:00Z
            expected_hex: "a1826831302e302e302e31191b581b00000194658b1000",
        },
        GoldenVector {
            name: "timestamp before the epoch",
            records: &[("b", 2, -1)],
            expected_hex: "a18261620220",
        },
        GoldenVector {
            name: "keys sorted by encoded bytes",
            records: &[("b", 1, 1), ("a", 2, 2)],
            expected_hex: "a282616102028261620101",
        },
        GoldenVector {
            name: "shorter host sorts first",
            records: &[("bb", 1, 0), ("c", 1, 0)],
            expected_hex: "a28261630100826262620100",
        },
    ]
}

/// Build the state a vector describes.
pub fn state_from_vector(vector: &GoldenVector) -> ReplicatedState {
    vector
        .records
        .iter()
        .map(|&(host, port, ts)| (NodeIdentity::new(host, port), Timestamp::from_millis(ts)))
        .collect()
}

/// Check all vectors. Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .into_iter()
        .map(|v| {
            let hex = hex::encode(encode_state(&state_from_vector(&v)));
            (v.name.to_string(), hex == v.expected_hex, hex)
        })
        .collect()
}
