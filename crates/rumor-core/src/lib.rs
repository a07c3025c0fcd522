//! # Rumor Core
//!
//! Pure primitives for Rumor: node identities, timestamps, and the replicated
//! membership state that nodes gossip to each other.
//!
//! This crate contains no I/O, no locking, no networking. It is pure
//! computation over membership records.
//!
//! ## Key Types
//!
//! - [`NodeIdentity`] - A `(host, port)` value identifying a peer
//! - [`Timestamp`] - Milliseconds since the Unix epoch
//! - [`ReplicatedState`] - The `NodeIdentity -> Timestamp` map that is exchanged and merged
//! - [`Clock`] - Source of wall-clock time, swappable in tests
//!
//! ## Merge Semantics
//!
//! [`ReplicatedState::merge`] is last-write-wins by timestamp. It is idempotent,
//! commutative and associative, so replicas that keep merging each other's
//! snapshots in any order converge to the same map.
//!
//! ## Canonicalization
//!
//! Snapshots are encoded as deterministic CBOR. See the [`canonical`] module.

pub mod canonical;
pub mod clock;
pub mod error;
pub mod state;
pub mod types;

pub use canonical::{decode_state, encode_state};
pub use clock::{Clock, SystemClock};
pub use error::CoreError;
pub use state::{MergeReport, ReplicatedState};
pub use types::{duration_millis, NodeIdentity, Timestamp};
