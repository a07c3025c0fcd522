//! # Rumor Testkit
//!
//! Testing utilities for Rumor.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known snapshots with their exact wire encoding
//! - **Generators**: Proptest strategies for identities, timestamps and states
//! - **Fixtures**: A manual clock and an in-process cluster simulation
//!
//! ## Golden Vectors
//!
//! ```rust
//! use rumor_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! for (name, ok, hex) in verify_all_vectors() {
//!     assert!(ok, "{name}: {hex}");
//! }
//! assert!(!all_vectors().is_empty());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use rumor_testkit::generators::replicated_state;
//!
//! proptest! {
//!     #[test]
//!     fn merge_is_idempotent(s in replicated_state(16)) {
//!         prop_assert_eq!(s.clone().merged(&s), s);
//!     }
//! }
//! ```
//!
//! ## Cluster Simulation
//!
//! ```rust
//! use rumor_testkit::fixtures::{MemoryCluster, Topology};
//!
//! # tokio_test_block(async {
//! let cluster = MemoryCluster::new(5, Topology::Ring);
//! let rounds = cluster.run_until_converged(7, 100).await.unwrap();
//! assert!(rounds.is_some());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{ManualClock, MemoryCluster, Topology};
pub use generators::{node_identity, replicated_state, timestamp};
pub use vectors::{all_vectors, state_from_vector, verify_all_vectors, GoldenVector};
