//! # Rumor Store
//!
//! The replicated membership store and the neighbor registry, kept behind a
//! single guard.
//!
//! ## Overview
//!
//! Every exchange, inbound or outbound, reads and writes the same two pieces of
//! state: the [`ReplicatedState`](rumor_core::ReplicatedState) and the set of
//! neighbors this node gossips with. The [`Store`] trait exposes only composite
//! operations over both, each of which runs as one critical section:
//!
//! | Operation | Steps |
//! |---|---|
//! | [`Store::prepare_push`] | touch self, snapshot |
//! | [`Store::absorb`] | merge, evict |
//! | [`Store::respond`] | merge, evict, touch self, snapshot |
//! | [`Store::evict_expired`] | evict |
//!
//! The guard is held only while mutating memory, never across network I/O.
//!
//! ## Key Types
//!
//! - [`Store`] - Async trait for all membership operations
//! - [`StoreExt`] - The centralized post-exchange eviction hook
//! - [`MemoryStore`] - In-memory implementation
//! - [`Registry`] - The neighbor set
//! - [`Evicted`] - Identities removed by one eviction pass
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use rumor_core::{NodeIdentity, Timestamp};
//! use rumor_store::{MemoryStore, Store};
//!
//! # async fn example() -> rumor_store::Result<()> {
//! let local = NodeIdentity::new("10.0.0.1", 7000);
//! let store = MemoryStore::seeded(local, [NodeIdentity::new("10.0.0.2", 7000)], Timestamp::now());
//!
//! let push = store.prepare_push(Timestamp::now()).await?;
//! // ... send `push`, receive `reply` ...
//! # let reply = push.clone();
//! let evicted = store.absorb(&reply, Timestamp::now(), Duration::from_secs(60)).await?;
//! # let _ = evicted;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod registry;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use registry::Registry;
pub use traits::{Evicted, Store, StoreExt};
