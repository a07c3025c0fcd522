//! # Rumor
//!
//! Peer-to-peer membership through gossip anti-entropy.
//!
//! ## Overview
//!
//! Every node keeps a replicated map of which peers are alive and when each
//! was last heard from. Periodically it picks a random neighbor and the two
//! exchange and merge their maps. Records that stop being refreshed age out
//! after a TTL, and the peer is then dropped from the map and from the
//! neighbor list.
//!
//! - **Scheduler**: outbound exchanges on a fixed or Poisson interval
//! - **Listener**: answers inbound exchanges, one task per connection
//! - **Store**: the single guarded copy of state and neighbors both share
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rumor::{Node, NodeConfig};
//! use rumor::core::NodeIdentity;
//!
//! # async fn example() -> rumor::Result<()> {
//! let config = NodeConfig {
//!     bind: NodeIdentity::new("10.0.0.1", 7000),
//!     neighbors: vec![NodeIdentity::new("10.0.0.2", 7000)],
//!     ..NodeConfig::default()
//! };
//!
//! let node = Node::bind(config).await?;
//! let handle = node.handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.shutdown();
//! });
//! node.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `rumor::core` - Identities, timestamps and the replicated state
//! - `rumor::store` - The guarded store and neighbor registry
//! - `rumor::sync` - Framing, transports and the exchange protocol

pub mod config;
pub mod error;
pub mod listener;
pub mod node;
pub mod scheduler;

pub use rumor_core as core;
pub use rumor_store as store;
pub use rumor_sync as sync;

pub use config::{ConfigError, NodeConfig};
pub use error::{NodeError, Result};
pub use listener::Listener;
pub use node::{Node, NodeHandle};
pub use scheduler::{CycleOutcome, GossipScheduler, SleepPolicy};

pub use rumor_core::{NodeIdentity, ReplicatedState, Timestamp};
