//! # Rumor Sync
//!
//! The push-pull snapshot exchange that lets replicas converge.
//!
//! ## Overview
//!
//! Each exchange ships the whole replicated state in one direction and the
//! merged result back. Merge is last-write-wins, so the order in which
//! exchanges happen never matters.
//!
//! ## Key Properties
//!
//! - **One round trip**: exactly one frame each way per connection
//! - **Atomic steps**: every store mutation is a single critical section
//! - **Bounded input**: frames above `max_frame_bytes` are rejected unread
//! - **Transport-agnostic**: TCP in production, duplex pipes in tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rumor_core::{NodeIdentity, SystemClock, Timestamp};
//! use rumor_store::MemoryStore;
//! use rumor_sync::{tcp::TcpTransport, GossipSession, SyncConfig};
//!
//! # async fn example() -> rumor_sync::Result<()> {
//! let peer = NodeIdentity::new("10.0.0.2", 7000);
//! let store = Arc::new(MemoryStore::seeded(
//!     NodeIdentity::new("10.0.0.1", 7000),
//!     [peer.clone()],
//!     Timestamp::now(),
//! ));
//!
//! let session = GossipSession::new(store, Arc::new(SystemClock), SyncConfig::default());
//! let transport = TcpTransport::new(Duration::from_secs(5));
//! let report = session.exchange_with(&transport, &peer).await?;
//! println!("evicted {} members", report.evicted.len());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod convergence;
pub mod error;
pub mod protocol;
pub mod transport;

pub use codec::{encode_frame, limits, read_snapshot, write_snapshot};
pub use convergence::{state_digest, verify_convergence, verify_stores, ConvergenceResult, StateDigest};
pub use error::{Result, SyncError};
pub use protocol::{ExchangeReport, GossipSession, SyncConfig};
pub use transport::{memory, tcp, Acceptor, Transport};
