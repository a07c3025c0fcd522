//! The snapshot exchange.
//!
//! One exchange is one connection carrying exactly one frame each way:
//!
//! ```text
//! Initiator                                Responder
//!   | touch self, snapshot                   |
//!   |-------- snapshot ---------------------->|
//!   |                                        | merge, evict, touch self, snapshot
//!   |<------- snapshot -----------------------|
//!   | merge, evict                           |
//!   |                close                   |
//! ```

use std::sync::Arc;
use std::time::Duration;

use rumor_core::{Clock, NodeIdentity};
use rumor_store::{Evicted, Store};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::codec::{limits, read_snapshot, write_snapshot};
use crate::error::Result;
use crate::transport::Transport;

/// Configuration for exchange behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum age of a record before it is evicted.
    pub ttl: Duration,
    /// Deadline for connecting and for each frame read or write.
    pub io_timeout: Duration,
    /// Largest snapshot frame body accepted from a peer.
    pub max_frame_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            io_timeout: Duration::from_secs(5),
            max_frame_bytes: limits::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Result of one completed exchange.
#[derive(Debug, Default)]
pub struct ExchangeReport {
    /// Frame bytes sent to the peer.
    pub sent_bytes: usize,
    /// Records in the snapshot received from the peer.
    pub received_records: usize,
    /// Identities evicted by the merge-evict step.
    pub evicted: Evicted,
}

/// Runs exchanges against a shared store.
///
/// Cheap to clone; every clone works on the same store.
pub struct GossipSession<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl<S: Store> Clone for GossipSession<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> GossipSession<S> {
    /// Create a new session.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The clock used to stamp and expire records.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The session configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Initiate an exchange with `peer`.
    ///
    /// The store is only mutated once the peer's reply has been decoded; a
    /// failure at any earlier step leaves it untouched apart from the local
    /// touch taken for the outbound snapshot.
    pub async fn exchange_with<T: Transport>(
        &self,
        transport: &T,
        peer: &NodeIdentity,
    ) -> Result<ExchangeReport> {
        let mut stream = transport.connect(peer).await?;

        let push = self.store.prepare_push(self.clock.now()).await?;
        let sent_bytes = write_snapshot(&mut stream, &push, self.config.io_timeout).await?;

        let reply = read_snapshot(&mut stream, self.config.max_frame_bytes, self.config.io_timeout)
            .await?;
        let evicted = self
            .store
            .absorb(&reply, self.clock.now(), self.config.ttl)
            .await?;

        tracing::debug!(
            %peer,
            sent_bytes,
            received = reply.len(),
            evicted = evicted.len(),
            "exchange complete"
        );

        Ok(ExchangeReport {
            sent_bytes,
            received_records: reply.len(),
            evicted,
        })
    }

    /// Answer one inbound exchange on `stream`.
    ///
    /// `remote` only labels log lines.
    pub async fn serve<IO>(&self, mut stream: IO, remote: &str) -> Result<ExchangeReport>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let request =
            read_snapshot(&mut stream, self.config.max_frame_bytes, self.config.io_timeout)
                .await?;

        let (reply, evicted) = self
            .store
            .respond(&request, self.clock.now(), self.config.ttl)
            .await?;
        let sent_bytes = write_snapshot(&mut stream, &reply, self.config.io_timeout).await?;

        // Best effort: the reply is already flushed.
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(%remote, error = %e, "shutdown after reply failed");
        }

        tracing::debug!(
            %remote,
            received = request.len(),
            sent_bytes,
            evicted = evicted.len(),
            "served exchange"
        );

        Ok(ExchangeReport {
            sent_bytes,
            received_records: request.len(),
            evicted,
        })
    }
}
