//! Error types for the sync module.

use rumor_core::{CoreError, NodeIdentity};
use rumor_store::StoreError;
use thiserror::Error;

/// Errors that can occur during a snapshot exchange.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Could not open a channel to the peer.
    #[error("failed to connect to {peer}: {source}")]
    Connect {
        peer: NodeIdentity,
        source: std::io::Error,
    },

    /// I/O failure on an open channel (reset, unexpected EOF, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for the peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Frame body could not be decoded as a snapshot.
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] CoreError),

    /// Frame length prefix above the configured limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Frame length prefix of zero.
    #[error("empty frame")]
    EmptyFrame,

    /// Store operation failed.
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// Transport-level error not covered above.
    #[error("transport error: {0}")]
    TransportError(String),
}

impl SyncError {
    /// True for failures caused by the bytes the peer sent.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            SyncError::Malformed(_) | SyncError::FrameTooLarge { .. } | SyncError::EmptyFrame
        )
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
