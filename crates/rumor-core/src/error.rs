//! Error types for Rumor Core.

use thiserror::Error;

use crate::types::NodeIdentity;

/// Errors raised while building identities or decoding snapshots.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid node identity: {0}")]
    InvalidIdentity(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("duplicate identity in snapshot: {0}")]
    DuplicateIdentity(NodeIdentity),

    #[error("{0} trailing bytes after snapshot")]
    TrailingBytes(usize),
}
