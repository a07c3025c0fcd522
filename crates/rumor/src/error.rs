//! Error types for a running node.

use rumor_core::NodeIdentity;
use rumor_store::StoreError;
use rumor_sync::SyncError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop a node from starting or running.
///
/// Failed exchanges are not among them: those are logged and retried on a
/// later cycle.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Could not bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: NodeIdentity,
        source: std::io::Error,
    },

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error outside a single exchange.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// A node task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
