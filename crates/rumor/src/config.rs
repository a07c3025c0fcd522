//! Startup configuration.
//!
//! Loaded from JSON and/or command-line flags. Durations are written in
//! milliseconds:
//!
//! ```json
//! {
//!   "bind": { "host": "10.0.0.1", "port": 7000 },
//!   "neighbors": [{ "host": "10.0.0.2", "port": 7000 }],
//!   "ttl_ms": 60000,
//!   "interval": { "poisson": { "events_per_minute": 30.0 } }
//! }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rumor_core::NodeIdentity;
use rumor_sync::{limits, SyncConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::SleepPolicy;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config is not valid JSON for [`NodeConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// TTL of zero would evict every peer on the first pass.
    #[error("ttl must be positive")]
    ZeroTtl,

    /// Poisson rate that is zero, negative or not finite.
    #[error("events per minute must be positive and finite, got {0}")]
    InvalidRate(f64),

    /// Fixed interval of zero.
    #[error("gossip interval must be positive")]
    ZeroInterval,

    /// Listen backlog of zero.
    #[error("listen backlog must be positive")]
    ZeroBacklog,

    /// No inbound handler permitted.
    #[error("max_inflight must be positive")]
    ZeroInflight,

    /// Frame limit of zero.
    #[error("max_frame_bytes must be positive")]
    ZeroFrameLimit,
}

/// Configuration for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Address to listen on. Port 0 picks a free port.
    pub bind: NodeIdentity,
    /// Host to put in the local identity instead of the bind host.
    ///
    /// Needed when binding a wildcard address such as `0.0.0.0`.
    pub advertise_host: Option<String>,
    /// Peers to gossip with.
    pub neighbors: Vec<NodeIdentity>,
    /// Maximum age of a record before it is evicted.
    #[serde(rename = "ttl_ms", with = "millis")]
    pub ttl: Duration,
    /// Time between gossip cycles.
    pub interval: SleepPolicy,
    /// Deadline for connecting and for each frame read or write.
    #[serde(rename = "io_timeout_ms", with = "millis")]
    pub io_timeout: Duration,
    /// TCP listen backlog.
    pub backlog: u32,
    /// Maximum inbound exchanges handled concurrently.
    pub max_inflight: usize,
    /// Largest snapshot frame accepted from a peer.
    pub max_frame_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: NodeIdentity::new("127.0.0.1", 7000),
            advertise_host: None,
            neighbors: Vec::new(),
            ttl: Duration::from_secs(60),
            interval: SleepPolicy::Fixed(Duration::from_secs(1)),
            io_timeout: Duration::from_secs(5),
            backlog: 128,
            max_inflight: 64,
            max_frame_bytes: limits::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl NodeConfig {
    /// Parse a config from JSON text. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check limits and normalize the neighbor list.
    ///
    /// Duplicate neighbors and the bind identity itself are dropped, keeping
    /// first-seen order.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        match self.interval {
            SleepPolicy::Fixed(d) if d.is_zero() => return Err(ConfigError::ZeroInterval),
            SleepPolicy::Poisson { events_per_minute }
                if !(events_per_minute.is_finite() && events_per_minute > 0.0) =>
            {
                return Err(ConfigError::InvalidRate(events_per_minute));
            }
            _ => {}
        }
        if self.backlog == 0 {
            return Err(ConfigError::ZeroBacklog);
        }
        if self.max_inflight == 0 {
            return Err(ConfigError::ZeroInflight);
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroFrameLimit);
        }

        let mut seen = BTreeSet::new();
        let bind = self.bind.clone();
        self.neighbors.retain(|n| *n != bind && seen.insert(n.clone()));
        Ok(())
    }

    /// The exchange settings derived from this config.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            ttl: self.ttl,
            io_timeout: self.io_timeout,
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

/// Serde helpers for durations stored as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
