//! Strong type definitions for Rumor.
//!
//! Identities and timestamps are newtypes so that a port can never be confused
//! with a timestamp and a host string never travels without its port.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CoreError;

/// A peer endpoint, identified by `(host, port)`.
///
/// Equality, ordering and hashing are structural, so two identities built from
/// the same host string and port are interchangeable as map keys. The fields
/// are private: once built an identity never changes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIdentity {
    host: String,
    port: u16,
}

impl NodeIdentity {
    /// Create an identity from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host part (name or IP literal, without brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port part.
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeIdentity({})", self)
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for NodeIdentity {
    type Err = CoreError;

    /// Parse `host:port`; IPv6 literals must be bracketed (`[::1]:7000`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| CoreError::InvalidIdentity(format!("missing port in {s:?}")))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner
                .strip_suffix(']')
                .ok_or_else(|| CoreError::InvalidIdentity(format!("unclosed bracket in {s:?}")))?,
            None if host.contains(':') => {
                return Err(CoreError::InvalidIdentity(format!(
                    "IPv6 host must be bracketed in {s:?}"
                )))
            }
            None => host,
        };

        if host.is_empty() {
            return Err(CoreError::InvalidIdentity(format!("empty host in {s:?}")));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| CoreError::InvalidIdentity(format!("bad port in {s:?}: {e}")))?;

        Ok(Self::new(host, port))
    }
}

impl From<SocketAddr> for NodeIdentity {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Wall-clock milliseconds since the Unix epoch.
///
/// Only the node a record describes ever writes a fresh timestamp for it;
/// everyone else copies timestamps they learned through merges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The Unix epoch.
    pub const ZERO: Self = Self(0);

    /// Current system time.
    ///
    /// A system clock set before 1970 yields a negative timestamp rather than
    /// failing.
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Self(clamp_millis(d.as_millis())),
            Err(e) => Self(-clamp_millis(e.duration().as_millis())),
        }
    }

    /// Create from raw milliseconds.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Raw milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed between `self` and `now` (negative if `self` is in the future).
    pub const fn age_at(&self, now: Timestamp) -> i64 {
        now.0.saturating_sub(self.0)
    }

    /// True when `now - self > ttl`. A record exactly `ttl` old is still alive.
    pub fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        self.age_at(now) > duration_millis(ttl)
    }

    /// This timestamp shifted back by `d` (saturating).
    pub fn saturating_sub(&self, d: Duration) -> Self {
        Self(self.0.saturating_sub(duration_millis(d)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Self(ms)
    }
}

/// A duration in whole milliseconds, clamped to `i64::MAX`.
pub fn duration_millis(d: Duration) -> i64 {
    clamp_millis(d.as_millis())
}

fn clamp_millis(ms: u128) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
