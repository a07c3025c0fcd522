//! The gossip scheduler.
//!
//! One cycle: pick a random neighbor, push our snapshot, pull theirs,
//! merge-evict, then sleep. A cycle with no neighbors goes straight to sleep.
//!
//! ```text
//! IDLE -> SELECT_NEIGHBOR -> CONNECT -> PUSH -> PULL -> MERGE_EVICT -> SLEEP -> IDLE
//!               |               \________\_______\______> evict_if_expired -> SLEEP
//!               +-- none ----------------------------------------------------> SLEEP
//! ```

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rumor_core::NodeIdentity;
use rumor_store::{Evicted, Store, StoreExt};
use rumor_sync::{GossipSession, SyncError, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;

/// How long to sleep between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepPolicy {
    /// The same delay every cycle, in milliseconds when serialized.
    Fixed(#[serde(with = "crate::config::millis")] Duration),
    /// Exponentially distributed delays, so cycles form a Poisson process
    /// with the given mean rate.
    Poisson { events_per_minute: f64 },
}

impl SleepPolicy {
    /// Draw the next delay.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            SleepPolicy::Fixed(d) => d,
            SleepPolicy::Poisson { events_per_minute } => {
                let mean_secs = 60.0 / events_per_minute;
                // u in [0, 1), so 1 - u is in (0, 1] and the log is finite.
                let u: f64 = rng.gen();
                let secs = -(1.0 - u).ln() * mean_secs;
                Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
            }
        }
    }
}

/// What one cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No neighbors; nothing was attempted.
    Idle,
    /// Exchange with `peer` completed.
    Exchanged { peer: NodeIdentity, evicted: Evicted },
    /// Exchange with `peer` failed; `evicted` is the result of the
    /// TTL-conditional eviction that followed.
    Failed {
        peer: NodeIdentity,
        evicted: Evicted,
        error: SyncError,
    },
}

/// Drives outbound exchanges.
pub struct GossipScheduler<S: Store, T: Transport> {
    session: GossipSession<S>,
    transport: T,
    policy: SleepPolicy,
    rng: StdRng,
}

impl<S: Store, T: Transport> GossipScheduler<S, T> {
    /// Create a scheduler.
    pub fn new(session: GossipSession<S>, transport: T, policy: SleepPolicy) -> Self {
        Self {
            session,
            transport,
            policy,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a seeded generator for sleep delays.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Run one cycle without sleeping.
    ///
    /// Exchange failures are reported in the outcome. Only store failures
    /// are returned as errors.
    pub async fn run_once(&mut self) -> Result<CycleOutcome> {
        let store = self.session.store();
        let Some(peer) = store.choose_neighbor().await? else {
            tracing::trace!("no neighbors, idling");
            return Ok(CycleOutcome::Idle);
        };

        match self.session.exchange_with(&self.transport, &peer).await {
            Ok(report) => Ok(CycleOutcome::Exchanged {
                peer,
                evicted: report.evicted,
            }),
            Err(SyncError::StoreError(e)) => Err(e.into()),
            Err(error) => {
                tracing::warn!(%peer, %error, "exchange failed");
                let now = self.session.clock().now();
                let evicted = store
                    .evict_if_expired(&peer, now, self.session.config().ttl)
                    .await?;
                Ok(CycleOutcome::Failed {
                    peer,
                    evicted,
                    error,
                })
            }
        }
    }

    /// Run cycles until `shutdown` turns true or its sender is dropped.
    ///
    /// An exchange already in progress when shutdown is signalled runs to
    /// completion.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            local = %self.session.store().local_id(),
            policy = ?self.policy,
            "scheduler started"
        );

        while !*shutdown.borrow() {
            self.run_once().await?;

            let delay = self.policy.next_delay(&mut self.rng);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("scheduler stopped");
        Ok(())
    }
}
