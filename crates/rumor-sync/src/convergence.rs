//! Convergence verification.
//!
//! Replicas that have stopped receiving updates and keep exchanging end up
//! with identical state. Comparing digests of the canonical encoding checks
//! this without shipping whole snapshots around.

use std::fmt;

use rumor_core::{encode_state, NodeIdentity, ReplicatedState};
use rumor_store::Store;

use crate::error::Result;

const DIGEST_DOMAIN: &[u8] = b"rumor-state-v0:";

/// Blake3 digest of a replicated state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateDigest(pub [u8; 32]);

impl StateDigest {
    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the digest of `state`.
///
/// Hashes the canonical snapshot encoding, so equal states always produce
/// equal digests regardless of how they were built.
pub fn state_digest(state: &ReplicatedState) -> StateDigest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DIGEST_DOMAIN);
    hasher.update(&encode_state(state));
    StateDigest(*hasher.finalize().as_bytes())
}

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Every replica holds the same state.
    Converged {
        digest: StateDigest,
        members: usize,
    },
    /// At least two replicas differ.
    Diverged {
        /// Number of distinct digests seen.
        distinct: usize,
        /// An identity whose record differs between the first replica and
        /// the first one that disagrees with it.
        example: Option<NodeIdentity>,
    },
}

impl ConvergenceResult {
    /// True if converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged { .. })
    }
}

/// Check whether all `replicas` hold identical state.
///
/// An empty input counts as converged on the empty state.
pub fn verify_convergence<'a, I>(replicas: I) -> ConvergenceResult
where
    I: IntoIterator<Item = &'a ReplicatedState>,
{
    let replicas: Vec<&ReplicatedState> = replicas.into_iter().collect();
    let digests: Vec<StateDigest> = replicas.iter().map(|s| state_digest(s)).collect();

    let Some((first, rest)) = digests.split_first() else {
        return ConvergenceResult::Converged {
            digest: state_digest(&ReplicatedState::new()),
            members: 0,
        };
    };

    match rest.iter().position(|d| d != first) {
        None => ConvergenceResult::Converged {
            digest: *first,
            members: replicas[0].len(),
        },
        Some(i) => {
            let mut distinct = digests.clone();
            distinct.sort_by(|a, b| a.0.cmp(&b.0));
            distinct.dedup();

            ConvergenceResult::Diverged {
                distinct: distinct.len(),
                example: first_difference(replicas[0], replicas[i + 1]),
            }
        }
    }
}

/// Snapshot every store and check whether they agree.
pub async fn verify_stores<S: Store + ?Sized>(stores: &[&S]) -> Result<ConvergenceResult> {
    let mut snapshots = Vec::with_capacity(stores.len());
    for store in stores {
        snapshots.push(store.snapshot().await?);
    }
    Ok(verify_convergence(&snapshots))
}

fn first_difference(a: &ReplicatedState, b: &ReplicatedState) -> Option<NodeIdentity> {
    a.identities()
        .chain(b.identities())
        .find(|id| a.get(id) != b.get(id))
        .cloned()
}
