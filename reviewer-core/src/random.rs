//! Injectable randomness for reviewer selection.
//!
//! Production code uses [`StdRandom::from_entropy`]. Tests (and deployments
//! that want reproducible assignment) use [`StdRandom::seeded`].

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::model::UserId;

/// Uniform random choices over candidate pools.
pub trait RandomSource: Send + Sync {
    /// Pick one candidate uniformly at random. `None` for an empty pool.
    fn pick(&self, candidates: &[UserId]) -> Option<UserId>;

    /// Shuffle candidates in place, uniformly over all permutations.
    fn shuffle(&self, candidates: &mut Vec<UserId>);
}

/// `RandomSource` backed by `rand`'s `StdRng`.
pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A reproducible source: equal seeds give equal choice sequences.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A panic while holding the lock cannot leave the RNG in an invalid state.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn pick(&self, candidates: &[UserId]) -> Option<UserId> {
        self.with_rng(|rng| candidates.choose(rng).cloned())
    }

    fn shuffle(&self, candidates: &mut Vec<UserId>) {
        self.with_rng(|rng| candidates.shuffle(rng))
    }
}
