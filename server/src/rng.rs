//! Server randomness
//!
//! One `WorldRng` per engine, seeded from OS entropy in production. Tests
//! construct it from a fixed seed so loiter directions and spawn positions
//! replay deterministically; nothing else in the simulation consumes
//! randomness.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seedable RNG behind the simulation's random decisions
#[derive(Debug, Clone)]
pub struct WorldRng {
    inner: ChaCha8Rng,
}

impl WorldRng {
    /// Production constructor; draws the seed from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            inner: ChaCha8Rng::from_entropy(),
        }
    }

    /// Controlled-seed constructor for reproducible tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `[0, bound)`
    pub fn index(&mut self, bound: usize) -> usize {
        self.inner.gen_range(0..bound)
    }

    /// Uniform float in `[min, max)`
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        self.inner.gen_range(min..max)
    }
}
