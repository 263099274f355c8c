//! Acquisition handler: the asynchronous regeneration pass.
//!
//! Invoked once per sampling interrupt, in a context that must not block
//! and must finish quickly. The pass masks its own source through the
//! non-blocking gate path (no re-entrant delivery while regenerating),
//! computes one full generation of samples, commits it under the store's
//! write lock, and unmasks. There is no error channel back to callers from
//! here; a fault could only ever surface as a stale buffer.
//!
//! Perturbation comes from a [`NoiseSource`]: the production implementation
//! is a seeded ChaCha8 generator, and tests use [`ZeroNoise`] to make a
//! pass reproduce its base pattern exactly.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::irq::{InterruptGate, IrqSource};
use crate::store::SampleStore;

/// Bounded pseudo-random perturbation applied per slot.
pub trait NoiseSource: Send + Sync {
    /// Returns a value in `[0, max)`; 0 when `max` is 0.
    fn perturb(&self, max: u32) -> u32;
}

/// Seeded, thread-safe ChaCha8 noise source.
///
/// With a fixed seed the sequence is reproducible across runs, which is
/// what deterministic acquisition tests key on.
pub struct ChaChaNoise {
    inner: Mutex<ChaCha8Rng>,
}

impl ChaChaNoise {
    /// Creates a noise source. `None` seeds from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }
}

impl Default for ChaChaNoise {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NoiseSource for ChaChaNoise {
    fn perturb(&self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.inner.lock().gen_range(0..max)
    }
}

/// Noise source that always adds 0, for deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn perturb(&self, _max: u32) -> u32 {
        0
    }
}

/// Per-event regeneration pass over the sample store.
pub struct AcquisitionHandler {
    base: Vec<u32>,
    max_perturbation: u32,
    noise: Arc<dyn NoiseSource>,
}

impl AcquisitionHandler {
    /// Creates a handler regenerating `base[i] + noise` into a store of the
    /// same length.
    pub fn new(base: Vec<u32>, max_perturbation: u32, noise: Arc<dyn NoiseSource>) -> Self {
        Self {
            base,
            max_perturbation,
            noise,
        }
    }

    /// Runs one delivery of the sampling interrupt.
    ///
    /// Returns `false` without touching the store when the source is
    /// masked: the gate's depth counter is the delivery condition, and the
    /// in-flight mark is registered before the check so a concurrent
    /// `disable_and_wait` either drains this pass or suppresses it
    /// entirely, never observes it half-done.
    pub fn fire(&self, gate: &InterruptGate, store: &SampleStore) -> bool {
        let _in_flight = gate.enter_handler(IrqSource::Sampling);
        if gate.is_masked(IrqSource::Sampling) {
            trace!(irq = IrqSource::Sampling.name(), "delivery suppressed");
            return false;
        }
        // Own mask first, on the nosync path: no re-entrant delivery
        // while regenerating.
        let _mask = gate.mask_scoped(IrqSource::Sampling);

        let generation: Vec<u32> = self
            .base
            .iter()
            .map(|&b| b.wrapping_add(self.noise.perturb(self.max_perturbation)))
            .collect();
        store.write().write_all(&generation);
        true
    }
}
