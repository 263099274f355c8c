//! The sampler driver core.
//!
//! [`SamplerCore`] owns the four coordinated pieces (sample store,
//! interrupt gate, control channel and acquisition handler) as plain
//! fields with an explicit lifetime, and exposes the whole external surface
//! of the driver: `read`, `submit_command`/`dispatch_direct`, the
//! per-source `disable`/`enable` pair, and the interrupt notification entry
//! points invoked by the surrounding glue.
//!
//! Everything the asynchronous context touches is bounded; everything a
//! synchronous caller blocks on is released quickly by every other holder.
//! See the module docs of [`crate::irq`] and [`crate::store`] for the two
//! locking disciplines this surface composes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::boundary::{CopyIn, CopyOut};
use crate::control::{AcquisitionConfig, ControlChannel};
use crate::error::{Result, SamplerError};
use crate::handler::{AcquisitionHandler, ChaChaNoise, NoiseSource};
use crate::irq::{InterruptGate, IrqLine, IrqSource};
use crate::store::{SampleStore, DEFAULT_MAX_PERTURBATION, DEFAULT_PATTERN};

/// Construction parameters for a [`SamplerCore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of sample slots in the shared buffer.
    pub buffer_len: usize,
    /// Exclusive upper bound of the per-slot perturbation.
    pub max_perturbation: u32,
    /// Fixed noise seed; `None` seeds from OS entropy.
    pub noise_seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            buffer_len: DEFAULT_PATTERN.len(),
            max_perturbation: DEFAULT_MAX_PERTURBATION,
            noise_seed: None,
        }
    }
}

impl SamplerConfig {
    /// Parses a config from TOML, applying defaults for missing fields.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| SamplerError::Config(e.to_string()))
    }
}

/// The driver core: shared sample channel plus control surface.
pub struct SamplerCore {
    store: SampleStore,
    gate: InterruptGate,
    control: ControlChannel,
    handler: AcquisitionHandler,
}

impl SamplerCore {
    /// Builds a core seeded with the device's default waveform and ChaCha8
    /// perturbation noise.
    pub fn new(config: SamplerConfig) -> Self {
        let noise = Arc::new(ChaChaNoise::new(config.noise_seed));
        Self::with_pattern_and_noise(config, &DEFAULT_PATTERN, noise)
    }

    /// Builds a core with an explicit base pattern and noise source.
    ///
    /// The pattern is cycled to `config.buffer_len` slots and doubles as
    /// the start-of-day buffer contents.
    pub fn with_pattern_and_noise(
        config: SamplerConfig,
        pattern: &[u32],
        noise: Arc<dyn NoiseSource>,
    ) -> Self {
        let store = SampleStore::with_seed(pattern, config.buffer_len);
        let base = store.read().as_slice().to_vec();
        Self {
            store,
            gate: InterruptGate::new(),
            control: ControlChannel::new(),
            handler: AcquisitionHandler::new(base, config.max_perturbation, noise),
        }
    }

    /// Registers the glue's mask/unmask primitive for one source.
    pub fn attach_line(&self, source: IrqSource, line: Arc<dyn IrqLine>) {
        self.gate.attach_line(source, line);
    }

    /// Synchronous read: pauses the producer, copies a consistent snapshot
    /// of the sample buffer out across the boundary, resumes the producer.
    /// Returns the bytes copied (bounded by the destination).
    ///
    /// The producer pause is the blocking gate path: after it returns, no
    /// regeneration pass is in flight, and none starts until the mask is
    /// released on every exit path of this call.
    pub fn read<D: CopyOut + ?Sized>(&self, dst: &mut D) -> Result<usize> {
        let _mask = self.gate.mask_sync_scoped(IrqSource::Sampling);
        let buffer = self.store.read();
        match buffer.read_into(dst) {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(requested = dst.len(), "failed to copy sample buffer out");
                Err(e)
            }
        }
    }

    /// Write-style command submission (bounded copy, then dispatch).
    pub fn submit_command<S: CopyIn + ?Sized>(&self, src: &S) -> Result<usize> {
        self.control.submit(&self.gate, src)
    }

    /// In-band command dispatch with no intermediate copy.
    pub fn dispatch_direct(&self, command: u8, argument: u8) {
        self.control.dispatch_direct(&self.gate, command, argument)
    }

    /// Nested disable of one interrupt source (non-blocking path).
    pub fn disable(&self, source: IrqSource) {
        self.gate.disable(source);
    }

    /// Matching enable of one interrupt source.
    ///
    /// # Panics
    ///
    /// Panics on an enable with no outstanding disable; see
    /// [`InterruptGate::enable`].
    pub fn enable(&self, source: IrqSource) {
        self.gate.enable(source);
    }

    /// Per-event notification for the sampling interrupt: runs one
    /// regeneration pass unless the source is masked. Returns whether the
    /// pass ran.
    pub fn sample_interrupt(&self) -> bool {
        self.handler.fire(&self.gate, &self.store)
    }

    /// Per-event notification for the non-sampling sources. The device
    /// raises them, the core acknowledges them; they carry no payload.
    pub fn secondary_interrupt(&self, source: IrqSource) -> bool {
        if source == IrqSource::Sampling {
            return self.sample_interrupt();
        }
        if self.gate.is_masked(source) {
            trace!(irq = source.name(), "delivery suppressed");
            return false;
        }
        trace!(irq = source.name(), "interrupt acknowledged");
        true
    }

    /// The interrupt gate, for glue-side observation of depth and masking.
    pub fn gate(&self) -> &InterruptGate {
        &self.gate
    }

    /// Copy of the current acquisition configuration.
    pub fn config_snapshot(&self) -> AcquisitionConfig {
        self.control.config_snapshot()
    }

    /// Copy of the current sample slots, for in-process diagnostics.
    pub fn sample_snapshot(&self) -> Vec<u32> {
        self.store.read().as_slice().to_vec()
    }
}
