//! `daq-driver-sampler`
//!
//! Driver core for an interrupt-driven sampling device: a single-producer /
//! multiple-consumer shared data channel between the device's sampling
//! interrupt and synchronous read/control operations.
//!
//! The crate models the coordination discipline of the driver, with the
//! OS-integration glue (device nodes, pin configuration, power management)
//! kept outside as collaborators behind small traits:
//!
//! - [`SampleStore`]: the fixed-capacity sample buffer under a
//!   reader/writer lock. The handler regenerates it exclusively, readers
//!   copy it out concurrently, and nobody ever observes a half-written
//!   generation.
//! - [`InterruptGate`]: nested enable/disable depth counting per interrupt
//!   source, with a non-blocking path for the handler and a blocking,
//!   drain-waiting path for synchronous callers.
//! - [`AcquisitionHandler`]: the per-event regeneration pass (base pattern
//!   plus bounded pseudo-random perturbation).
//! - [`ControlChannel`]: the serialized command dispatcher; IRQ commands
//!   operate the gate, everything else lands in an opaque
//!   [`AcquisitionConfig`] bag, and unknown codes are ignored by design.
//!
//! [`SamplerCore`] ties the four together and is the only type glue code
//! normally touches.
//!
//! ## Example
//!
//! ```rust
//! use daq_driver_sampler::{SamplerConfig, SamplerCore};
//!
//! let core = SamplerCore::new(SamplerConfig {
//!     buffer_len: 8,
//!     noise_seed: Some(42),
//!     ..SamplerConfig::default()
//! });
//!
//! // The glue invokes this once per sampling interrupt.
//! core.sample_interrupt();
//!
//! // A client reads a consistent snapshot into its own space.
//! let mut out = vec![0u8; 32];
//! let n = core.read(&mut out[..]).unwrap();
//! assert_eq!(n, 32);
//! ```

pub mod boundary;
pub mod control;
pub mod driver;
pub mod error;
pub mod handler;
pub mod irq;
pub mod store;

pub use boundary::{CopyIn, CopyOut, FaultingBuffer};
pub use control::{AcquisitionConfig, ControlChannel, ControlCommand, COMMAND_RECORD_LEN};
pub use driver::{SamplerConfig, SamplerCore};
pub use error::{Result, SamplerError};
pub use handler::{AcquisitionHandler, ChaChaNoise, NoiseSource, ZeroNoise};
pub use irq::{InterruptGate, IrqLine, IrqSource, MaskGuard, RecordingLine};
pub use store::{SampleBuffer, SampleStore, DEFAULT_MAX_PERTURBATION, DEFAULT_PATTERN};
