//! Error types for the sampler driver core.
//!
//! The core has a deliberately small error surface:
//!
//! - [`SamplerError::CopyFault`]: a bounded copy across the privilege
//!   boundary could not complete. Reported to the caller, never retried.
//! - [`SamplerError::Config`]: configuration could not be parsed or is
//!   semantically invalid.
//!
//! Unbalanced `enable` calls on the interrupt gate are *not* an error value:
//! they are programmer errors that would corrupt the nesting counter, so the
//! gate panics instead of clamping (see [`crate::irq::InterruptGate::enable`]).
//! Unknown command and argument codes are not errors either; dispatch is
//! total over the byte space to tolerate protocol skew.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type Result<T> = std::result::Result<T, SamplerError>;

/// Primary error type for the sampler driver core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// A copy across the privilege boundary faulted. Zero bytes of the
    /// requested transfer are visible on the far side.
    #[error("boundary copy fault: {requested} bytes requested, none transferred")]
    CopyFault {
        /// Number of bytes the failed transfer asked for.
        requested: usize,
    },

    /// Configuration parsing or validation failed.
    #[error("configuration error: {0}")]
    Config(String),
}
