//! Bounded, fault-tolerant copies across the privilege boundary.
//!
//! The driver core never hands out references to its internal buffers; only
//! copies cross the boundary, through a glue-supplied copy primitive that
//! may fault (the `copy_to_user`/`copy_from_user` analogue). The two traits
//! here model the two directions. Plain byte slices implement both for
//! in-process callers and tests; [`FaultingBuffer`] is a test double that
//! always faults, for exercising the error path the way the mock drivers'
//! error-injection framework does.
//!
//! Fault contract: on [`SamplerError::CopyFault`] zero bytes of the transfer
//! are visible on the far side, and the core never retries.

use crate::error::{Result, SamplerError};

/// Destination for copies leaving the driver core.
pub trait CopyOut {
    /// Capacity of the destination in bytes.
    fn len(&self) -> usize;

    /// Whether the destination has zero capacity.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `src` into the destination.
    ///
    /// Callers guarantee `src.len() <= self.len()`. On a fault, no bytes are
    /// visible on the far side.
    fn copy_from_core(&mut self, src: &[u8]) -> Result<()>;
}

/// Source for copies entering the driver core.
pub trait CopyIn {
    /// Number of bytes available on the far side.
    fn len(&self) -> usize;

    /// Whether the source holds zero bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `min(self.len(), dst.len())` bytes into `dst` and returns the
    /// count. On a fault, `dst` is untouched.
    fn copy_to_core(&self, dst: &mut [u8]) -> Result<usize>;
}

impl CopyOut for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_core(&mut self, src: &[u8]) -> Result<()> {
        self[..src.len()].copy_from_slice(src);
        Ok(())
    }
}

impl CopyIn for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_to_core(&self, dst: &mut [u8]) -> Result<usize> {
        let n = <[u8]>::len(self).min(dst.len());
        dst[..n].copy_from_slice(&self[..n]);
        Ok(n)
    }
}

/// Test double for an inaccessible caller buffer: every transfer faults.
#[derive(Debug, Clone, Copy)]
pub struct FaultingBuffer {
    len: usize,
}

impl FaultingBuffer {
    /// Creates a buffer that advertises `len` bytes but faults on access.
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl CopyOut for FaultingBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_from_core(&mut self, src: &[u8]) -> Result<()> {
        Err(SamplerError::CopyFault {
            requested: src.len(),
        })
    }
}

impl CopyIn for FaultingBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_to_core(&self, dst: &mut [u8]) -> Result<usize> {
        Err(SamplerError::CopyFault {
            requested: self.len.min(dst.len()),
        })
    }
}
