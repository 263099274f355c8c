//! Shared sample buffer between the interrupt handler and readers.
//!
//! [`SampleStore`] is the single piece of data the asynchronous context
//! mutates: a fixed-capacity `u32` buffer behind a reader/writer lock. The
//! interrupt handler takes the write side for exactly one regeneration pass;
//! any number of readers share the read side while copying out. Holding the
//! write lock for a full pass is what gives readers the no-tearing
//! guarantee: every observed buffer is the product of exactly one completed
//! pass.
//!
//! Access is guard-typed: [`SampleStore::read`] and [`SampleStore::write`]
//! hand out `parking_lot` guards over the inner [`SampleBuffer`], and the
//! buffer operations are only reachable through a guard, so "caller already
//! holds the lock" is a compile-time fact rather than a comment.
//!
//! Both critical sections are leaf sections: no blocking call is ever made
//! while a guard is held.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::boundary::CopyOut;
use crate::error::Result;

/// Upper bound (exclusive) of the default per-slot perturbation.
pub const DEFAULT_MAX_PERTURBATION: u32 = 10;

/// Fixed-length buffer of measurement samples.
///
/// Only reachable through a [`SampleStore`] lock guard. The byte view used
/// by [`SampleBuffer::read_into`] is little-endian `u32`, which is the
/// layout client code reassembles on its side of the boundary.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<u32>,
}

impl SampleBuffer {
    /// Builds a buffer of `len` slots seeded by cycling `pattern`.
    pub(crate) fn seeded(pattern: &[u32], len: usize) -> Self {
        let samples = if pattern.is_empty() {
            vec![0; len]
        } else {
            pattern.iter().copied().cycle().take(len).collect()
        };
        Self { samples }
    }

    /// Number of sample slots.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer has zero slots.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Size of the buffer's byte view.
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<u32>()
    }

    /// Borrow of the raw slots, for in-process inspection under the guard.
    pub fn as_slice(&self) -> &[u32] {
        &self.samples
    }

    /// Replaces every slot. Requires the write guard by construction.
    ///
    /// `new_values` must match the buffer length; a mismatch is a programmer
    /// error, not a runtime condition.
    pub fn write_all(&mut self, new_values: &[u32]) {
        assert_eq!(
            new_values.len(),
            self.samples.len(),
            "regeneration pass must cover every slot"
        );
        self.samples.copy_from_slice(new_values);
    }

    /// Copies `min(byte_len, dst.len())` bytes of the little-endian byte
    /// view into `dst` and returns the count. A zero-capacity destination
    /// copies nothing. A faulted copy delivers zero bytes and reports the
    /// fault to the caller; it is never retried here.
    pub fn read_into<D: CopyOut + ?Sized>(&self, dst: &mut D) -> Result<usize> {
        let n = self.byte_len().min(dst.len());
        if n == 0 {
            return Ok(0);
        }
        let bytes: Vec<u8> = self
            .samples
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        dst.copy_from_core(&bytes[..n])?;
        Ok(n)
    }
}

/// Reader/writer-locked sample buffer shared by the acquisition handler and
/// read operations.
#[derive(Debug)]
pub struct SampleStore {
    inner: RwLock<SampleBuffer>,
}

impl SampleStore {
    /// Creates a store of `len` slots seeded with [`DEFAULT_PATTERN`].
    pub fn new(len: usize) -> Self {
        Self::with_seed(&DEFAULT_PATTERN, len)
    }

    /// Creates a store of `len` slots seeded by cycling `pattern`.
    pub fn with_seed(pattern: &[u32], len: usize) -> Self {
        Self {
            inner: RwLock::new(SampleBuffer::seeded(pattern, len)),
        }
    }

    /// Acquires shared read access. Multiple readers may hold this
    /// simultaneously; it excludes the writer.
    pub fn read(&self) -> RwLockReadGuard<'_, SampleBuffer> {
        self.inner.read()
    }

    /// Acquires exclusive write access, excluding all readers and writers.
    ///
    /// Every holder keeps the guard for a bounded copy or regeneration pass
    /// only, so acquisition from the non-blocking interrupt context stays
    /// bounded.
    pub fn write(&self) -> RwLockWriteGuard<'_, SampleBuffer> {
        self.inner.write()
    }
}

/// Default waveform seeded into the buffer at start of day: one wave frame
/// (520 slots) of the sampling device's demonstration signal.
pub const DEFAULT_PATTERN: [u32; 520] = [
    350, 355, 345, 343, 354, 352, 351, 350, 350, 345, 338, 300, 245, 183, 134, 76,
    20, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    45, 90, 125, 165, 200, 245, 243, 249, 245, 250, 245, 244, 245, 249, 250, 245,
    225, 175, 130, 96, 50, 25, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10,
];
