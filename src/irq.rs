//! Interrupt sources and the nested enable/disable gate.
//!
//! The host platform's IRQ depth counting is reified here as an explicit
//! per-source atomic counter. A source delivers events to its handler iff
//! its depth is 0; every `disable` nests, and the external line is masked
//! only on the 0→1 transition and unmasked only on 1→0. Multiple call sites
//! (the read path, control commands, the handler itself) may legitimately
//! hold the source masked at the same time, which is why this is a counter
//! and not a flag.
//!
//! Two masking paths exist:
//!
//! - [`InterruptGate::disable`] never blocks and is safe from the
//!   asynchronous handler context (the `disable_irq_nosync` analogue);
//! - [`InterruptGate::disable_and_wait`] additionally blocks until no
//!   handler invocation for the source is still in flight (the
//!   `disable_irq` analogue). Synchronous contexts only; calling it from
//!   the handler itself would deadlock on its own in-flight mark.
//!
//! In-flight draining is condition-variable backed rather than a spin on a
//! flag, so a waiting reader suspends instead of busy-waiting.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::debug;

/// Named interrupt sources of the sampling device.
///
/// `Sampling` is the acquisition interrupt (a sampling sequence finished and
/// the buffer must be regenerated); the other three exist on the device but
/// carry no payload here. `Sampling` doubles as the designated default when
/// a control argument does not name a recognized source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqSource {
    /// Sampling-sequence-finished interrupt (`S_INT`).
    Sampling,
    /// Display wake-up tick (`DP_INT`).
    Display,
    /// Power-key interrupt (`PW_INT`).
    Power,
    /// Digital-analog converter interrupt (`DAC_INT`).
    Converter,
}

impl IrqSource {
    /// All sources, in slot order.
    pub const ALL: [IrqSource; 4] = [
        IrqSource::Sampling,
        IrqSource::Display,
        IrqSource::Power,
        IrqSource::Converter,
    ];

    /// Fallback source for unrecognized control arguments.
    pub const DEFAULT: IrqSource = IrqSource::Sampling;

    fn index(self) -> usize {
        match self {
            IrqSource::Sampling => 0,
            IrqSource::Display => 1,
            IrqSource::Power => 2,
            IrqSource::Converter => 3,
        }
    }

    /// Hardware-facing name of the source.
    pub fn name(self) -> &'static str {
        match self {
            IrqSource::Sampling => "S_INT",
            IrqSource::Display => "DP_INT",
            IrqSource::Power => "PW_INT",
            IrqSource::Converter => "DAC_INT",
        }
    }
}

/// Glue-provided mask/unmask primitive for one interrupt line.
///
/// Implementations must not block: `mask` is invoked from the non-blocking
/// handler context on the 0→1 depth transition.
pub trait IrqLine: Send + Sync {
    /// Instructs the external source to stop delivering events.
    fn mask(&self);
    /// Instructs the external source to resume delivering events.
    fn unmask(&self);
}

/// Line that goes nowhere, used until glue attaches a real one.
struct NoopLine;

impl IrqLine for NoopLine {
    fn mask(&self) {}
    fn unmask(&self) {}
}

/// Recording line for tests and diagnostics: remembers the masked state and
/// counts transitions.
#[derive(Debug, Default)]
pub struct RecordingLine {
    masked: AtomicBool,
    mask_count: AtomicUsize,
    unmask_count: AtomicUsize,
}

impl RecordingLine {
    /// Creates an unmasked recording line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the line is currently instructed to be masked.
    pub fn is_masked(&self) -> bool {
        self.masked.load(Ordering::Acquire)
    }

    /// Number of mask instructions seen.
    pub fn mask_count(&self) -> usize {
        self.mask_count.load(Ordering::Acquire)
    }

    /// Number of unmask instructions seen.
    pub fn unmask_count(&self) -> usize {
        self.unmask_count.load(Ordering::Acquire)
    }
}

impl IrqLine for RecordingLine {
    fn mask(&self) {
        self.masked.store(true, Ordering::Release);
        self.mask_count.fetch_add(1, Ordering::AcqRel);
    }

    fn unmask(&self) {
        self.masked.store(false, Ordering::Release);
        self.unmask_count.fetch_add(1, Ordering::AcqRel);
    }
}

struct GateSlot {
    depth: AtomicU32,
    line: RwLock<Arc<dyn IrqLine>>,
    in_flight: Mutex<usize>,
    drained: Condvar,
}

impl GateSlot {
    fn new() -> Self {
        Self {
            depth: AtomicU32::new(0),
            line: RwLock::new(Arc::new(NoopLine)),
            in_flight: Mutex::new(0),
            drained: Condvar::new(),
        }
    }
}

/// Nested enable/disable gate over the four interrupt sources.
pub struct InterruptGate {
    slots: [GateSlot; 4],
}

impl Default for InterruptGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptGate {
    /// Creates a gate with every source enabled and wired to a no-op line.
    pub fn new() -> Self {
        Self {
            slots: [
                GateSlot::new(),
                GateSlot::new(),
                GateSlot::new(),
                GateSlot::new(),
            ],
        }
    }

    /// Registers the mask/unmask primitive for `source`, replacing the
    /// previous one. Dropping the gate (or attaching a new line) is the
    /// teardown of the pair.
    pub fn attach_line(&self, source: IrqSource, line: Arc<dyn IrqLine>) {
        *self.slots[source.index()].line.write() = line;
    }

    /// Current nesting depth of outstanding disables for `source`.
    pub fn depth(&self, source: IrqSource) -> u32 {
        self.slots[source.index()].depth.load(Ordering::Acquire)
    }

    /// Whether `source` is currently prevented from delivering events.
    pub fn is_masked(&self, source: IrqSource) -> bool {
        self.depth(source) > 0
    }

    /// Increments the disable depth for `source`; the 0→1 transition masks
    /// the external line. Never blocks, so it is safe from the handler
    /// context. Nested calls are always legal.
    pub fn disable(&self, source: IrqSource) {
        let slot = &self.slots[source.index()];
        let prev = slot.depth.fetch_add(1, Ordering::AcqRel);
        if prev == 0 {
            debug!(irq = source.name(), "masking IRQ");
            slot.line.read().mask();
        }
    }

    /// Decrements the disable depth for `source`; the 1→0 transition
    /// unmasks the external line.
    ///
    /// # Panics
    ///
    /// Panics if the depth is already 0: an `enable` without a matching
    /// `disable` is a programmer error, and clamping would silently corrupt
    /// the nesting discipline for every other masker.
    pub fn enable(&self, source: IrqSource) {
        let slot = &self.slots[source.index()];
        let prev = slot
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1));
        match prev {
            Ok(1) => {
                debug!(irq = source.name(), "unmasking IRQ");
                slot.line.read().unmask();
            }
            Ok(_) => {}
            Err(_) => panic!(
                "unbalanced enable for {}: no outstanding disable",
                source.name()
            ),
        }
    }

    /// Masks `source` and then blocks until no handler invocation for it is
    /// still in flight. Must only be called from a blocking-capable
    /// context; the handler calling this on its own source would deadlock.
    pub fn disable_and_wait(&self, source: IrqSource) {
        self.disable(source);
        let slot = &self.slots[source.index()];
        let mut in_flight = slot.in_flight.lock();
        while *in_flight > 0 {
            slot.drained.wait(&mut in_flight);
        }
    }

    /// Scoped non-blocking mask: disables now, enables when the guard
    /// drops, pairing the two on every exit path.
    pub fn mask_scoped(&self, source: IrqSource) -> MaskGuard<'_> {
        self.disable(source);
        MaskGuard { gate: self, source }
    }

    /// Scoped synchronous mask: [`InterruptGate::disable_and_wait`] now,
    /// enable when the guard drops.
    pub fn mask_sync_scoped(&self, source: IrqSource) -> MaskGuard<'_> {
        self.disable_and_wait(source);
        MaskGuard { gate: self, source }
    }

    /// Marks one handler invocation for `source` as in flight until the
    /// returned guard drops. The critical sections inside are a bounded
    /// counter update, so this is safe from the non-blocking context.
    pub(crate) fn enter_handler(&self, source: IrqSource) -> InFlightGuard<'_> {
        let slot = &self.slots[source.index()];
        *slot.in_flight.lock() += 1;
        InFlightGuard { slot }
    }
}

/// RAII pairing of a `disable` with its `enable`.
pub struct MaskGuard<'a> {
    gate: &'a InterruptGate,
    source: IrqSource,
}

impl Drop for MaskGuard<'_> {
    fn drop(&mut self) {
        self.gate.enable(self.source);
    }
}

pub(crate) struct InFlightGuard<'a> {
    slot: &'a GateSlot,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.slot.in_flight.lock();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.slot.drained.notify_all();
        }
    }
}
