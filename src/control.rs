//! Control channel: serialized command dispatch.
//!
//! Client code reconfigures acquisition through 2-byte `{command, argument}`
//! records, delivered either as a write-style bounded copy ([`submit`]) or
//! as an in-band call ([`dispatch_direct`]). One mutex (`ctl`) serializes
//! every dispatch against every other, and all control state (the pending
//! record and the configuration bag) lives under it.
//!
//! Dispatch is total over the byte-sized command space: reserved and
//! unknown codes are accepted and ignored so that newer clients can talk to
//! an older core (and vice versa) without faulting. The IRQ commands
//! operate the [`InterruptGate`] for the source named by the argument,
//! falling back to the designated default source for unrecognized names.
//!
//! [`submit`]: ControlChannel::submit
//! [`dispatch_direct`]: ControlChannel::dispatch_direct

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::boundary::CopyIn;
use crate::error::Result;
use crate::irq::{InterruptGate, IrqSource};

/// Size of the pending command record: one command byte, one argument byte.
pub const COMMAND_RECORD_LEN: usize = 2;

/// Control command space, decoded totally from the command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Disable the IRQ named by the argument (0x00).
    DisableIrq,
    /// Enable the IRQ named by the argument (0x01).
    EnableIrq,
    /// Record the client process identity (0x02).
    SetUserPid,
    /// Delay, high byte (0x03).
    SetDelayHigh,
    /// Delay, low byte (0x04).
    SetDelayLow,
    /// Sampling rate (0x05).
    SetRate,
    /// Compress count, high byte (0x06).
    SetCompressCountHigh,
    /// Compress count, low byte (0x07).
    SetCompressCountLow,
    /// Compress step, integer part (0x08).
    SetCompressStepInt,
    /// Compress step, fractional part (0x09).
    SetCompressStepFrac,
    /// Gain (0x0a).
    SetGain,
    /// Channel selection (0x0c).
    SetChannel,
    /// Reserved code, accepted and ignored.
    Reserved(u8),
    /// Unknown code, accepted and ignored.
    Unknown(u8),
}

impl ControlCommand {
    /// Decodes a command byte. Total: every byte maps to some command.
    pub fn decode(code: u8) -> Self {
        match code {
            0x00 => ControlCommand::DisableIrq,
            0x01 => ControlCommand::EnableIrq,
            0x02 => ControlCommand::SetUserPid,
            0x03 => ControlCommand::SetDelayHigh,
            0x04 => ControlCommand::SetDelayLow,
            0x05 => ControlCommand::SetRate,
            0x06 => ControlCommand::SetCompressCountHigh,
            0x07 => ControlCommand::SetCompressCountLow,
            0x08 => ControlCommand::SetCompressStepInt,
            0x09 => ControlCommand::SetCompressStepFrac,
            0x0a => ControlCommand::SetGain,
            0x0c => ControlCommand::SetChannel,
            0x12 | 0x14 | 0x16 | 0x18 | 0x1a | 0x1c | 0x1e => ControlCommand::Reserved(code),
            other => ControlCommand::Unknown(other),
        }
    }
}

/// Argument byte naming an interrupt source.
///
/// `0x00` is the explicit no-op sentinel; anything not naming a source
/// falls back to [`IrqSource::DEFAULT`].
fn source_for_argument(argument: u8) -> Option<IrqSource> {
    match argument {
        0x00 => None,
        0x01 => Some(IrqSource::Sampling),
        0x02 => Some(IrqSource::Display),
        0x03 => Some(IrqSource::Power),
        0x04 => Some(IrqSource::Converter),
        _ => Some(IrqSource::DEFAULT),
    }
}

/// Acquisition configuration bag.
///
/// The slots exist and are written by their command codes, but their value
/// semantics are uninterpreted here: high/low byte pairs are stored as
/// delivered, never assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Client process identity.
    pub user_pid: u8,
    /// Delay, high byte.
    pub delay_high: u8,
    /// Delay, low byte.
    pub delay_low: u8,
    /// Sampling rate.
    pub rate: u8,
    /// Compress count, high byte.
    pub compress_count_high: u8,
    /// Compress count, low byte.
    pub compress_count_low: u8,
    /// Compress step, integer part.
    pub compress_step_int: u8,
    /// Compress step, fractional part.
    pub compress_step_frac: u8,
    /// Gain.
    pub gain: u8,
    /// Channel selection.
    pub channel: u8,
}

#[derive(Debug, Default)]
struct ControlState {
    pending: [u8; COMMAND_RECORD_LEN],
    config: AcquisitionConfig,
}

/// Serialized command dispatcher over one lock.
#[derive(Debug, Default)]
pub struct ControlChannel {
    ctl: Mutex<ControlState>,
}

impl ControlChannel {
    /// Creates a channel with a zeroed pending record and default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write-style submission: bounded copy of up to
    /// [`COMMAND_RECORD_LEN`] bytes into the pending record, then dispatch,
    /// all under the ctl lock. Returns the bytes consumed.
    ///
    /// A short source overwrites only the leading bytes; the rest of the
    /// record is read as previously delivered (the record is destructive
    /// per byte, not per submission). A copy fault propagates before any
    /// dispatch and leaves the record untouched.
    pub fn submit<S: CopyIn + ?Sized>(&self, gate: &InterruptGate, src: &S) -> Result<usize> {
        let mut state = self.ctl.lock();
        let n = src.copy_to_core(&mut state.pending)?;
        let (command, argument) = (state.pending[0], state.pending[1]);
        debug!(command, argument, "control command received");
        Self::dispatch(&mut state, gate, ControlCommand::decode(command), argument);
        Ok(n)
    }

    /// In-band dispatch with no intermediate copy, under the ctl lock.
    pub fn dispatch_direct(&self, gate: &InterruptGate, command: u8, argument: u8) {
        let mut state = self.ctl.lock();
        debug!(command, argument, "direct control command received");
        Self::dispatch(&mut state, gate, ControlCommand::decode(command), argument);
    }

    /// Copy of the current configuration. Only copies leave the boundary.
    pub fn config_snapshot(&self) -> AcquisitionConfig {
        self.ctl.lock().config.clone()
    }

    /// Copy of the pending command record.
    pub fn pending_snapshot(&self) -> [u8; COMMAND_RECORD_LEN] {
        self.ctl.lock().pending
    }

    fn dispatch(
        state: &mut ControlState,
        gate: &InterruptGate,
        command: ControlCommand,
        argument: u8,
    ) {
        match command {
            ControlCommand::DisableIrq => {
                if let Some(source) = source_for_argument(argument) {
                    debug!(irq = source.name(), "disabling IRQ");
                    gate.disable(source);
                }
            }
            ControlCommand::EnableIrq => {
                if let Some(source) = source_for_argument(argument) {
                    debug!(irq = source.name(), "enabling IRQ");
                    gate.enable(source);
                }
            }
            ControlCommand::SetUserPid => state.config.user_pid = argument,
            ControlCommand::SetDelayHigh => state.config.delay_high = argument,
            ControlCommand::SetDelayLow => state.config.delay_low = argument,
            ControlCommand::SetRate => state.config.rate = argument,
            ControlCommand::SetCompressCountHigh => state.config.compress_count_high = argument,
            ControlCommand::SetCompressCountLow => state.config.compress_count_low = argument,
            ControlCommand::SetCompressStepInt => state.config.compress_step_int = argument,
            ControlCommand::SetCompressStepFrac => state.config.compress_step_frac = argument,
            ControlCommand::SetGain => state.config.gain = argument,
            ControlCommand::SetChannel => state.config.channel = argument,
            ControlCommand::Reserved(code) => {
                trace!(code, "reserved control command ignored");
            }
            ControlCommand::Unknown(code) => {
                trace!(code, "unknown control command ignored");
            }
        }
    }
}
