//! Integration tests for the interrupt gate's nesting discipline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use daq_driver_sampler::{
    InterruptGate, IrqSource, NoiseSource, RecordingLine, Result, SamplerConfig, SamplerCore,
};

#[test]
fn masked_iff_a_pair_is_still_open() {
    let gate = InterruptGate::new();
    let line = Arc::new(RecordingLine::new());
    gate.attach_line(IrqSource::Sampling, line.clone());

    // Two independent call sites interleave their disable/enable pairs the
    // way the read path and a control command can.
    gate.disable(IrqSource::Sampling); // site A
    assert!(line.is_masked());
    gate.disable(IrqSource::Sampling); // site B
    gate.enable(IrqSource::Sampling); // site A releases first
    assert!(line.is_masked(), "site B still holds the source masked");
    assert_eq!(gate.depth(IrqSource::Sampling), 1);

    gate.enable(IrqSource::Sampling); // site B
    assert!(!line.is_masked());
    assert_eq!(gate.depth(IrqSource::Sampling), 0);
    assert_eq!(line.mask_count(), 1);
    assert_eq!(line.unmask_count(), 1);
}

#[test]
#[should_panic(expected = "unbalanced enable")]
fn unmatched_enable_is_fatal() {
    let gate = InterruptGate::new();
    gate.disable(IrqSource::Display);
    gate.enable(IrqSource::Display);
    gate.enable(IrqSource::Display);
}

#[test]
fn mask_guard_pairs_on_error_paths() {
    fn fallible_read(gate: &InterruptGate) -> Result<()> {
        let _mask = gate.mask_scoped(IrqSource::Sampling);
        Err(daq_driver_sampler::SamplerError::CopyFault { requested: 1 })?;
        Ok(())
    }

    let gate = InterruptGate::new();
    assert!(fallible_read(&gate).is_err());
    assert_eq!(
        gate.depth(IrqSource::Sampling),
        0,
        "guard must enable on the error return too"
    );
}

/// Noise source that parks the regeneration pass mid-flight: the first
/// perturbation call reports that the handler started and then blocks until
/// the test releases it.
struct BlockingNoise {
    started: parking_lot::Mutex<mpsc::Sender<()>>,
    release: parking_lot::Mutex<mpsc::Receiver<()>>,
    tripped: AtomicBool,
}

impl NoiseSource for BlockingNoise {
    fn perturb(&self, _max: u32) -> u32 {
        if !self.tripped.swap(true, Ordering::AcqRel) {
            let _ = self.started.lock().send(());
            let _ = self.release.lock().recv();
        }
        0
    }
}

#[test]
fn read_waits_for_in_flight_regeneration() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let noise = Arc::new(BlockingNoise {
        started: parking_lot::Mutex::new(started_tx),
        release: parking_lot::Mutex::new(release_rx),
        tripped: AtomicBool::new(false),
    });

    let config = SamplerConfig {
        buffer_len: 4,
        max_perturbation: 10,
        noise_seed: None,
    };
    let core = Arc::new(SamplerCore::with_pattern_and_noise(
        config,
        &[1, 2, 3, 4],
        noise,
    ));

    let producer = {
        let core = Arc::clone(&core);
        thread::spawn(move || core.sample_interrupt())
    };
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("handler never started");

    let (read_done_tx, read_done_rx) = mpsc::channel();
    let reader = {
        let core = Arc::clone(&core);
        thread::spawn(move || {
            let mut out = [0u8; 16];
            let n = core.read(&mut out[..]).unwrap();
            read_done_tx.send((n, out)).unwrap();
        })
    };

    // The reader's disable_and_wait must not return while the pass is
    // parked in flight.
    assert!(
        read_done_rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "read completed while a regeneration pass was still in flight"
    );

    release_tx.send(()).unwrap();
    assert!(producer.join().unwrap(), "pass should have run");
    let (n, out) = read_done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("read never completed after drain");
    reader.join().unwrap();

    // The observed snapshot is the completed post-regeneration generation.
    assert_eq!(n, 16);
    assert_eq!(
        out,
        [1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0],
        "snapshot must be the full completed generation"
    );
    assert_eq!(core.gate().depth(IrqSource::Sampling), 0);
}

#[test]
fn control_disable_prevents_delivery_until_enable() {
    let core = SamplerCore::with_pattern_and_noise(
        SamplerConfig {
            buffer_len: 2,
            ..SamplerConfig::default()
        },
        &[5, 6],
        Arc::new(daq_driver_sampler::ZeroNoise),
    );

    core.dispatch_direct(0x00, 0x01); // DISABLE_IRQ, S_INT
    assert!(!core.sample_interrupt());
    assert!(!core.sample_interrupt(), "nesting-aware: still masked");

    core.dispatch_direct(0x01, 0x01); // ENABLE_IRQ, S_INT
    assert!(core.sample_interrupt());
}
