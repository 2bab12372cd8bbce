//! The sense-act loop: acquire, detect, classify, act, repeat.
//!
//! Single-threaded and synchronous; an actuator action blocks the loop
//! for its full duration and no audio is sampled meanwhile. The
//! shutdown flag is honored once per iteration boundary, never
//! mid-action, so an interrupt can't leave an output energized.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::actuator::{ActuatorCommand, DigitalOutput, Turret};
use crate::capture::FrameSource;
use crate::error::Result;
use crate::note::NoteTable;
use crate::pitch::PitchDetector;

pub fn run<S, G>(
    source: &mut S,
    detector: &mut PitchDetector,
    notes: &NoteTable,
    turret: &mut Turret<G>,
    shutdown: &AtomicBool,
) -> Result<()>
where
    S: FrameSource,
    G: DigitalOutput,
{
    while !shutdown.load(Ordering::Relaxed) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) if e.is_transient() => {
                warn!("skipping cycle: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let freq = detector.estimate(&frame);
        if let Some(hz) = freq {
            debug!("detected frequency: {hz:.2} Hz");
        }

        let note = notes.classify(freq);
        let command = ActuatorCommand::for_note(note);
        match note {
            Some(note) => info!("note {note}: {command:?}"),
            None => debug!("no note detected"),
        }

        turret.execute(command)?;
    }

    info!("shutdown requested; leaving sense-act loop");
    Ok(())
}
