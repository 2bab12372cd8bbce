//! Digital output collaborator boundary.
//!
//! The controller only ever issues synchronous `set(pin, level)` calls
//! on three independent lines; everything behind that call is the
//! collaborator's business. [`SysfsGpio`] is the thin hardware glue,
//! [`SimGpio`] records transitions for tests and dry runs.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Error, Result};

/// Three independent logical output lines, set one at a time.
///
/// Each call takes effect before it returns.
pub trait DigitalOutput {
    fn set(&mut self, pin: u8, high: bool) -> Result<()>;
}

/// In-memory output that records every transition.
///
/// Handles are cheap clones over shared state, so a test can keep one
/// handle for inspection while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct SimGpio {
    state: Arc<Mutex<SimState>>,
}

#[derive(Debug, Default)]
struct SimState {
    transitions: Vec<(u8, bool)>,
    levels: HashMap<u8, bool>,
    fail_on_write: Option<usize>,
    writes: usize,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sim whose `index`-th write (0-based) fails once, for
    /// exercising mid-sequence abort paths.
    pub fn failing_on_write(index: usize) -> Self {
        let sim = Self::default();
        sim.state.lock().unwrap().fail_on_write = Some(index);
        sim
    }

    /// Every `(pin, level)` write so far, in order.
    pub fn transitions(&self) -> Vec<(u8, bool)> {
        self.state.lock().unwrap().transitions.clone()
    }

    /// Last level written to a pin, if any.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.state.lock().unwrap().levels.get(&pin).copied()
    }
}

impl DigitalOutput for SimGpio {
    fn set(&mut self, pin: u8, high: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        let index = state.writes;
        state.writes += 1;
        if state.fail_on_write == Some(index) {
            state.fail_on_write = None;
            return Err(Error::Gpio {
                pin,
                source: io::Error::other("injected write failure"),
            });
        }

        debug!("gpio {pin} -> {}", if high { 1 } else { 0 });
        state.transitions.push((pin, high));
        state.levels.insert(pin, high);
        Ok(())
    }
}

/// `/sys/class/gpio` glue for real hardware.
///
/// Claims the pins as outputs (driven low) on open. Pin setup beyond
/// that is the platform's concern, not this crate's.
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn open(pins: &[u8]) -> Result<Self> {
        Self::open_at(Path::new("/sys/class/gpio"), pins)
    }

    fn open_at(root: &Path, pins: &[u8]) -> Result<Self> {
        let gpio = Self {
            root: root.to_path_buf(),
        };
        for &pin in pins {
            gpio.claim(pin)
                .map_err(|e| Error::DeviceUnavailable(format!("cannot claim gpio {pin}: {e}")))?;
        }
        Ok(gpio)
    }

    fn claim(&self, pin: u8) -> io::Result<()> {
        let dir = self.root.join(format!("gpio{pin}"));
        if !dir.exists() {
            fs::write(self.root.join("export"), pin.to_string())?;
        }
        fs::write(dir.join("direction"), "out")?;
        fs::write(dir.join("value"), "0")
    }
}

impl DigitalOutput for SysfsGpio {
    fn set(&mut self, pin: u8, high: bool) -> Result<()> {
        let path = self.root.join(format!("gpio{pin}/value"));
        fs::write(path, if high { "1" } else { "0" })
            .map_err(|source| Error::Gpio { pin, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_records_transitions_and_levels() {
        let sim = SimGpio::new();
        let mut out = sim.clone();

        out.set(17, true).unwrap();
        out.set(22, true).unwrap();
        out.set(17, false).unwrap();

        assert_eq!(sim.transitions(), vec![(17, true), (22, true), (17, false)]);
        assert_eq!(sim.level(17), Some(false));
        assert_eq!(sim.level(22), Some(true));
        assert_eq!(sim.level(27), None);
    }

    #[test]
    fn sim_injected_failure_fires_once() {
        let sim = SimGpio::failing_on_write(1);
        let mut out = sim.clone();

        out.set(17, true).unwrap();
        assert!(out.set(17, false).is_err());
        out.set(17, false).unwrap();

        assert_eq!(sim.transitions(), vec![(17, true), (17, false)]);
    }
}
