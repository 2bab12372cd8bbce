//! Turret actuator state machine.
//!
//! Three commands, three blocking effect sequences: step-pulse trains
//! for rotation, a timed solenoid hold for firing. The controller owns
//! the digital-output handle exclusively; mutual exclusion between
//! rotation and firing is structural, because a new command is only
//! accepted after the previous sequence has fully completed.
//!
//! Every exit path leaves the outputs de-energized: sequences end low
//! on success, abort-and-release on a write failure, and `Drop` drives
//! all three lines low regardless of how the controller goes out of
//! scope.

pub mod gpio;

pub use gpio::{DigitalOutput, SimGpio, SysfsGpio};

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::config::TurretConfig;
use crate::error::Result;

/// What a classified note asks the turret to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    RotateClockwise,
    RotateCounterClockwise,
    Fire,
    NoAction,
}

impl ActuatorCommand {
    /// Fixed note-to-command mapping: G rotates clockwise, B rotates
    /// counterclockwise, D fires. Anything else is a no-op.
    pub fn for_note(note: Option<&str>) -> Self {
        match note {
            Some("G") => ActuatorCommand::RotateClockwise,
            Some("B") => ActuatorCommand::RotateCounterClockwise,
            Some("D") => ActuatorCommand::Fire,
            _ => ActuatorCommand::NoAction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    Idle,
    Rotating { clockwise: bool },
    Firing,
}

/// The actuator controller. Owns its output lines for its whole life.
pub struct Turret<G: DigitalOutput> {
    gpio: G,
    config: TurretConfig,
    state: ActuatorState,
}

impl<G: DigitalOutput> Turret<G> {
    /// Claim the controller, driving all lines to a known low state.
    pub fn new(gpio: G, config: TurretConfig) -> Result<Self> {
        let mut turret = Self {
            gpio,
            config,
            state: ActuatorState::Idle,
        };
        turret.gpio.set(turret.config.step_pin, false)?;
        turret.gpio.set(turret.config.dir_pin, false)?;
        turret.gpio.set(turret.config.solenoid_pin, false)?;
        Ok(turret)
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Execute one command to completion. Blocks for the command's
    /// configured duration; `NoAction` returns immediately.
    ///
    /// A write failure mid-sequence aborts the action, releases all
    /// outputs best-effort, and propagates the failure.
    pub fn execute(&mut self, command: ActuatorCommand) -> Result<()> {
        match command {
            ActuatorCommand::RotateClockwise => self.rotate(true),
            ActuatorCommand::RotateCounterClockwise => self.rotate(false),
            ActuatorCommand::Fire => self.fire(),
            ActuatorCommand::NoAction => Ok(()),
        }
    }

    fn rotate(&mut self, clockwise: bool) -> Result<()> {
        self.state = ActuatorState::Rotating { clockwise };
        let result = self.step_sequence(clockwise);
        self.state = ActuatorState::Idle;
        if result.is_err() {
            self.release_all();
        }
        result
    }

    fn step_sequence(&mut self, clockwise: bool) -> Result<()> {
        let half_period = Duration::from_millis(self.config.pulse_delay_ms);

        self.gpio.set(self.config.dir_pin, clockwise)?;
        for _ in 0..self.config.rotation_pulses {
            self.gpio.set(self.config.step_pin, true)?;
            thread::sleep(half_period);
            self.gpio.set(self.config.step_pin, false)?;
            thread::sleep(half_period);
        }
        Ok(())
    }

    fn fire(&mut self) -> Result<()> {
        self.state = ActuatorState::Firing;
        let result = self.fire_sequence();
        self.state = ActuatorState::Idle;
        if result.is_err() {
            self.release_all();
        }
        result
    }

    fn fire_sequence(&mut self) -> Result<()> {
        self.gpio.set(self.config.solenoid_pin, true)?;
        thread::sleep(Duration::from_millis(self.config.fire_duration_ms));
        self.gpio.set(self.config.solenoid_pin, false)
    }

    /// Drive every line low, keeping going past individual failures.
    pub fn release_all(&mut self) {
        for pin in [
            self.config.step_pin,
            self.config.dir_pin,
            self.config.solenoid_pin,
        ] {
            if let Err(e) = self.gpio.set(pin, false) {
                warn!("release of pin {pin} failed: {e}");
            }
        }
    }
}

impl<G: DigitalOutput> Drop for Turret<G> {
    fn drop(&mut self) {
        self.release_all();
    }
}
