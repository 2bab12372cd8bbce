//! Static configuration, loaded once at startup.
//!
//! Every tunable lives here: audio acquisition parameters, the valid
//! frequency window, the note-range table, and the turret's pin and
//! timing constants. Values come from a TOML file when one is given;
//! every field has a default so a partial (or absent) file works.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::note::{NoteRange, NoteTable};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub detection: DetectionConfig,
    pub notes: Vec<NoteRange>,
    pub turret: TurretConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture rate in Hz.
    pub sample_rate: u32,
    /// Samples per analysis frame.
    pub frame_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Estimates below this are rejected (sub-audible rumble).
    pub min_frequency_hz: f64,
    /// Estimates above this are rejected (spectral artifacts).
    pub max_frequency_hz: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    pub step_pin: u8,
    pub dir_pin: u8,
    pub solenoid_pin: u8,
    /// Step pulses per rotation command.
    pub rotation_pulses: u32,
    /// Half-period of one step pulse, in milliseconds.
    pub pulse_delay_ms: u64,
    /// How long the solenoid stays engaged per fire command.
    pub fire_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            detection: DetectionConfig::default(),
            notes: default_note_table(),
            turret: TurretConfig::default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            frame_size: 2048,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_frequency_hz: 60.0,
            max_frequency_hz: 1000.0,
        }
    }
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            step_pin: 17,
            dir_pin: 27,
            solenoid_pin: 22,
            rotation_pulses: 200,
            pulse_delay_ms: 1,
            fire_duration_ms: 1000,
        }
    }
}

fn default_note_table() -> Vec<NoteRange> {
    vec![
        NoteRange::new("G", 690.0, 710.0),
        NoteRange::new("B", 820.0, 840.0),
        NoteRange::new("D", 515.0, 535.0),
    ]
}

impl Config {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Config =
            toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent configuration before anything is opened.
    ///
    /// Overlapping note ranges in particular are a load-time error,
    /// never a runtime ambiguity.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be nonzero".into()));
        }
        if self.audio.frame_size < 64 {
            return Err(Error::Config(format!(
                "frame_size {} too small (minimum 64)",
                self.audio.frame_size
            )));
        }
        let (min, max) = (
            self.detection.min_frequency_hz,
            self.detection.max_frequency_hz,
        );
        if !(min >= 0.0 && min < max) {
            return Err(Error::Config(format!(
                "invalid frequency bounds [{min}, {max}]"
            )));
        }
        NoteTable::new(self.notes.clone())?;
        let t = &self.turret;
        if t.step_pin == t.dir_pin
            || t.step_pin == t.solenoid_pin
            || t.dir_pin == t.solenoid_pin
        {
            return Err(Error::Config(format!(
                "pins must be distinct (step={}, dir={}, solenoid={})",
                t.step_pin, t.dir_pin, t.solenoid_pin
            )));
        }
        if t.rotation_pulses == 0 {
            return Err(Error::Config("rotation_pulses must be nonzero".into()));
        }
        Ok(())
    }
}
