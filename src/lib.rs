pub mod actuator;
pub mod capture; // Live audio frame acquisition
pub mod config;
pub mod error;
pub mod note;
pub mod pitch;
pub mod pipeline; // The sense-act loop tying the stages together

pub use config::Config;
pub use error::{Error, Result};

/// Full-scale magnitude of a signed 16-bit sample.
pub const INT16_FULL_SCALE: f64 = 32768.0;
