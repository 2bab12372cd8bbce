//! Error types for notefire.
//!
//! One enum covers the whole pipeline. Transient stream failures are the
//! only recoverable variant; callers skip the cycle and keep looping.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Audio input device missing or unopenable. Fatal at startup.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Stream read failure, overflow, or starvation. Transient: the
    /// pipeline skips the cycle and retries.
    #[error("stream read failure: {0}")]
    StreamRead(String),

    /// Digital output write failed. Fatal: the current action is
    /// aborted and outputs are released before this propagates.
    #[error("gpio write failed on pin {pin}: {source}")]
    Gpio {
        pin: u8,
        #[source]
        source: std::io::Error,
    },

    /// Malformed or inconsistent configuration. Fatal at load.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Transient errors are skipped by the pipeline; everything else
    /// aborts it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StreamRead(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
