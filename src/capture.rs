//! Fixed-size frame acquisition from a live input stream.
//!
//! The cpal callback runs on the audio backend's thread and only feeds
//! a lock-free SPSC ring buffer; the pipeline side blocks on the
//! consumer end until a full frame is available. Multi-channel devices
//! are reduced to channel 0, and f32-only devices are converted to
//! int16 in the callback so the analysis path sees one sample format.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// One block of consecutive samples, consumed once and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Anything that can hand the pipeline full frames, one at a time.
///
/// The live implementation is [`CaptureStream`]; tests substitute
/// scripted sources.
pub trait FrameSource {
    /// Block until a full frame is available.
    ///
    /// A transient error ([`Error::is_transient`]) means the cycle
    /// should be skipped and the call retried.
    fn next_frame(&mut self) -> Result<AudioFrame>;
}

/// How long a read may starve before it is reported as a transient
/// failure instead of blocking forever.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// How many frames the ring buffer holds before the callback starts
/// dropping samples.
const RING_FRAMES: usize = 8;

pub struct CaptureStream {
    // Held so the backend keeps the stream open; dropped with us.
    _stream: cpal::Stream,
    rx: Consumer<i16>,
    frame_size: usize,
    sample_rate: u32,
    overruns: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
}

impl CaptureStream {
    /// Open a capture stream on an already-resolved input device.
    ///
    /// Device discovery and selection belong to the caller; this only
    /// negotiates the format and starts the stream.
    pub fn open(device: &cpal::Device, sample_rate: u32, frame_size: usize) -> Result<Self> {
        let supported = device
            .default_input_config()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        let channels = supported.channels() as usize;
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = RingBuffer::<i16>::new(frame_size * RING_FRAMES);
        let overruns = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicBool::new(false));

        let err_flag = failed.clone();
        let err_fn = move |err: cpal::StreamError| {
            warn!("audio stream error: {err}");
            err_flag.store(true, Ordering::Relaxed);
        };

        let stream = match supported.sample_format() {
            SampleFormat::I16 => {
                let mut sink = FrameSink::new(tx, channels, overruns.clone());
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _| sink.push_i16(data),
                    err_fn,
                    None,
                )
            }
            SampleFormat::F32 => {
                let mut sink = FrameSink::new(tx, channels, overruns.clone());
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _| sink.push_f32(data),
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(Error::DeviceUnavailable(format!(
                    "unsupported input sample format {other:?}"
                )))
            }
        }
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            rx,
            frame_size,
            sample_rate,
            overruns,
            failed,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl FrameSource for CaptureStream {
    fn next_frame(&mut self) -> Result<AudioFrame> {
        let deadline = Instant::now() + READ_TIMEOUT;

        loop {
            if self.failed.swap(false, Ordering::Relaxed) {
                return Err(Error::StreamRead("reported by audio backend".into()));
            }

            if self.rx.slots() >= self.frame_size {
                let dropped = self.overruns.swap(0, Ordering::Relaxed);
                if dropped > 0 {
                    debug!("ring buffer overran; dropped {dropped} samples");
                }

                let mut samples = Vec::with_capacity(self.frame_size);
                for _ in 0..self.frame_size {
                    match self.rx.pop() {
                        Ok(s) => samples.push(s),
                        Err(_) => {
                            return Err(Error::StreamRead(
                                "ring buffer underran mid-frame".into(),
                            ))
                        }
                    }
                }
                return Ok(AudioFrame {
                    samples,
                    sample_rate: self.sample_rate,
                });
            }

            if Instant::now() >= deadline {
                return Err(Error::StreamRead(format!(
                    "no samples within {READ_TIMEOUT:?}"
                )));
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Callback-side half: channel-0 extraction, format conversion, and
/// overrun accounting. Runs on the audio thread; must not block.
struct FrameSink {
    tx: Producer<i16>,
    channels: usize,
    overruns: Arc<AtomicU64>,
}

impl FrameSink {
    fn new(tx: Producer<i16>, channels: usize, overruns: Arc<AtomicU64>) -> Self {
        Self {
            tx,
            channels,
            overruns,
        }
    }

    fn push_i16(&mut self, data: &[i16]) {
        for frame in data.chunks(self.channels) {
            self.push_sample(frame[0]);
        }
    }

    fn push_f32(&mut self, data: &[f32]) {
        for frame in data.chunks(self.channels) {
            self.push_sample((frame[0].clamp(-1.0, 1.0) * 32767.0) as i16);
        }
    }

    fn push_sample(&mut self, sample: i16) {
        if self.tx.push(sample).is_err() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_reduces_interleaved_input_to_channel_zero() {
        let (tx, mut rx) = RingBuffer::<i16>::new(8);
        let mut sink = FrameSink::new(tx, 2, Arc::new(AtomicU64::new(0)));

        sink.push_i16(&[10, -99, 20, -99, 30, -99]);

        assert_eq!(rx.pop(), Ok(10));
        assert_eq!(rx.pop(), Ok(20));
        assert_eq!(rx.pop(), Ok(30));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn sink_converts_f32_full_scale() {
        let (tx, mut rx) = RingBuffer::<i16>::new(8);
        let mut sink = FrameSink::new(tx, 1, Arc::new(AtomicU64::new(0)));

        sink.push_f32(&[1.0, -1.0, 0.0, 2.0]);

        assert_eq!(rx.pop(), Ok(32767));
        assert_eq!(rx.pop(), Ok(-32767));
        assert_eq!(rx.pop(), Ok(0));
        // Out-of-range input clamps instead of wrapping.
        assert_eq!(rx.pop(), Ok(32767));
    }

    #[test]
    fn sink_counts_dropped_samples_on_overrun() {
        let overruns = Arc::new(AtomicU64::new(0));
        let (tx, _rx) = RingBuffer::<i16>::new(2);
        let mut sink = FrameSink::new(tx, 1, overruns.clone());

        sink.push_i16(&[1, 2, 3, 4, 5]);

        assert_eq!(overruns.load(Ordering::Relaxed), 3);
    }
}
