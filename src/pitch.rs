//! Single-frame fundamental frequency estimation.
//!
//! The estimator is a windowed FFT peak picker with parabolic
//! refinement: normalize the int16 frame, apply a Hamming window, take
//! the magnitude spectrum, locate the strongest non-DC bin in the
//! Nyquist-limited half, and fit a parabola through the log-magnitudes
//! around the peak to recover sub-bin resolution. Estimates outside the
//! configured frequency window are reported as absent.
//!
//! Observationally pure: `&mut self` exists only for the reusable FFT
//! buffers; the same frame always yields the same estimate and nothing
//! carries over between frames.

use std::f64::consts::TAU;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::capture::AudioFrame;
use crate::INT16_FULL_SCALE;

/// A located spectral peak, before range rejection.
///
/// `raw_hz` is the plain bin-center frequency; `refined_hz` includes
/// the parabolic correction. Exposed separately so the refinement can
/// be measured against the raw estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    pub raw_hz: f64,
    pub refined_hz: f64,
}

pub struct PitchDetector {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    buf: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    mags: Vec<f64>,
    frame_size: usize,
    sample_rate: f64,
    min_hz: f64,
    max_hz: f64,
}

impl PitchDetector {
    pub fn new(frame_size: usize, sample_rate: u32, min_hz: f64, max_hz: f64) -> Self {
        let fft = FftPlanner::<f64>::new().plan_fft_forward(frame_size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];

        Self {
            fft,
            window: hamming_window(frame_size),
            buf: vec![Complex::default(); frame_size],
            scratch,
            mags: vec![0.0; frame_size / 2],
            frame_size,
            sample_rate: sample_rate as f64,
            min_hz,
            max_hz,
        }
    }

    /// Estimate the fundamental frequency of one frame.
    ///
    /// Returns `None` when the spectral peak falls outside the
    /// configured [min, max] window.
    pub fn estimate(&mut self, frame: &AudioFrame) -> Option<f64> {
        let hz = self.peak(frame)?.refined_hz;
        (self.min_hz..=self.max_hz).contains(&hz).then_some(hz)
    }

    /// Locate the spectral peak of one frame, without range rejection.
    pub fn peak(&mut self, frame: &AudioFrame) -> Option<SpectralPeak> {
        debug_assert_eq!(frame.sample_rate as f64, self.sample_rate);
        if frame.samples.len() != self.frame_size {
            return None;
        }

        for (dst, (&s, &w)) in self
            .buf
            .iter_mut()
            .zip(frame.samples.iter().zip(&self.window))
        {
            *dst = Complex::new(s as f64 / INT16_FULL_SCALE * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        let half = self.frame_size / 2;
        for (m, c) in self.mags.iter_mut().zip(&self.buf[..half]) {
            *m = c.norm();
        }

        // Strongest bin in [1, half); bin 0 is DC.
        let mut peak_bin = 1;
        for (i, &m) in self.mags.iter().enumerate().skip(2) {
            if m > self.mags[peak_bin] {
                peak_bin = i;
            }
        }

        let bin_hz = self.sample_rate / self.frame_size as f64;
        let raw_hz = peak_bin as f64 * bin_hz;
        let refined_hz = if peak_bin + 1 < half {
            (peak_bin as f64 + parabolic_offset(&self.mags, peak_bin)) * bin_hz
        } else {
            // No right neighbor to fit against.
            raw_hz
        };

        Some(SpectralPeak { raw_hz, refined_hz })
    }
}

/// Sub-bin offset of the true peak, from a parabola fit through the
/// log-magnitudes at `bin - 1`, `bin`, `bin + 1`.
///
/// Falls back to 0 when the denominator is numerically zero (flat or
/// silent spectrum), where the naive formula would blow up.
fn parabolic_offset(mags: &[f64], bin: usize) -> f64 {
    let y0 = mags[bin - 1].max(f64::MIN_POSITIVE).ln();
    let y1 = mags[bin].max(f64::MIN_POSITIVE).ln();
    let y2 = mags[bin + 1].max(f64::MIN_POSITIVE).ln();

    let denom = 2.0 * (2.0 * y1 - y2 - y0);
    if denom.abs() < f64::EPSILON {
        0.0
    } else {
        (y2 - y0) / denom
    }
}

fn hamming_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (TAU * i as f64 / (n - 1) as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48_000;
    const FRAME_SIZE: usize = 2048;

    fn sine_frame(freq: f64, amplitude: f64) -> AudioFrame {
        let samples = (0..FRAME_SIZE)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE as f64;
                (amplitude * (TAU * freq * t).sin() * 32767.0) as i16
            })
            .collect();
        AudioFrame {
            samples,
            sample_rate: SAMPLE_RATE,
        }
    }

    fn detector() -> PitchDetector {
        PitchDetector::new(FRAME_SIZE, SAMPLE_RATE, 60.0, 1000.0)
    }

    #[test]
    fn sine_estimates_land_within_one_bin() {
        let bin_hz = SAMPLE_RATE as f64 / FRAME_SIZE as f64;
        let mut det = detector();

        for freq in [82.4, 233.7, 440.0, 700.0, 987.7] {
            let estimate = det
                .estimate(&sine_frame(freq, 0.8))
                .expect("in-range sine must produce an estimate");
            assert!(
                (estimate - freq).abs() <= bin_hz,
                "{freq} Hz estimated as {estimate} Hz (> one bin off)"
            );
        }
    }

    #[test]
    fn interpolation_beats_raw_bin_for_off_center_frequencies() {
        let mut det = detector();
        let mut improved = 0;
        let mut total = 0;

        // Step chosen so frequencies land between bin centers.
        let mut freq = 100.0;
        while freq < 900.0 {
            let peak = det.peak(&sine_frame(freq, 0.8)).unwrap();
            total += 1;
            if (peak.refined_hz - freq).abs() < (peak.raw_hz - freq).abs() {
                improved += 1;
            }
            freq += 7.73;
        }

        assert!(
            improved * 10 >= total * 9,
            "refinement improved only {improved}/{total} estimates"
        );
    }

    #[test]
    fn frequencies_outside_bounds_are_absent() {
        let mut det = detector();
        assert_eq!(det.estimate(&sine_frame(30.0, 0.8)), None);
        assert_eq!(det.estimate(&sine_frame(1500.0, 0.8)), None);
    }

    #[test]
    fn silence_is_absent() {
        let mut det = detector();
        let silence = AudioFrame {
            samples: vec![0; FRAME_SIZE],
            sample_rate: SAMPLE_RATE,
        };
        // Flat spectrum: the parabolic denominator is zero and the
        // fallback raw bin (~23 Hz) sits below the valid window.
        assert_eq!(det.estimate(&silence), None);
    }

    #[test]
    fn dc_offset_does_not_register_as_a_pitch() {
        let mut det = detector();
        let dc = AudioFrame {
            samples: vec![8000; FRAME_SIZE],
            sample_rate: SAMPLE_RATE,
        };
        assert_eq!(det.estimate(&dc), None);
    }

    #[test]
    fn estimation_is_stateless_across_frames() {
        let mut det = detector();
        let first = det.estimate(&sine_frame(700.0, 0.8));
        det.estimate(&sine_frame(830.0, 0.8));
        let again = det.estimate(&sine_frame(700.0, 0.8));
        assert_eq!(first, again);
    }

    #[test]
    fn wrong_length_frame_yields_no_peak() {
        let mut det = detector();
        let short = AudioFrame {
            samples: vec![0; FRAME_SIZE / 2],
            sample_rate: SAMPLE_RATE,
        };
        assert_eq!(det.peak(&short), None);
    }
}
