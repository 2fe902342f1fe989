//! Short-time Fourier transform helpers
//!
//! Shared by the chroma extractor (magnitude frames) and the phase vocoder
//! (complex analysis frames plus overlap-add resynthesis).
//!
//! Frames are Hann-windowed and carry the `n_fft / 2 + 1` non-negative
//! frequency bins of a real signal. Centered frames follow the usual
//! convention: frame `t` is centered on sample `t * hop`, with zeros assumed
//! outside the signal.

use crate::error::{AudioError, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let t = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            0.5 * (1.0 - t.cos())
        })
        .collect()
}

/// Planned forward/inverse FFTs for a fixed frame and hop size
#[derive(Clone)]
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .finish()
    }
}

impl Stft {
    /// Plan transforms for frames of `n_fft` samples spaced `hop` apart
    ///
    /// # Errors
    ///
    /// Returns `AudioError::ConfigError` if `n_fft < 2`, `hop == 0` or
    /// `hop > n_fft`.
    pub fn new(n_fft: usize, hop: usize) -> Result<Self> {
        if n_fft < 2 || hop == 0 || hop > n_fft {
            return Err(AudioError::ConfigError(format!(
                "invalid STFT geometry: n_fft={}, hop={}",
                n_fft, hop
            )));
        }
        let mut planner = FftPlanner::new();
        Ok(Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        })
    }

    /// Frame length in samples
    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Hop length in samples
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of non-negative frequency bins per frame
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Analysis window
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Number of centered frames covering `len` samples
    pub fn centered_frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Spectrum of the windowed frame starting at sample offset `start`
    ///
    /// `start` may be negative or run past the end; samples outside
    /// `samples` are zero.
    pub fn frame_at(&self, samples: &[f32], start: isize) -> Vec<Complex<f32>> {
        let mut buf: Vec<Complex<f32>> = (0..self.n_fft)
            .map(|i| {
                let idx = start + i as isize;
                let x = if idx >= 0 {
                    samples.get(idx as usize).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                Complex::new(x * self.window[i], 0.0)
            })
            .collect();
        self.forward.process(&mut buf);
        buf.truncate(self.bins());
        buf
    }

    /// Spectrum of centered frame `index`
    pub fn centered_frame(&self, samples: &[f32], index: usize) -> Vec<Complex<f32>> {
        let start = (index * self.hop) as isize - (self.n_fft / 2) as isize;
        self.frame_at(samples, start)
    }

    /// Magnitude spectra of consecutive non-centered frames
    ///
    /// A signal shorter than one frame yields a single zero-padded frame; an
    /// empty signal yields none.
    pub fn magnitude_frames(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        if samples.is_empty() {
            return Vec::new();
        }
        let n_frames = if samples.len() <= self.n_fft {
            1
        } else {
            1 + (samples.len() - self.n_fft) / self.hop
        };

        (0..n_frames)
            .map(|t| {
                self.frame_at(samples, (t * self.hop) as isize)
                    .iter()
                    .map(|c| c.norm())
                    .collect()
            })
            .collect()
    }

    /// Windowed time-domain frame from a half spectrum
    ///
    /// The imaginary parts of the DC and Nyquist bins are ignored.
    pub fn synthesize(&self, spectrum: &[Complex<f32>]) -> Vec<f32> {
        let n = self.n_fft;
        let mut buf = vec![Complex::new(0.0f32, 0.0); n];
        for (k, &value) in spectrum.iter().take(self.bins()).enumerate() {
            buf[k] = value;
            if k > 0 && k < n - k {
                buf[n - k] = value.conj();
            }
        }
        buf[0].im = 0.0;
        if n % 2 == 0 {
            buf[n / 2].im = 0.0;
        }

        self.inverse.process(&mut buf);
        let scale = 1.0 / n as f32;
        buf.iter()
            .zip(self.window.iter())
            .map(|(c, &w)| c.re * scale * w)
            .collect()
    }
}

/// Overlap-add accumulator for centered frames
///
/// Frames are added in any order; [`finish`](Self::finish) divides by the
/// summed squared window and strips the centering pad.
#[derive(Debug)]
pub struct OverlapAdd {
    n_fft: usize,
    hop: usize,
    signal: Vec<f32>,
    window_sum: Vec<f32>,
    window_sq: Vec<f32>,
}

impl OverlapAdd {
    /// Accumulator for `n_frames` frames of `stft`'s geometry
    ///
    /// # Errors
    ///
    /// Returns `AudioError::ResourceExhausted` if the output cannot be
    /// allocated.
    pub fn new(stft: &Stft, n_frames: usize) -> Result<Self> {
        let n_fft = stft.n_fft();
        let hop = stft.hop();
        let len = n_fft + hop * n_frames.saturating_sub(1);

        let mut signal = Vec::new();
        let mut window_sum = Vec::new();
        for buf in [&mut signal, &mut window_sum] {
            buf.try_reserve_exact(len).map_err(|e| {
                AudioError::ResourceExhausted(format!(
                    "cannot allocate {} output samples: {}",
                    len, e
                ))
            })?;
            buf.resize(len, 0.0);
        }

        Ok(Self {
            n_fft,
            hop,
            signal,
            window_sum,
            window_sq: stft.window().iter().map(|w| w * w).collect(),
        })
    }

    /// Add synthesized frame `index`
    pub fn add(&mut self, index: usize, frame: &[f32]) {
        let start = index * self.hop;
        for (i, &x) in frame.iter().take(self.n_fft).enumerate() {
            if let Some(slot) = self.signal.get_mut(start + i) {
                *slot += x;
                self.window_sum[start + i] += self.window_sq[i];
            }
        }
    }

    /// Normalised signal of exactly `length` samples
    pub fn finish(mut self, length: usize) -> Vec<f32> {
        let tiny = f32::MIN_POSITIVE.sqrt();
        for (x, &w) in self.signal.iter_mut().zip(self.window_sum.iter()) {
            if w > tiny {
                *x /= w;
            }
        }

        let offset = (self.n_fft / 2).min(self.signal.len());
        let mut out = self.signal.split_off(offset);
        out.resize(length, 0.0);
        out
    }
}
