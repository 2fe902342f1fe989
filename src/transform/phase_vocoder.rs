//! Phase-vocoder time stretching
//!
//! Reads centered STFT frames at fractional positions `0, rate, 2*rate, ...`,
//! interpolates magnitudes between neighbouring frames and advances each
//! bin's phase by its measured instantaneous frequency. The stretched frames
//! are overlap-added straight into the output, so neither the input nor the
//! output spectrogram is ever held in full.

use crate::error::{AudioError, Result};
use crate::features::spectrum::{OverlapAdd, Stft};
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// The two analysis frames bracketing a fractional position
struct FramePair<'a> {
    samples: &'a [f32],
    stft: &'a Stft,
    n_frames: usize,
    index: Option<usize>,
    left: Vec<Complex<f32>>,
    right: Vec<Complex<f32>>,
}

impl<'a> FramePair<'a> {
    fn new(samples: &'a [f32], stft: &'a Stft) -> Self {
        Self {
            samples,
            stft,
            n_frames: stft.centered_frame_count(samples.len()),
            index: None,
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    fn frame(&self, index: usize) -> Vec<Complex<f32>> {
        if index < self.n_frames {
            self.stft.centered_frame(self.samples, index)
        } else {
            // Past the last frame the spectrum is zero-padded
            vec![Complex::new(0.0, 0.0); self.stft.bins()]
        }
    }

    /// Frames `index` and `index + 1`; `index` never decreases between calls
    fn at(&mut self, index: usize) -> (&[Complex<f32>], &[Complex<f32>]) {
        match self.index {
            Some(current) if current == index => {}
            Some(current) if current + 1 == index => {
                self.left = std::mem::take(&mut self.right);
                self.right = self.frame(index + 1);
            }
            _ => {
                self.left = self.frame(index);
                self.right = self.frame(index + 1);
            }
        }
        self.index = Some(index);
        (&self.left, &self.right)
    }
}

/// Time-stretch `samples` by `rate` without changing pitch
///
/// `rate > 1` shortens the signal, `rate < 1` lengthens it. The output has
/// `round(samples.len() / rate)` samples.
///
/// # Errors
///
/// Returns `AudioError::TransformError` for a non-positive or non-finite
/// rate and `AudioError::ResourceExhausted` if the output cannot be
/// allocated.
pub fn time_stretch(samples: &[f32], rate: f64, stft: &Stft) -> Result<Vec<f32>> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(AudioError::TransformError(format!(
            "invalid stretch rate {}",
            rate
        )));
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let out_len = (samples.len() as f64 / rate).round() as usize;
    let mut frames = FramePair::new(samples, stft);
    let n_frames = frames.n_frames;
    let n_steps = (n_frames as f64 / rate).ceil() as usize;
    let bins = stft.bins();

    log::debug!(
        "Stretching {} samples by rate {:.4}: {} frames -> {} frames",
        samples.len(),
        rate,
        n_frames,
        n_steps
    );

    let mut ola = OverlapAdd::new(stft, n_steps)?;

    // Expected phase advance per hop for each bin
    let phi_advance: Vec<f64> = (0..bins)
        .map(|k| 2.0 * PI * stft.hop() as f64 * k as f64 / stft.n_fft() as f64)
        .collect();

    let mut phase_acc: Vec<f64> = {
        let (first, _) = frames.at(0);
        first.iter().map(|c| c.arg() as f64).collect()
    };
    let mut stretched = vec![Complex::new(0.0f32, 0.0); bins];

    for t in 0..n_steps {
        let step = t as f64 * rate;
        if step >= n_frames as f64 {
            break;
        }
        let index = step.floor() as usize;
        let alpha = (step - index as f64) as f32;
        let (left, right) = frames.at(index);

        for k in 0..bins {
            let mag = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
            stretched[k] = Complex::from_polar(mag, phase_acc[k] as f32);

            let mut dphase = right[k].arg() as f64 - left[k].arg() as f64 - phi_advance[k];
            dphase -= 2.0 * PI * (dphase / (2.0 * PI)).round();
            phase_acc[k] += phi_advance[k] + dphase;
        }

        ola.add(t, &stft.synthesize(&stretched));
    }

    Ok(ola.finish(out_len))
}
