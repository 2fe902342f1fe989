//! Chroma vector extraction
//!
//! Converts an STFT magnitude spectrogram to 12-element chroma vectors by
//! assigning every bin inside the configured frequency range to its nearest
//! equal-tempered pitch class and summing magnitudes across octaves.

use super::normalization::sharpen_chroma;
use crate::config::AnalysisConfig;
use crate::error::{AudioError, Result};
use crate::features::spectrum::Stft;

/// Pitch-class names, index 0 = C
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch-class energies over time
///
/// One 12-bin column per analysis frame; every entry is non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Chromagram {
    frames: Vec<[f32; 12]>,
}

impl Chromagram {
    /// Build a chromagram from per-frame vectors
    ///
    /// Negative or non-finite energies are clamped to zero.
    pub fn from_frames(frames: Vec<[f32; 12]>) -> Self {
        let frames = frames
            .into_iter()
            .map(|mut f| {
                for x in f.iter_mut() {
                    if !x.is_finite() || *x < 0.0 {
                        *x = 0.0;
                    }
                }
                f
            })
            .collect();
        Self { frames }
    }

    /// Per-frame chroma vectors
    pub fn frames(&self) -> &[[f32; 12]] {
        &self.frames
    }

    /// Number of analysis frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// True if there are no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Average of all frame columns, or `None` for an empty chromagram
    pub fn mean_profile(&self) -> Option<[f32; 12]> {
        if self.frames.is_empty() {
            return None;
        }
        let mut mean = [0.0f64; 12];
        for frame in &self.frames {
            for (m, &x) in mean.iter_mut().zip(frame.iter()) {
                *m += x as f64;
            }
        }
        let n = self.frames.len() as f64;
        let mut out = [0.0f32; 12];
        for (o, m) in out.iter_mut().zip(mean.iter()) {
            *o = (m / n) as f32;
        }
        Some(out)
    }
}

/// Pitch class of frequency `freq` relative to A4 = `center`
fn pitch_class(freq: f32, center: f32) -> usize {
    let midi = 12.0 * (freq / center).log2() + 69.0;
    (midi.round() as i64).rem_euclid(12) as usize
}

/// Extract a chromagram from mono samples
///
/// # Arguments
///
/// * `samples` - Mono audio samples
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Frame/hop size, frequency range, tuning and sharpening
///
/// # Errors
///
/// Returns `AudioError::ConfigError` for an invalid STFT geometry and
/// `AudioError::AnalysisError` for an invalid frequency range.
pub fn extract_chroma(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<Chromagram> {
    log::debug!(
        "Extracting chroma: {} samples at {} Hz",
        samples.len(),
        sample_rate
    );

    if !(config.min_frequency > 0.0 && config.max_frequency > config.min_frequency) {
        return Err(AudioError::AnalysisError(format!(
            "invalid chroma frequency range {}..{} Hz",
            config.min_frequency, config.max_frequency
        )));
    }

    let stft = Stft::new(config.frame_size, config.hop_size)?;
    let bin_hz = sample_rate as f32 / stft.n_fft() as f32;

    // Pitch class per bin, None outside the folded range
    let bin_classes: Vec<Option<usize>> = (0..stft.bins())
        .map(|k| {
            let freq = k as f32 * bin_hz;
            (freq >= config.min_frequency && freq <= config.max_frequency)
                .then(|| pitch_class(freq, config.center_frequency))
        })
        .collect();

    let sharpen = (config.chroma_sharpening_power - 1.0).abs() > f32::EPSILON;
    let frames: Vec<[f32; 12]> = stft
        .magnitude_frames(samples)
        .into_iter()
        .map(|magnitudes| {
            let mut chroma = [0.0f32; 12];
            for (mag, class) in magnitudes.iter().zip(bin_classes.iter()) {
                if let Some(pc) = class {
                    chroma[*pc] += mag;
                }
            }
            if sharpen {
                sharpen_chroma(&chroma, config.chroma_sharpening_power)
            } else {
                chroma
            }
        })
        .collect();

    log::debug!("Extracted {} chroma frames", frames.len());
    Ok(Chromagram::from_frames(frames))
}
