//! Semitone pitch shifting

use super::phase_vocoder::time_stretch;
use super::resample::resample_to_length;
use crate::config::TransposeConfig;
use crate::error::{Result, ValidationError};
use crate::features::spectrum::Stft;
use crate::io::AudioBuffer;
use rayon::prelude::*;

/// Frequency ratio of a shift by `semitones` (2^(n/12))
pub fn pitch_ratio(semitones: i32) -> f64 {
    2f64.powf(semitones as f64 / 12.0)
}

/// Shift one channel by `semitones`, keeping its length
///
/// The signal is stretched to `ratio` times its length and then resampled
/// back, which multiplies every frequency by `ratio`. A shift of 0 returns
/// the input unchanged. Content pushed above the Nyquist frequency by an
/// upward shift is filtered out rather than folded back.
pub fn pitch_shift(samples: &[f32], semitones: i32, stft: &Stft) -> Result<Vec<f32>> {
    if semitones == 0 {
        return Ok(samples.to_vec());
    }
    let ratio = pitch_ratio(semitones);
    let stretched = time_stretch(samples, 1.0 / ratio, stft)?;
    resample_to_length(&stretched, samples.len())
}

/// Transpose every channel of `buffer` by `semitones`
///
/// Channels are processed in parallel. The result has the same sample rate,
/// channel count and frame count as the input. Duration capping is the
/// caller's job.
///
/// # Errors
///
/// - `AudioError::Validation(InvalidShift)` if `|semitones|` exceeds
///   `config.max_shift_semitones`
/// - `AudioError::ConfigError` for an invalid FFT/hop geometry
/// - `AudioError::TransformError` / `AudioError::ResourceExhausted` from the
///   stretch
pub fn transpose(
    buffer: &AudioBuffer,
    semitones: i32,
    config: &TransposeConfig,
) -> Result<AudioBuffer> {
    if semitones.unsigned_abs() > config.max_shift_semitones.unsigned_abs() {
        return Err(ValidationError::InvalidShift(semitones).into());
    }

    log::debug!(
        "Transposing {} channels x {} frames by {} semitones (ratio {:.4})",
        buffer.channel_count(),
        buffer.frames(),
        semitones,
        pitch_ratio(semitones)
    );

    let stft = Stft::new(config.fft_size, config.hop_size)?;
    let channels = buffer
        .channels()
        .par_iter()
        .map(|ch| pitch_shift(ch, semitones, &stft))
        .collect::<Result<Vec<Vec<f32>>>>()?;

    buffer.with_channels(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AudioError;
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    const SR: u32 = 22050;

    fn tone(freq: f32, secs: f32) -> Vec<f32> {
        let n = (secs * SR as f32) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    /// Dominant frequency estimated from rising zero crossings in the middle
    fn dominant_frequency(x: &[f32]) -> f32 {
        let mid = &x[x.len() / 4..3 * x.len() / 4];
        let crossings = mid.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count();
        crossings as f32 * SR as f32 / mid.len() as f32
    }

    #[test]
    fn test_pitch_ratio() {
        assert_eq!(pitch_ratio(0), 1.0);
        assert!((pitch_ratio(12) - 2.0).abs() < 1e-12);
        assert!((pitch_ratio(-12) - 0.5).abs() < 1e-12);
        assert!((pitch_ratio(7) - 1.498307).abs() < 1e-5);
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let stft = Stft::new(2048, 512).unwrap();
        let x = tone(440.0, 2.0);
        let y = pitch_shift(&x, 12, &stft).unwrap();
        assert_eq!(y.len(), x.len());
        let f = dominant_frequency(&y);
        assert!((f - 880.0).abs() < 25.0, "dominant frequency {}", f);
    }

    #[test]
    fn test_fifth_down() {
        let stft = Stft::new(2048, 512).unwrap();
        let x = tone(660.0, 2.0);
        let y = pitch_shift(&x, -7, &stft).unwrap();
        assert_eq!(y.len(), x.len());
        let expected = 660.0 / pitch_ratio(7) as f32;
        let f = dominant_frequency(&y);
        assert!((f - expected).abs() < 15.0, "dominant frequency {}", f);
    }

    /// (frequency, magnitude) of the strongest spectral bin
    fn spectral_peak(x: &[f32]) -> (f32, f32) {
        let mut buf: Vec<Complex<f32>> = x.iter().map(|&s| Complex::new(s, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(buf.len()).process(&mut buf);
        let (bin, mag) = buf[..x.len() / 2]
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, c)| (k, c.norm()))
            .fold((0, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });
        (bin as f32 * SR as f32 / x.len() as f32, mag)
    }

    #[test]
    fn test_octave_up_drops_tone_above_nyquist() {
        // 7 kHz up an octave is 14 kHz, past the 11025 Hz Nyquist limit
        let stft = Stft::new(2048, 512).unwrap();
        let x = tone(7000.0, 2.0);
        let y = pitch_shift(&x, 12, &stft).unwrap();
        assert_eq!(y.len(), x.len());

        let (_, input_mag) = spectral_peak(&x);
        let (freq, mag) = spectral_peak(&y);
        assert!(
            mag < 0.05 * input_mag,
            "folded tone at {} Hz keeps {:.1}% of the input",
            freq,
            100.0 * mag / input_mag
        );
    }

    #[test]
    fn test_round_trip_restores_spectrum() {
        let stft = Stft::new(2048, 512).unwrap();
        let x = tone(1000.0, 2.0);
        let (input_freq, input_mag) = spectral_peak(&x);

        for shift in [1, 7, 12] {
            let up = pitch_shift(&x, shift, &stft).unwrap();
            let back = pitch_shift(&up, -shift, &stft).unwrap();
            assert_eq!(back.len(), x.len());

            let (freq, mag) = spectral_peak(&back);
            assert!((freq - input_freq).abs() < 3.0, "+/-{}: peak at {}", shift, freq);
            assert!(
                mag > 0.7 * input_mag && mag < 1.1 * input_mag,
                "+/-{}: peak magnitude {} of {}",
                shift,
                mag,
                input_mag
            );
        }
    }

    #[test]
    fn test_zero_shift_keeps_samples() {
        let buffer = AudioBuffer::new(vec![tone(440.0, 0.5), tone(220.0, 0.5)], SR).unwrap();
        let out = transpose(&buffer, 0, &TransposeConfig::default()).unwrap();
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_transpose_keeps_layout() {
        let buffer = AudioBuffer::new(vec![tone(440.0, 1.0), tone(330.0, 1.0)], SR)
            .unwrap()
            .with_bits_per_sample(Some(24));
        let out = transpose(&buffer, 3, &TransposeConfig::default()).unwrap();
        assert_eq!(out.frames(), buffer.frames());
        assert_eq!(out.channel_count(), 2);
        assert_eq!(out.sample_rate(), SR);
        assert_eq!(out.bits_per_sample(), Some(24));
    }

    #[test]
    fn test_shift_bound() {
        let buffer = AudioBuffer::mono(tone(440.0, 0.1), SR).unwrap();
        let config = TransposeConfig::default();
        assert!(transpose(&buffer, 24, &config).is_ok());
        assert!(matches!(
            transpose(&buffer, -25, &config),
            Err(AudioError::Validation(ValidationError::InvalidShift(-25)))
        ));
    }
}
