//! Band-limited resampling
//!
//! Windowed-sinc interpolation via rubato. The filter cutoff follows the
//! lower of the input and output Nyquist frequencies, so decimation removes
//! content that would otherwise fold back into the audible band.

use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input frames handed to the resampler per call
const CHUNK_FRAMES: usize = 4096;

/// Sinc filter length in taps
const SINC_LEN: usize = 128;

fn resample_err(e: impl std::fmt::Display) -> AudioError {
    AudioError::TransformError(format!("resampling failed: {}", e))
}

/// Resample `samples` to exactly `target_len` samples
///
/// The input is treated as spanning the same duration as the output, so
/// the effective rate ratio is `target_len / samples.len()`. The resampler's
/// group delay is removed, so sample `i` of the output lines up with
/// position `i * samples.len() / target_len` of the input.
///
/// # Errors
///
/// Returns `AudioError::TransformError` if the ratio is outside what the
/// resampler supports.
pub fn resample_to_length(samples: &[f32], target_len: usize) -> Result<Vec<f32>> {
    if samples.is_empty() || target_len == 0 {
        return Ok(vec![0.0; target_len]);
    }
    if samples.len() == target_len {
        return Ok(samples.to_vec());
    }

    let ratio = target_len as f64 / samples.len() as f64;
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1).map_err(resample_err)?;

    let delay = resampler.output_delay();
    let wanted = target_len + delay;
    let mut out: Vec<f32> = Vec::new();
    out.try_reserve_exact(wanted + CHUNK_FRAMES)
        .map_err(|e| AudioError::ResourceExhausted(format!("cannot allocate {} samples: {}", wanted, e)))?;

    let mut pos = 0;
    while out.len() < wanted {
        let needed = resampler.input_frames_next();
        let chunk = if pos + needed <= samples.len() {
            let chunk = resampler
                .process(&[&samples[pos..pos + needed]], None)
                .map_err(resample_err)?;
            pos += needed;
            chunk
        } else if pos < samples.len() {
            let chunk = resampler
                .process_partial(Some(&[&samples[pos..]]), None)
                .map_err(resample_err)?;
            pos = samples.len();
            chunk
        } else {
            // Flush the filter tail with silence
            resampler
                .process_partial::<&[f32]>(None, None)
                .map_err(resample_err)?
        };
        match chunk.into_iter().next() {
            Some(channel) => out.extend_from_slice(&channel),
            None => break,
        }
    }

    out.drain(..delay.min(out.len()));
    out.resize(target_len, 0.0);
    Ok(out)
}
