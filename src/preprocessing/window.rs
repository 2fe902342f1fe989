//! Bounded-duration window selection
//!
//! Analysis and transposition both work on the leading portion of a signal,
//! capped at a per-path duration.

use crate::io::AudioBuffer;

/// Number of frames covered by `max_secs` at `sample_rate`
pub fn max_frames(max_secs: f32, sample_rate: u32) -> usize {
    if !max_secs.is_finite() || max_secs <= 0.0 {
        return 0;
    }
    (max_secs as f64 * sample_rate as f64).floor() as usize
}

/// Leading portion of `buffer`, at most `max_secs` long
///
/// Buffers already within the cap are returned unchanged (as a copy).
pub fn leading_window(buffer: &AudioBuffer, max_secs: f32) -> AudioBuffer {
    let limit = max_frames(max_secs, buffer.sample_rate());
    if buffer.frames() > limit {
        log::debug!(
            "Truncating {:.2}s of audio to the leading {:.2}s",
            buffer.duration_secs(),
            max_secs
        );
    }
    buffer.leading(limit)
}
