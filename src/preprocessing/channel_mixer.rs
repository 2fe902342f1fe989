//! Channel mixing (multi-channel to mono)

use crate::io::AudioBuffer;

/// Fold every channel of `buffer` into one mono signal
///
/// Each output sample is the arithmetic mean of the input channels at that
/// frame. A mono buffer is returned as a copy.
pub fn mix_to_mono(buffer: &AudioBuffer) -> Vec<f32> {
    let channels = buffer.channels();
    log::debug!(
        "Mixing {} channels to mono ({} frames)",
        channels.len(),
        buffer.frames()
    );

    if channels.len() == 1 {
        return channels[0].clone();
    }

    let scale = 1.0 / channels.len() as f32;
    (0..buffer.frames())
        .map(|i| channels.iter().map(|ch| ch[i]).sum::<f32>() * scale)
        .collect()
}
