//! Decoded audio container

use crate::error::{AudioError, Result};

/// Decoded, planar audio
///
/// A buffer is never mutated after construction; every stage that changes
/// the signal produces a new `AudioBuffer`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// One sample vector per channel, all of equal length
    channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
    /// Bit depth of the source stream, when the container reports one
    bits_per_sample: Option<u32>,
}

impl AudioBuffer {
    /// Create a buffer from planar channel data
    ///
    /// # Errors
    ///
    /// Returns `AudioError::DecodingError` if there are no channels, the
    /// channels differ in length, or the sample rate is zero.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(AudioError::DecodingError("no audio channels".to_string()));
        }
        if sample_rate == 0 {
            return Err(AudioError::DecodingError("sample rate is zero".to_string()));
        }
        let frames = channels[0].len();
        if let Some((i, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != frames) {
            return Err(AudioError::DecodingError(format!(
                "channel {} has {} samples, expected {}",
                i,
                ch.len(),
                frames
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
            bits_per_sample: None,
        })
    }

    /// Create a single-channel buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(vec![samples], sample_rate)
    }

    /// Record the source bit depth
    pub fn with_bits_per_sample(mut self, bits: Option<u32>) -> Self {
        self.bits_per_sample = bits;
        self
    }

    /// Planar channel data
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// True if the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Source bit depth, if known
    pub fn bits_per_sample(&self) -> Option<u32> {
        self.bits_per_sample
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    /// New buffer holding at most the first `max_frames` frames of each channel
    pub fn leading(&self, max_frames: usize) -> AudioBuffer {
        let n = self.frames().min(max_frames);
        AudioBuffer {
            channels: self.channels.iter().map(|ch| ch[..n].to_vec()).collect(),
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
        }
    }

    /// New buffer with the same rate and bit depth but different samples
    pub fn with_channels(&self, channels: Vec<Vec<f32>>) -> Result<AudioBuffer> {
        Ok(AudioBuffer::new(channels, self.sample_rate)?.with_bits_per_sample(self.bits_per_sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_channels() {
        let result = AudioBuffer::new(vec![vec![0.0; 10], vec![0.0; 9]], 44100);
        assert!(matches!(result, Err(AudioError::DecodingError(_))));
    }

    #[test]
    fn test_rejects_zero_rate_and_no_channels() {
        assert!(AudioBuffer::mono(vec![0.0; 4], 0).is_err());
        assert!(AudioBuffer::new(vec![], 44100).is_err());
    }

    #[test]
    fn test_leading_truncates_every_channel() {
        let buffer = AudioBuffer::new(vec![vec![1.0; 100], vec![2.0; 100]], 10)
            .unwrap()
            .with_bits_per_sample(Some(24));
        let head = buffer.leading(30);
        assert_eq!(head.frames(), 30);
        assert_eq!(head.channel_count(), 2);
        assert_eq!(head.bits_per_sample(), Some(24));
        assert!((head.duration_secs() - 3.0).abs() < 1e-6);

        // Longer window than the signal keeps everything
        assert_eq!(buffer.leading(1000).frames(), 100);
    }
}
