//! Output encoding
//!
//! Two target formats are supported:
//! - `wav`: lossless PCM at the buffer's native sample rate and bit depth
//! - `mp3`: constant 320 kb/s, a fixed policy rather than a caller option
//!
//! WAV output is a pure function of the samples, so encoding the same buffer
//! twice yields identical bytes.

use super::AudioBuffer;
use crate::error::{AudioError, Result, ValidationError};
use crate::governor::{TransientArtifact, TransientStore};
use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Constant bitrate for lossy output, in kb/s
pub const MP3_BITRATE_KBPS: u32 = 320;

/// Frames handed to LAME per call
const MP3_CHUNK_FRAMES: usize = 1152 * 64;

/// Supported output container/codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Lossless PCM WAV
    Wav,
    /// MPEG-1 Layer III at [`MP3_BITRATE_KBPS`]
    #[default]
    Mp3,
}

impl OutputFormat {
    /// Parse a format tag case-insensitively (`"wav"`, `"MP3"`, ...)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "wav" => Some(OutputFormat::Wav),
            "mp3" => Some(OutputFormat::Mp3),
            _ => None,
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }

    /// MIME type of the encoded stream
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }

    /// True for formats that reproduce the samples exactly
    pub fn is_lossless(&self) -> bool {
        matches!(self, OutputFormat::Wav)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OutputFormat::from_tag(s).ok_or_else(|| ValidationError::UnsupportedFormat(s.to_string()))
    }
}

/// Encode `buffer` in the given format
///
/// # Errors
///
/// Returns `AudioError::EncodingError` if the codec rejects the sample
/// layout (e.g. more than two channels or an unsupported rate for MP3).
pub fn encode(buffer: &AudioBuffer, format: OutputFormat) -> Result<Vec<u8>> {
    log::debug!(
        "Encoding {} frames x {} channels as {}",
        buffer.frames(),
        buffer.channel_count(),
        format
    );
    match format {
        OutputFormat::Wav => encode_wav(buffer),
        OutputFormat::Mp3 => encode_mp3(buffer),
    }
}

/// Encode `buffer` and write it to a new transient artifact
///
/// The caller owns the artifact and is responsible for removing it.
pub fn encode_to_artifact(
    buffer: &AudioBuffer,
    format: OutputFormat,
    store: &TransientStore,
) -> Result<TransientArtifact> {
    let bytes = encode(buffer, format)?;
    store.write(format.extension(), &bytes)
}

/// Sample representation written to WAV for a given source bit depth
fn wav_spec_for(buffer: &AudioBuffer) -> hound::WavSpec {
    let (bits_per_sample, sample_format) = match buffer.bits_per_sample() {
        Some(24) => (24, hound::SampleFormat::Int),
        Some(32) => (32, hound::SampleFormat::Float),
        _ => (16, hound::SampleFormat::Int),
    };
    hound::WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample,
        sample_format,
    }
}

fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = wav_spec_for(buffer);
    let wav_err = |e: hound::Error| AudioError::EncodingError(format!("wav: {}", e));

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
        let channels = buffer.channels();
        for i in 0..buffer.frames() {
            for ch in channels {
                let s = ch[i].clamp(-1.0, 1.0);
                match (spec.sample_format, spec.bits_per_sample) {
                    (hound::SampleFormat::Float, _) => writer.write_sample(s),
                    (_, 24) => writer.write_sample((s * 8_388_607.0).round() as i32),
                    _ => writer.write_sample((s * 32_767.0).round() as i16),
                }
                .map_err(wav_err)?;
            }
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
}

fn lame_err(stage: &str, e: impl fmt::Debug) -> AudioError {
    AudioError::EncodingError(format!("mp3 {}: {:?}", stage, e))
}

fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32_767.0).round() as i16)
        .collect()
}

fn encode_mp3(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let channel_count = buffer.channel_count();
    if channel_count > 2 {
        return Err(AudioError::EncodingError(format!(
            "mp3 supports at most 2 channels, got {}",
            channel_count
        )));
    }

    let mut builder = Builder::new()
        .ok_or_else(|| AudioError::EncodingError("cannot allocate LAME encoder".to_string()))?;
    builder
        .set_num_channels(channel_count as u8)
        .map_err(|e| lame_err("channels", e))?;
    builder
        .set_sample_rate(buffer.sample_rate())
        .map_err(|e| lame_err("sample rate", e))?;
    builder
        .set_brate(Bitrate::Kbps320)
        .map_err(|e| lame_err("bitrate", e))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| lame_err("quality", e))?;
    let mut encoder = builder.build().map_err(|e| lame_err("init", e))?;

    let channels = buffer.channels();
    let mut out = Vec::new();
    let mut start = 0;
    while start < buffer.frames() {
        let end = (start + MP3_CHUNK_FRAMES).min(buffer.frames());
        out.reserve(mp3lame_encoder::max_required_buffer_size(end - start));

        let left = to_i16(&channels[0][start..end]);
        if channel_count == 1 {
            encoder
                .encode_to_vec(MonoPcm(&left), &mut out)
                .map_err(|e| lame_err("encode", e))?;
        } else {
            let right = to_i16(&channels[1][start..end]);
            encoder
                .encode_to_vec(
                    DualPcm {
                        left: &left,
                        right: &right,
                    },
                    &mut out,
                )
                .map_err(|e| lame_err("encode", e))?;
        }
        start = end;
    }

    out.reserve(mp3lame_encoder::max_required_buffer_size(0));
    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(|e| lame_err("flush", e))?;
    Ok(out)
}
