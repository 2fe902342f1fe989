//! Audio decoding using Symphonia

use super::AudioBuffer;
use crate::error::{AudioError, Result};
use crate::preprocessing::window::max_frames;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded leading window of a stream
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Decoded samples, no longer than the requested window
    pub buffer: AudioBuffer,
    /// Duration of the whole stream in seconds
    ///
    /// When decoding stopped early and the container declares no frame
    /// count, this is the decoded duration.
    pub source_secs: f32,
    /// True if the stream continues past `buffer`
    pub truncated: bool,
}

impl Decoded {
    /// A fully decoded buffer
    pub fn whole(buffer: AudioBuffer) -> Self {
        let source_secs = buffer.duration_secs();
        Self {
            buffer,
            source_secs,
            truncated: false,
        }
    }
}

/// Source of decoded audio for the pipeline
///
/// The pipeline is generic over this trait so that admission can be checked
/// without ever touching a real codec.
pub trait Decode: Send + Sync {
    /// Decode at most the leading `max_secs` of the file at `path`
    ///
    /// `None` decodes the whole stream.
    fn decode_file(&self, path: &Path, max_secs: Option<f32>) -> Result<Decoded>;
}

/// Symphonia-backed decoder (MP3, WAV/PCM)
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl Decode for SymphoniaDecoder {
    fn decode_file(&self, path: &Path, max_secs: Option<f32>) -> Result<Decoded> {
        decode_audio_window(path, max_secs)
    }
}

/// Decode audio file to planar PCM samples
///
/// # Arguments
///
/// * `path` - Path to audio file; its extension is used as a format hint
///
/// # Errors
///
/// Returns `AudioError::DecodingError` for unreadable, empty, corrupt or
/// unsupported input, and `AudioError::ResourceExhausted` if the decoded
/// samples cannot be allocated.
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    Ok(decode_audio_window(path, None)?.buffer)
}

/// Decode the leading `max_secs` of an audio file
///
/// Packets past the window are never decoded, so memory is bounded by the
/// window rather than by the length of the stream.
pub fn decode_audio_window<P: AsRef<Path>>(path: P, max_secs: Option<f32>) -> Result<Decoded> {
    let path = path.as_ref();
    log::debug!("Decoding audio file: {}", path.display());

    let file = File::open(path).map_err(|e| {
        AudioError::DecodingError(format!("cannot open {}: {}", path.display(), e))
    })?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_source(Box::new(file), extension, max_secs)
}

/// Decode an in-memory encoded stream
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer> {
    log::debug!("Decoding {} bytes from memory", bytes.len());
    Ok(decode_source(Box::new(Cursor::new(bytes)), extension, None)?.buffer)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    max_secs: Option<f32>,
) -> Result<Decoded> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| AudioError::DecodingError(format!("unrecognized container: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodingError("no supported audio track".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::DecodingError("stream has no sample rate".to_string()))?;
    let bits_per_sample = track.codec_params.bits_per_sample;
    let expected_frames = track.codec_params.n_frames;
    let limit = max_secs.map(|secs| max_frames(secs, sample_rate));

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::DecodingError(format!("unsupported codec: {}", e)))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut truncated = false;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AudioError::DecodingError(format!("corrupt stream: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }
        if let (Some(limit), Some(first)) = (limit, channels.first()) {
            if first.len() >= limit {
                truncated = true;
                break;
            }
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A single damaged packet is skipped, as players do
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(AudioError::DecodingError(format!("decode failed: {}", e))),
        };

        let spec = *decoded.spec();
        let n_channels = spec.channels.count();
        if n_channels == 0 {
            return Err(AudioError::DecodingError("stream has no channels".to_string()));
        }

        if channels.is_empty() {
            channels = (0..n_channels).map(|_| Vec::new()).collect();
            let capacity = match (expected_frames, limit) {
                (Some(n), Some(limit)) => Some((n as usize).min(limit)),
                (Some(n), None) => Some(n as usize),
                (None, limit) => limit,
            };
            if let Some(n) = capacity {
                for ch in channels.iter_mut() {
                    reserve(ch, n)?;
                }
            }
        } else if channels.len() != n_channels {
            return Err(AudioError::DecodingError(format!(
                "channel count changed mid-stream: {} -> {}",
                channels.len(),
                n_channels
            )));
        }

        let needed = decoded.capacity() * n_channels;
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        let interleaved = buf.samples();
        let mut frames = interleaved.len() / n_channels;
        if let Some(limit) = limit {
            let room = limit.saturating_sub(channels[0].len());
            if frames > room {
                frames = room;
                truncated = true;
            }
        }
        for (c, ch) in channels.iter_mut().enumerate() {
            reserve(ch, frames)?;
            ch.extend(interleaved.iter().skip(c).step_by(n_channels).take(frames));
        }
        if truncated {
            break;
        }
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(AudioError::DecodingError("stream contains no audio frames".to_string()));
    }

    let buffer = AudioBuffer::new(channels, sample_rate)?.with_bits_per_sample(bits_per_sample);
    let source_secs = match expected_frames {
        Some(n) if truncated => n as f32 / sample_rate as f32,
        _ => buffer.duration_secs(),
    };
    log::debug!(
        "Decoded {} frames x {} channels at {} Hz ({:.2}s of {:.2}s)",
        buffer.frames(),
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration_secs(),
        source_secs
    );
    Ok(Decoded {
        buffer,
        source_secs,
        truncated,
    })
}

fn reserve(samples: &mut Vec<f32>, additional: usize) -> Result<()> {
    samples.try_reserve(additional).map_err(|e| {
        AudioError::ResourceExhausted(format!(
            "cannot allocate {} decoded samples: {}",
            additional, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_input_fails() {
        let result = decode_bytes(Vec::new(), Some("wav"));
        assert!(matches!(result, Err(AudioError::DecodingError(_))));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let garbage: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
        let result = decode_bytes(garbage, Some("mp3"));
        assert!(matches!(result, Err(AudioError::DecodingError(_))));
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let result = decode_audio("/nonexistent/definitely-missing.wav");
        assert!(matches!(result, Err(AudioError::DecodingError(_))));
    }

    fn write_wav(path: &Path, frames: usize, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample((i % 200) as i16 * 50).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_stops_at_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, 8000 * 3, 8000);

        let decoded = decode_audio_window(&path, Some(1.0)).unwrap();
        assert_eq!(decoded.buffer.frames(), 8000);
        assert!(decoded.truncated);
        assert!((decoded.source_secs - 3.0).abs() < 1e-3);
        // Samples are the leading ones, not an arbitrary slice
        assert!((decoded.buffer.channels()[0][199] - (199.0 * 50.0 / 32768.0)).abs() < 1e-4);

        let whole = decode_audio_window(&path, Some(10.0)).unwrap();
        assert_eq!(whole.buffer.frames(), 8000 * 3);
        assert!(!whole.truncated);
        assert!((whole.source_secs - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_wav_roundtrip_preserves_layout() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..2205 {
                writer.write_sample((i % 100) as i16 * 100).unwrap();
                writer.write_sample(-1000i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let buffer = decode_bytes(cursor.into_inner(), Some("wav")).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 2205);
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.bits_per_sample(), Some(16));
        assert!((buffer.channels()[1][10] + 1000.0 / 32768.0).abs() < 1e-4);
    }
}
