//! Audio I/O modules
//!
//! Decoding with Symphonia into an immutable [`AudioBuffer`], and encoding
//! transposed audio to WAV (hound) or MP3 (LAME).

pub mod audio_buffer;
pub mod decoder;
pub mod encoder;

pub use audio_buffer::AudioBuffer;
pub use decoder::{decode_audio, decode_audio_window, decode_bytes, Decode, Decoded, SymphoniaDecoder};
pub use encoder::{encode, OutputFormat, MP3_BITRATE_KBPS};
