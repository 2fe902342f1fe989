//! Chroma extraction modules
//!
//! Fold a windowed STFT into a 12-bin pitch-class distribution:
//! - Chromagram computation
//! - Sharpening of prominent semitones

pub mod extractor;
pub mod normalization;

pub use extractor::{extract_chroma, Chromagram, PITCH_CLASSES};
pub use normalization::sharpen_chroma;
