//! Feature extraction modules
//!
//! - Short-time Fourier transform and overlap-add synthesis
//! - Chroma extraction
//! - Key detection

pub mod chroma;
pub mod key;
pub mod spectrum;
