//! Audio preprocessing modules
//!
//! Utilities for preparing decoded audio for a processing stage:
//! - Channel mixing (stereo to mono)
//! - Leading-window duration capping

pub mod channel_mixer;
pub mod window;
