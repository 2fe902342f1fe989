//! Pitch transposition
//!
//! Shifts pitch by an integer number of semitones while keeping duration:
//! a phase-vocoder time stretch by `2^(-n/12)` followed by resampling back to
//! the original length.

pub mod phase_vocoder;
pub mod pitch_shift;
pub mod resample;

pub use phase_vocoder::time_stretch;
pub use pitch_shift::{pitch_shift, pitch_ratio, transpose};
pub use resample::resample_to_length;
