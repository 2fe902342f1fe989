//! Key detection modules
//!
//! Detect musical key using:
//! - Krumhansl-Kessler templates (24 keys)
//! - Pearson correlation against the mean chroma profile

pub mod detector;
pub mod templates;

pub use detector::{detect_key, detect_key_from_profile, pearson_correlation};
pub use templates::{KeyTemplates, ToneTemplate};

use crate::analysis::confidence::correlation_to_confidence;
use crate::analysis::result::{Key, KeyEstimate};

/// Number of ranked candidates kept in [`KeyDetectionResult::top_keys`]
pub const TOP_KEYS: usize = 3;

/// Key detection result
#[derive(Debug, Clone)]
pub struct KeyDetectionResult {
    /// Detected key (best match)
    pub key: Key,

    /// Pearson correlation of the best match
    pub correlation: f32,

    /// Confidence score (0.0-1.0)
    pub confidence: f32,

    /// All 24 keys with correlations, highest first
    pub all_scores: Vec<(Key, f32)>,

    /// Top keys with correlations (default: top 3)
    pub top_keys: Vec<(Key, f32)>,

    /// True if the profile had no variance and `key` is the fallback
    pub flat_profile: bool,
}

impl KeyDetectionResult {
    /// Label and confidence as reported to callers
    pub fn estimate(&self) -> KeyEstimate {
        KeyEstimate {
            label: self.key.name(),
            confidence: self.confidence,
        }
    }

    fn from_ranking(all_scores: Vec<(Key, f32)>, best_correlation: f64) -> Self {
        let (key, correlation) = all_scores[0];
        Self {
            key,
            correlation,
            confidence: correlation_to_confidence(best_correlation),
            top_keys: all_scores.iter().take(TOP_KEYS).copied().collect(),
            all_scores,
            flat_profile: false,
        }
    }
}
