//! Analysis result types

use super::metadata::AnalysisMetadata;
use crate::features::chroma::PITCH_CLASSES;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Musical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Major key (0 = C, 1 = C#, ..., 11 = B)
    Major(u32),
    /// Minor key (0 = C, 1 = C#, ..., 11 = B)
    Minor(u32),
}

impl Key {
    /// All 24 keys in ranking order: majors C..B, then minors C..B
    pub fn all() -> impl Iterator<Item = Key> {
        (0..12).map(Key::Major).chain((0..12).map(Key::Minor))
    }

    /// Root pitch class (0 = C)
    pub fn root(&self) -> u32 {
        match self {
            Key::Major(i) | Key::Minor(i) => *i % 12,
        }
    }

    /// True for minor keys
    pub fn is_minor(&self) -> bool {
        matches!(self, Key::Minor(_))
    }

    /// Get key name in musical notation (e.g., "C", "Am", "F#", "D#m")
    ///
    /// # Example
    ///
    /// ```
    /// use keyshift::analysis::result::Key;
    ///
    /// assert_eq!(Key::Major(0).name(), "C");
    /// assert_eq!(Key::Major(6).name(), "F#");
    /// assert_eq!(Key::Minor(9).name(), "Am");
    /// ```
    pub fn name(&self) -> String {
        let root = PITCH_CLASSES[self.root() as usize];
        if self.is_minor() {
            format!("{}m", root)
        } else {
            root.to_string()
        }
    }

    /// Parse a key name produced by [`name`](Self::name)
    pub fn from_name(name: &str) -> Option<Self> {
        let (root, minor) = match name.strip_suffix('m') {
            Some(root) => (root, true),
            None => (name, false),
        };
        let idx = PITCH_CLASSES.iter().position(|&p| p == root)? as u32;
        Some(if minor { Key::Minor(idx) } else { Key::Major(idx) })
    }

    /// The same mode with the root moved by `semitones`
    pub fn transposed(&self, semitones: i32) -> Key {
        let root = (self.root() as i32 + semitones).rem_euclid(12) as u32;
        match self {
            Key::Major(_) => Key::Major(root),
            Key::Minor(_) => Key::Minor(root),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Reported key: label plus confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Root pitch class with an `m` suffix for minor keys
    #[serde(rename = "key")]
    pub label: String,

    /// Confidence, rounded to two decimal places
    pub confidence: f32,
}

/// Analysis flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisFlag {
    /// Best template correlation is low (atonal or ambiguous)
    WeakTonality,
    /// Mean chroma profile had no variance; the key is a fallback
    FlatProfile,
    /// Only the leading window of the input was analysed
    Truncated,
}

/// Complete analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Detected key
    pub key: Key,

    /// Key confidence (0.0-1.0)
    pub confidence: f32,

    /// Pearson correlation of the best template
    pub correlation: f32,

    /// Best three keys with their correlations, highest first
    pub top_keys: Vec<(Key, f32)>,

    /// Analysis metadata
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Label and confidence as reported to callers
    pub fn estimate(&self) -> KeyEstimate {
        KeyEstimate {
            label: self.key.name(),
            confidence: self.confidence,
        }
    }
}
