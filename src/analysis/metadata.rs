//! Analysis metadata structures

use super::result::AnalysisFlag;
use serde::{Deserialize, Serialize};

/// Analysis metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Duration of the decoded input in seconds
    pub duration_seconds: f32,

    /// Duration of the leading window that was analysed, in seconds
    pub analyzed_seconds: f32,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of chroma frames
    pub chroma_frames: usize,

    /// Processing time in milliseconds
    pub processing_time_ms: f32,

    /// Algorithm version
    pub algorithm_version: String,

    /// Analysis flags
    pub flags: Vec<AnalysisFlag>,
}

impl Default for AnalysisMetadata {
    fn default() -> Self {
        Self {
            duration_seconds: 0.0,
            analyzed_seconds: 0.0,
            sample_rate: 0,
            chroma_frames: 0,
            processing_time_ms: 0.0,
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
            flags: vec![],
        }
    }
}
