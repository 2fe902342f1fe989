//! Analysis result modules
//!
//! - Key and estimate types
//! - Correlation-to-confidence scoring
//! - Metadata

pub mod confidence;
pub mod metadata;
pub mod result;

pub use confidence::correlation_to_confidence;
pub use metadata::AnalysisMetadata;
pub use result::{AnalysisFlag, AnalysisResult, Key, KeyEstimate};
