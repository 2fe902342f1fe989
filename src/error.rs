//! Error types for key analysis and transposition
//!
//! Every pipeline stage returns an explicitly tagged variant. The kind of a
//! failure is never inferred from its message text; callers map
//! [`AudioError::kind`] through [`ErrorKind::user_message`] instead.

use std::fmt;

/// Input rejected before any decode or DSP work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// File extension not in the allow-list
    UnsupportedExtension(String),

    /// Requested output format not in the allow-list
    UnsupportedFormat(String),

    /// Input larger than the configured ceiling
    TooLarge {
        /// Input size in bytes
        size: u64,
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// Semitone shift outside the supported range
    InvalidShift(i32),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnsupportedExtension(ext) => {
                write!(f, "unsupported file extension '{}'", ext)
            }
            ValidationError::UnsupportedFormat(format) => {
                write!(f, "unsupported output format '{}'", format)
            }
            ValidationError::TooLarge { size, limit } => {
                write!(f, "input is {} bytes, limit is {} bytes", size, limit)
            }
            ValidationError::InvalidShift(shift) => {
                write!(f, "semitone shift {} is out of range", shift)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors that can occur while analysing or transposing audio
#[derive(Debug, Clone)]
pub enum AudioError {
    /// Input rejected by validation or admission
    Validation(ValidationError),

    /// Input bytes could not be interpreted as audio
    DecodingError(String),

    /// Allocation failed while decoding or transforming
    ResourceExhausted(String),

    /// Pitch-shift stage failed for a reason other than decode or memory
    TransformError(String),

    /// Output serialization failed
    EncodingError(String),

    /// Key estimation failed
    AnalysisError(String),

    /// Work was interrupted before it produced a result
    Interrupted(String),

    /// Transient storage could not be read or written
    StorageError(String),

    /// Configuration parameters are inconsistent
    ConfigError(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Validation(err) => write!(f, "Invalid input: {}", err),
            AudioError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            AudioError::ResourceExhausted(msg) => write!(f, "Out of memory: {}", msg),
            AudioError::TransformError(msg) => write!(f, "Transform error: {}", msg),
            AudioError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            AudioError::AnalysisError(msg) => write!(f, "Analysis error: {}", msg),
            AudioError::Interrupted(msg) => write!(f, "Interrupted: {}", msg),
            AudioError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AudioError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

impl From<ValidationError> for AudioError {
    fn from(err: ValidationError) -> Self {
        AudioError::Validation(err)
    }
}

/// Coarse classification used for caller-facing reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Disallowed extension, format, size or shift
    Validation,
    /// Corrupt or unsupported audio
    Decode,
    /// Memory exhaustion
    Resource,
    /// Pitch-shift failure
    Transform,
    /// Output serialization failure
    Encode,
    /// Key estimation failure
    Analysis,
    /// Terminated mid-operation
    Timeout,
    /// Internal storage failure
    Internal,
}

impl ErrorKind {
    /// Stable identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Decode => "decode",
            ErrorKind::Resource => "resource",
            ErrorKind::Transform => "transform",
            ErrorKind::Encode => "encode",
            ErrorKind::Analysis => "analysis",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }

    /// Message shown to the caller for this kind of failure
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Validation => {
                "Unsupported request. Only mp3 or wav files within the size limit are accepted."
            }
            ErrorKind::Decode => {
                "The audio file could not be read. It may be corrupt or use an unsupported encoding."
            }
            ErrorKind::Resource => {
                "Ran out of memory while processing. Please try a shorter or smaller file."
            }
            ErrorKind::Transform => {
                "Pitch shifting failed for this file. Please try a different audio file."
            }
            ErrorKind::Encode => "Failed to write the output file. Please try again.",
            ErrorKind::Analysis => "Key analysis failed. Please try again.",
            ErrorKind::Timeout => "Processing took too long. Please try a shorter file.",
            ErrorKind::Internal => "An internal error occurred. Please try again.",
        }
    }
}

impl AudioError {
    /// Classification tag of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AudioError::Validation(_) => ErrorKind::Validation,
            AudioError::DecodingError(_) => ErrorKind::Decode,
            AudioError::ResourceExhausted(_) => ErrorKind::Resource,
            AudioError::TransformError(_) => ErrorKind::Transform,
            AudioError::EncodingError(_) => ErrorKind::Encode,
            AudioError::AnalysisError(_) => ErrorKind::Analysis,
            AudioError::Interrupted(_) => ErrorKind::Timeout,
            AudioError::StorageError(_) | AudioError::ConfigError(_) => ErrorKind::Internal,
        }
    }

    /// True when the caller sent something we refuse to process
    pub fn is_client_error(&self) -> bool {
        matches!(self, AudioError::Validation(_))
    }

    /// Caller-facing message, including the validation detail where there is one
    pub fn user_message(&self) -> String {
        match self {
            AudioError::Validation(err) => format!("{} ({})", self.kind().user_message(), err),
            _ => self.kind().user_message().to_string(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, AudioError>;
