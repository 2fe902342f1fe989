//! # Keyshift
//!
//! Musical key estimation and tempo-preserving transposition for uploaded
//! audio files.
//!
//! ## Features
//!
//! - **Key Detection**: Chroma-based analysis with Krumhansl-Kessler template matching
//! - **Transposition**: Phase-vocoder pitch shifting by whole semitones, length preserved
//! - **Resource Governance**: Upload size ceiling, duration caps and timed cleanup of
//!   transient files
//! - **Server**: Line-delimited JSON over TCP with raw file bodies
//!
//! ## Quick Start
//!
//! ```no_run
//! use keyshift::{KeyService, ServiceConfig};
//!
//! let service = KeyService::new(ServiceConfig::default())?;
//! let bytes = std::fs::read("song.mp3")?;
//!
//! let estimate = service.analyze("song.mp3", &bytes)?;
//! println!("Key: {} (confidence: {:.2})", estimate.label, estimate.confidence);
//!
//! let download = service.transpose("song.mp3", &bytes, -3, Some("wav"))?;
//! std::fs::write(download.filename(), download.read()?)?;
//! download.complete();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Upload → Validation → Transient Storage → Decode → Leading Window → Stage → Encode
//!                                                                      │
//!                                            chroma + key templates ───┤
//!                                            phase vocoder + resample ─┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod governor;
pub mod io;
pub mod pipeline;
pub mod preprocessing;
pub mod server;
pub mod service;
pub mod transform;

// Re-export main types
pub use analysis::{AnalysisMetadata, AnalysisResult, Key, KeyEstimate};
pub use config::{AnalysisConfig, ServiceConfig, TransposeConfig};
pub use error::{AudioError, Result, ValidationError};
pub use io::{AudioBuffer, OutputFormat};
pub use pipeline::Pipeline;
pub use service::{Download, KeyService};

/// Estimate the key of in-memory mono samples
///
/// Runs chroma extraction and template matching on the whole signal; callers
/// that want the duration cap should apply
/// [`preprocessing::window::leading_window`] first.
///
/// # Errors
///
/// Returns `AudioError::AnalysisError` if the signal is too short to yield a
/// chroma frame or the configured frequency range is invalid.
///
/// # Example
///
/// ```no_run
/// use keyshift::{estimate_key, AnalysisConfig};
///
/// let samples = vec![0.0f32; 44100 * 30];
/// let estimate = estimate_key(&samples, 44100, &AnalysisConfig::default())?;
/// # Ok::<(), keyshift::AudioError>(())
/// ```
pub fn estimate_key(samples: &[f32], sample_rate: u32, config: &AnalysisConfig) -> Result<KeyEstimate> {
    let chromagram = features::chroma::extract_chroma(samples, sample_rate, config)?;
    let result = features::key::detect_key(&chromagram, features::key::KeyTemplates::standard())?;
    Ok(result.estimate())
}
