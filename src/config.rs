//! Configuration parameters for analysis, transposition and the service

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Key analysis configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Leading portion of the input that is analysed, in seconds (default: 30.0)
    pub max_duration_secs: f32,

    // STFT parameters
    /// Frame size for the chroma STFT (default: 8192)
    /// Large frames keep adjacent semitones apart below ~200 Hz
    pub frame_size: usize,

    /// Hop size for the chroma STFT (default: 2048)
    pub hop_size: usize,

    // Chroma folding
    /// Lowest frequency folded into the chromagram (default: 65.41 Hz, C2)
    pub min_frequency: f32,

    /// Highest frequency folded into the chromagram (default: 4186.0 Hz, C8)
    pub max_frequency: f32,

    /// Reference tuning for A4 (default: 440.0 Hz)
    pub center_frequency: f32,

    /// Chroma sharpening power (default: 1.0 = no sharpening)
    /// Power > 1.0 emphasizes prominent semitones
    pub chroma_sharpening_power: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 30.0,
            frame_size: 8192,
            hop_size: 2048,
            min_frequency: 65.41,
            max_frequency: 4186.0,
            center_frequency: 440.0,
            chroma_sharpening_power: 1.0,
        }
    }
}

/// Transposition configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransposeConfig {
    /// Leading portion of the input that is transposed, in seconds (default: 300.0)
    pub max_duration_secs: f32,

    /// Phase vocoder FFT size (default: 2048)
    pub fft_size: usize,

    /// Phase vocoder hop size (default: 512)
    pub hop_size: usize,

    /// Largest accepted shift in either direction, in semitones (default: 24)
    pub max_shift_semitones: i32,
}

impl Default for TransposeConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 300.0,
            fft_size: 2048,
            hop_size: 512,
            max_shift_semitones: 24,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding uploaded and derived artifacts
    pub temp_dir: PathBuf,

    /// Largest accepted upload in bytes (default: 50 MiB)
    pub max_upload_bytes: u64,

    /// Artifacts older than this are swept, in seconds (default: 600)
    pub retention_secs: u64,

    /// Interval between retention sweeps, in seconds (default: 300)
    pub sweep_interval_secs: u64,

    /// Accepted upload extensions, lower case (default: mp3, wav)
    pub allowed_extensions: Vec<String>,

    /// Address the request server binds to
    pub listen_addr: String,

    /// Key analysis parameters
    pub analysis: AnalysisConfig,

    /// Transposition parameters
    pub transpose: TransposeConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("keyshift"),
            max_upload_bytes: 50 * 1024 * 1024,
            retention_secs: 10 * 60,
            sweep_interval_secs: 5 * 60,
            allowed_extensions: vec!["mp3".to_string(), "wav".to_string()],
            listen_addr: "127.0.0.1:8000".to_string(),
            analysis: AnalysisConfig::default(),
            transpose: TransposeConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Retention window as a `Duration`
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Sweep interval as a `Duration`
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Check parameters that would otherwise fail deep inside DSP code
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.frame_size == 0 || a.hop_size == 0 || a.hop_size > a.frame_size {
            return Err(AudioError::ConfigError(format!(
                "invalid chroma frame/hop: {}/{}",
                a.frame_size, a.hop_size
            )));
        }
        if a.min_frequency <= 0.0 || a.max_frequency <= a.min_frequency {
            return Err(AudioError::ConfigError(format!(
                "invalid chroma frequency range: {}..{}",
                a.min_frequency, a.max_frequency
            )));
        }
        let t = &self.transpose;
        if t.fft_size < 4 || t.hop_size == 0 || t.hop_size > t.fft_size / 2 {
            return Err(AudioError::ConfigError(format!(
                "invalid phase vocoder fft/hop: {}/{}",
                t.fft_size, t.hop_size
            )));
        }
        if self.allowed_extensions.is_empty() {
            return Err(AudioError::ConfigError(
                "allowed_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a service configuration from a JSON file
///
/// Missing fields fall back to their defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        AudioError::StorageError(format!("failed to read config {}: {}", path.display(), e))
    })?;
    let config: ServiceConfig = serde_json::from_str(&text).map_err(|e| {
        AudioError::ConfigError(format!("failed to parse config {}: {}", path.display(), e))
    })?;
    config.validate()?;
    Ok(config)
}
