//! The processing pipeline shared by analysis and transposition
//!
//! Every request runs the same stages in order:
//!
//! ```text
//! admission (stat) → decode → leading window → core stage → [encode]
//! ```
//!
//! The core stage is a [`Stage`] value: [`KeyAnalysis`] or [`Transposition`].
//! The pipeline is generic over its decoder so a test can prove admission runs
//! before any decode is attempted.

use crate::analysis::confidence::is_weak_tonality;
use crate::analysis::{AnalysisFlag, AnalysisMetadata, AnalysisResult};
use crate::config::{AnalysisConfig, ServiceConfig, TransposeConfig};
use crate::error::{Result, ValidationError};
use crate::features::chroma::extract_chroma;
use crate::features::key::{detect_key, KeyDetectionResult, KeyTemplates};
use crate::governor::{AdmissionPolicy, TransientArtifact, TransientStore};
use crate::io::encoder::{encode, encode_to_artifact};
use crate::io::{AudioBuffer, Decode, OutputFormat, SymphoniaDecoder};
use crate::preprocessing::channel_mixer::mix_to_mono;
use crate::preprocessing::window::leading_window;
use std::path::Path;
use std::time::Instant;

/// Core work applied to the bounded window of a decoded input
pub trait Stage {
    /// Stage result
    type Output;

    /// Leading portion of the input this stage sees, in seconds
    fn max_duration_secs(&self) -> f32;

    /// Run the stage on the windowed buffer
    fn process(&self, window: &AudioBuffer) -> Result<Self::Output>;
}

/// Key estimation stage
#[derive(Debug, Clone)]
pub struct KeyAnalysis<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> KeyAnalysis<'a> {
    /// Stage using `config`
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }
}

impl Stage for KeyAnalysis<'_> {
    type Output = (KeyDetectionResult, usize);

    fn max_duration_secs(&self) -> f32 {
        self.config.max_duration_secs
    }

    fn process(&self, window: &AudioBuffer) -> Result<Self::Output> {
        let mono = mix_to_mono(window);
        let chromagram = extract_chroma(&mono, window.sample_rate(), self.config)?;
        let detection = detect_key(&chromagram, KeyTemplates::standard())?;
        Ok((detection, chromagram.frame_count()))
    }
}

/// Pitch transposition stage
#[derive(Debug, Clone)]
pub struct Transposition<'a> {
    semitones: i32,
    config: &'a TransposeConfig,
}

impl<'a> Transposition<'a> {
    /// Stage shifting by `semitones` with `config`
    pub fn new(semitones: i32, config: &'a TransposeConfig) -> Self {
        Self { semitones, config }
    }
}

impl Stage for Transposition<'_> {
    type Output = AudioBuffer;

    fn max_duration_secs(&self) -> f32 {
        self.config.max_duration_secs
    }

    fn process(&self, window: &AudioBuffer) -> Result<AudioBuffer> {
        crate::transform::transpose(window, self.semitones, self.config)
    }
}

/// Output of [`Pipeline::run`]
#[derive(Debug, Clone)]
pub struct StageRun<T> {
    /// Stage result
    pub output: T,
    /// Duration of the decoded input in seconds
    pub source_secs: f32,
    /// Duration of the window the stage saw in seconds
    pub window_secs: f32,
    /// True if the stage saw less than the whole input
    pub truncated: bool,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Wall time spent decoding and processing
    pub elapsed_ms: f32,
}

/// Encoded transposition result
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    /// Encoded stream
    pub bytes: Vec<u8>,
    /// Container/codec of `bytes`
    pub format: OutputFormat,
    /// Frames per channel of the transposed signal
    pub frames: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Admission, decode, windowing and encode around a [`Stage`]
#[derive(Debug, Clone)]
pub struct Pipeline<D: Decode = SymphoniaDecoder> {
    decoder: D,
    admission: AdmissionPolicy,
    analysis: AnalysisConfig,
    transpose: TransposeConfig,
}

impl Pipeline<SymphoniaDecoder> {
    /// Pipeline with the default decoder
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_decoder(SymphoniaDecoder, config)
    }
}

impl<D: Decode> Pipeline<D> {
    /// Pipeline with a caller-supplied decoder
    pub fn with_decoder(decoder: D, config: &ServiceConfig) -> Self {
        Self {
            decoder,
            admission: AdmissionPolicy::new(config.max_upload_bytes),
            analysis: config.analysis.clone(),
            transpose: config.transpose.clone(),
        }
    }

    /// Admission policy applied before decoding
    pub fn admission(&self) -> &AdmissionPolicy {
        &self.admission
    }

    /// Run `stage` on the file at `path`
    ///
    /// # Errors
    ///
    /// - `AudioError::Validation(TooLarge)` before anything is decoded
    /// - `AudioError::DecodingError` / `AudioError::ResourceExhausted` from
    ///   the decoder
    /// - whatever the stage returns
    pub fn run<S: Stage>(&self, path: &Path, stage: &S) -> Result<StageRun<S::Output>> {
        let start = Instant::now();
        self.admission.admit_file(path)?;

        let max_secs = stage.max_duration_secs();
        let decoded = self.decoder.decode_file(path, Some(max_secs))?;
        let source_secs = decoded.source_secs;
        // A decoder may return more than it was asked for
        let window = leading_window(&decoded.buffer, max_secs);
        let truncated = decoded.truncated || window.frames() < decoded.buffer.frames();
        drop(decoded);

        let output = stage.process(&window)?;
        let elapsed_ms = start.elapsed().as_secs_f32() * 1000.0;
        log::debug!(
            "Stage finished in {:.1} ms ({:.2}s of {:.2}s)",
            elapsed_ms,
            window.duration_secs(),
            source_secs
        );

        Ok(StageRun {
            output,
            source_secs,
            window_secs: window.duration_secs(),
            truncated,
            sample_rate: window.sample_rate(),
            elapsed_ms,
        })
    }

    /// Estimate the key of the file at `path`
    pub fn analyze(&self, path: &Path) -> Result<AnalysisResult> {
        let run = self.run(path, &KeyAnalysis::new(&self.analysis))?;
        let truncated = run.truncated;
        let (detection, chroma_frames) = run.output;

        let mut flags = Vec::new();
        if detection.flat_profile {
            flags.push(AnalysisFlag::FlatProfile);
        } else if is_weak_tonality(detection.correlation as f64) {
            flags.push(AnalysisFlag::WeakTonality);
        }
        if truncated {
            flags.push(AnalysisFlag::Truncated);
        }

        log::info!(
            "Detected key {} (confidence {:.2}) in {}",
            detection.key,
            detection.confidence,
            path.display()
        );

        Ok(AnalysisResult {
            key: detection.key,
            confidence: detection.confidence,
            correlation: detection.correlation,
            top_keys: detection.top_keys,
            metadata: AnalysisMetadata {
                duration_seconds: run.source_secs,
                analyzed_seconds: run.window_secs,
                sample_rate: run.sample_rate,
                chroma_frames,
                processing_time_ms: run.elapsed_ms,
                flags,
                ..AnalysisMetadata::default()
            },
        })
    }

    /// Transpose the file at `path` and return the decoded result
    pub fn transpose_buffer(&self, path: &Path, semitones: i32) -> Result<StageRun<AudioBuffer>> {
        self.check_shift(semitones)?;
        self.run(path, &Transposition::new(semitones, &self.transpose))
    }

    /// Transpose the file at `path` and encode the result
    pub fn transpose(&self, path: &Path, semitones: i32, format: OutputFormat) -> Result<EncodedAudio> {
        let run = self.transpose_buffer(path, semitones)?;
        let bytes = encode(&run.output, format)?;
        log::info!(
            "Transposed {} by {} semitones to {} ({} bytes)",
            path.display(),
            semitones,
            format,
            bytes.len()
        );
        Ok(EncodedAudio {
            bytes,
            format,
            frames: run.output.frames(),
            sample_rate: run.output.sample_rate(),
        })
    }

    /// Transpose the file at `path` and write the encoded result to `store`
    ///
    /// The caller owns the returned artifact.
    pub fn transpose_to_artifact(
        &self,
        path: &Path,
        semitones: i32,
        format: OutputFormat,
        store: &TransientStore,
    ) -> Result<TransientArtifact> {
        let run = self.transpose_buffer(path, semitones)?;
        let artifact = encode_to_artifact(&run.output, format, store)?;
        log::info!(
            "Transposed {} by {} semitones into {}",
            path.display(),
            semitones,
            artifact.path().display()
        );
        Ok(artifact)
    }

    /// Reject shifts outside the configured bound
    pub fn check_shift(&self, semitones: i32) -> std::result::Result<(), ValidationError> {
        if semitones.unsigned_abs() > self.transpose.max_shift_semitones.unsigned_abs() {
            return Err(ValidationError::InvalidShift(semitones));
        }
        Ok(())
    }
}
