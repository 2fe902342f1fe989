//! Request-level operations: analyze and transpose an uploaded file
//!
//! A request goes through:
//! 1. extension / output-format / shift validation (no I/O)
//! 2. declared-size admission, then ingestion into transient storage
//! 3. the [`Pipeline`]
//! 4. request-scoped cleanup of the uploaded input
//!
//! Transposition output stays in transient storage until the caller has sent
//! it and calls [`Download::complete`]. Anything left behind is reclaimed by
//! the retention sweep started with [`KeyService::start_retention`].

use crate::analysis::KeyEstimate;
use crate::config::ServiceConfig;
use crate::error::{Result, ValidationError};
use crate::governor::{RetentionSweeper, SweepHandle, TransientArtifact, TransientStore};
use crate::io::{Decode, OutputFormat, SymphoniaDecoder};
use crate::pipeline::Pipeline;

/// Lower-cased text after the last dot of `filename`
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Text before the last dot of `filename`, or all of it
pub fn file_stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

/// Check `filename` against the extension allow-list
///
/// # Returns
///
/// The lower-cased extension
pub fn validate_extension(
    filename: &str,
    allowed: &[String],
) -> std::result::Result<String, ValidationError> {
    match file_extension(filename) {
        Some(ext) if allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => Ok(ext),
        Some(ext) => Err(ValidationError::UnsupportedExtension(ext)),
        None => Err(ValidationError::UnsupportedExtension(String::new())),
    }
}

/// Parse the requested output format; absent means mp3
pub fn parse_output_format(
    format: Option<&str>,
) -> std::result::Result<OutputFormat, ValidationError> {
    match format {
        None => Ok(OutputFormat::default()),
        Some(tag) => tag.parse(),
    }
}

/// Download filename: `<stem>_shifted_<shift>.<format>`
pub fn download_name(filename: &str, semitones: i32, format: OutputFormat) -> String {
    format!(
        "{}_shifted_{}.{}",
        file_stem(filename),
        semitones,
        format.extension()
    )
}

/// Removes an artifact when dropped, on success and error paths alike
#[derive(Debug)]
struct CleanupGuard(TransientArtifact);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.0.clone().remove();
    }
}

/// A transposed file ready to be sent
#[derive(Debug)]
pub struct Download {
    filename: String,
    format: OutputFormat,
    artifact: TransientArtifact,
}

impl Download {
    /// Suggested filename for the client
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// MIME type of the encoded stream
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Encoded size in bytes
    pub fn size(&self) -> u64 {
        self.artifact.size()
    }

    /// Stored artifact
    pub fn artifact(&self) -> &TransientArtifact {
        &self.artifact
    }

    /// Read the encoded bytes
    pub fn read(&self) -> Result<Vec<u8>> {
        self.artifact.read()
    }

    /// Delete the stored output once it has been sent
    pub fn complete(self) {
        self.artifact.remove();
    }
}

/// Analyze/transpose operations over uploaded bytes
#[derive(Debug)]
pub struct KeyService<D: Decode = SymphoniaDecoder> {
    config: ServiceConfig,
    store: TransientStore,
    pipeline: Pipeline<D>,
}

impl KeyService<SymphoniaDecoder> {
    /// Service with the default decoder
    ///
    /// Creates the transient directory if needed.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        Self::with_decoder(SymphoniaDecoder, config)
    }
}

impl<D: Decode> KeyService<D> {
    /// Service with a caller-supplied decoder
    pub fn with_decoder(decoder: D, config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let store = TransientStore::open(&config.temp_dir)?;
        log::info!("Transient storage at {}", store.dir().display());
        let pipeline = Pipeline::with_decoder(decoder, &config);
        Ok(Self {
            config,
            store,
            pipeline,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Transient storage
    pub fn store(&self) -> &TransientStore {
        &self.store
    }

    /// Reject a declared upload size over the ceiling
    pub fn check_declared_size(&self, size: u64) -> std::result::Result<(), ValidationError> {
        self.pipeline.admission().check_size(size)
    }

    /// Start the periodic retention sweep of the transient directory
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_retention(&self) -> SweepHandle {
        RetentionSweeper::new(
            self.store.dir(),
            self.config.retention(),
            self.config.sweep_interval(),
        )
        .start()
    }

    /// Validate `filename` and store `bytes` as a new input artifact
    fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<CleanupGuard> {
        let ext = validate_extension(filename, &self.config.allowed_extensions)?;
        self.check_declared_size(bytes.len() as u64)?;
        let artifact = self.store.write(&ext, bytes)?;
        log::debug!("Stored upload {} as {}", filename, artifact.path().display());
        Ok(CleanupGuard(artifact))
    }

    /// Estimate the key of an uploaded file
    ///
    /// # Errors
    ///
    /// Validation errors for a disallowed extension or oversize input, then
    /// any decode or analysis failure.
    pub fn analyze(&self, filename: &str, bytes: &[u8]) -> Result<KeyEstimate> {
        log::info!("Analyze request: {} ({} bytes)", filename, bytes.len());
        let input = self.ingest(filename, bytes)?;
        let result = self.pipeline.analyze(input.0.path())?;
        Ok(result.estimate())
    }

    /// Transpose an uploaded file
    ///
    /// `format` defaults to mp3. The returned [`Download`] owns the encoded
    /// output; call [`Download::complete`] once it has been sent.
    pub fn transpose(
        &self,
        filename: &str,
        bytes: &[u8],
        semitones: i32,
        format: Option<&str>,
    ) -> Result<Download> {
        log::info!(
            "Transpose request: {} ({} bytes) by {} semitones to {}",
            filename,
            bytes.len(),
            semitones,
            format.unwrap_or("mp3")
        );
        let format = parse_output_format(format)?;
        self.pipeline.check_shift(semitones)?;

        let input = self.ingest(filename, bytes)?;
        let output =
            self.pipeline
                .transpose_to_artifact(input.0.path(), semitones, format, &self.store)?;

        Ok(Download {
            filename: download_name(filename, semitones, format),
            format,
            artifact: output,
        })
    }
}
