//! Transient artifact storage
//!
//! Uploaded inputs and encoded outputs live as uniquely named files in a
//! single directory. Request code removes them when it is done; the
//! retention sweep catches whatever it missed.

use crate::error::{AudioError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

/// Directory holding transient artifacts
#[derive(Debug, Clone)]
pub struct TransientStore {
    dir: PathBuf,
}

impl TransientStore {
    /// Use `dir` as transient storage, creating it if needed
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AudioError::StorageError(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh, unused path with the given extension
    pub fn allocate_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", Uuid::new_v4(), extension))
    }

    /// Write `bytes` to a new artifact
    pub fn write(&self, extension: &str, bytes: &[u8]) -> Result<TransientArtifact> {
        let path = self.allocate_path(extension);
        std::fs::write(&path, bytes).map_err(|e| {
            AudioError::StorageError(format!("cannot write {}: {}", path.display(), e))
        })?;
        log::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(TransientArtifact {
            path,
            created_at: SystemTime::now(),
            size: bytes.len() as u64,
        })
    }
}

/// A named blob in transient storage
#[derive(Debug, Clone)]
pub struct TransientArtifact {
    path: PathBuf,
    created_at: SystemTime,
    size: u64,
}

impl TransientArtifact {
    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the artifact was written
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Size in bytes at creation
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the artifact back
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            AudioError::StorageError(format!("cannot read {}: {}", self.path.display(), e))
        })
    }

    /// Delete the artifact, best effort
    ///
    /// A file already removed by the sweep is fine; other failures are logged
    /// and left for the sweep.
    pub fn remove(self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
