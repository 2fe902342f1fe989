//! Size-based admission control

use crate::error::{AudioError, Result, ValidationError};
use std::path::Path;

/// Rejects inputs whose byte size exceeds a ceiling
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    max_bytes: u64,
}

impl AdmissionPolicy {
    /// Create a policy with the given ceiling in bytes
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Configured ceiling in bytes
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check a size reported by the caller or the filesystem
    pub fn check_size(&self, size: u64) -> std::result::Result<(), ValidationError> {
        if size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Stat `path` and admit it if it is within the ceiling
    ///
    /// Only file metadata is read, so this is safe to run before decoding.
    ///
    /// # Returns
    ///
    /// File size in bytes
    pub fn admit_file(&self, path: &Path) -> Result<u64> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            AudioError::StorageError(format!("cannot stat {}: {}", path.display(), e))
        })?;
        let size = metadata.len();
        self.check_size(size).map_err(|e| {
            log::info!("Rejected {}: {}", path.display(), e);
            AudioError::from(e)
        })?;
        log::debug!("Admitted {} ({} bytes)", path.display(), size);
        Ok(size)
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::new(50 * 1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_is_inclusive() {
        let policy = AdmissionPolicy::new(100);
        assert!(policy.check_size(100).is_ok());
        assert_eq!(
            policy.check_size(101),
            Err(ValidationError::TooLarge {
                size: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn test_admit_file_uses_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.wav");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        assert_eq!(AdmissionPolicy::new(64).admit_file(&path).unwrap(), 64);
        let err = AdmissionPolicy::new(63).admit_file(&path).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_missing_file_is_not_a_client_error() {
        let err = AdmissionPolicy::default()
            .admit_file(Path::new("/nonexistent/input.wav"))
            .unwrap_err();
        assert!(matches!(err, AudioError::StorageError(_)));
    }
}
