//! Temporary on-disk copies of incoming PDFs.
//!
//! Converters take a file path, so uploaded bytes are written to a
//! `NamedTempFile` with a `.pdf` suffix first. The file is deleted when the
//! [`StagedFile`] is dropped, which covers the success path, early returns
//! through `?`, and unwinding.

use crate::error::ServiceError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A PDF written to a temporary file, removed on drop.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
}

impl StagedFile {
    /// Write `bytes` to a new temp file in `dir` (or the system temp dir).
    pub fn write(bytes: &[u8], dir: Option<&Path>) -> Result<Self, ServiceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdf2md-").suffix(".pdf");

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ServiceError::Staging)?;

        file.write_all(bytes).map_err(ServiceError::Staging)?;
        file.flush().map_err(ServiceError::Staging)?;

        debug!("Staged {} bytes at {}", bytes.len(), file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, reporting (but not failing on) I/O errors.
    pub fn remove(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("Failed to remove staged file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_file_has_pdf_suffix_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::write(b"%PDF-1.4 test", Some(dir.path())).unwrap();

        assert_eq!(staged.path().extension().and_then(|e| e.to_str()), Some("pdf"));
        assert!(staged.path().starts_with(dir.path()));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"%PDF-1.4 test");
    }

    #[test]
    fn dropping_removes_the_file() {
        let staged = StagedFile::write(b"%PDF", None).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn remove_deletes_immediately() {
        let staged = StagedFile::write(b"%PDF", None).unwrap();
        let path = staged.path().to_path_buf();

        staged.remove();
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_a_staging_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = StagedFile::write(b"%PDF", Some(&missing)).unwrap_err();
        assert!(matches!(err, ServiceError::Staging(_)));
    }
}
