//! Conversion of word-processor documents to PDF.

use crate::error::ConversionError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Turns a foreign document into a PDF at `dest`. Blocking and possibly slow.
pub trait Converter: Send + Sync {
    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError>;
}

/// LibreOffice running headless.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    program: PathBuf,
}

impl SofficeConverter {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        SofficeConverter {
            program: program.into(),
        }
    }
}

impl Converter for SofficeConverter {
    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        // soffice names its output after the input; convert into a private
        // directory next to `dest` and move the result into place.
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let outdir = tempfile::Builder::new()
            .prefix("printdrop-convert-")
            .tempdir_in(parent)?;

        debug!(source = %source.display(), "running {}", self.program.display());
        let output = Command::new(&self.program)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(outdir.path())
            .arg(source)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    ConversionError::Unavailable {
                        program: self.program.display().to_string(),
                        source: e,
                    }
                }
                _ => ConversionError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::Failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let mut name = source.file_stem().unwrap_or(source.as_os_str()).to_os_string();
        name.push(".pdf");
        let produced = outdir.path().join(name);
        if !produced.is_file() {
            return Err(ConversionError::MissingOutput(produced));
        }

        std::fs::rename(&produced, dest)?;
        info!(source = %source.display(), dest = %dest.display(), "converted to PDF");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fixed PDF for every conversion, or fails when `pdf` is `None`.
    #[derive(Default)]
    pub(crate) struct FakeConverter {
        pub pdf: Option<Vec<u8>>,
        pub calls: AtomicUsize,
    }

    impl FakeConverter {
        pub fn producing(pdf: Vec<u8>) -> Self {
            FakeConverter {
                pdf: Some(pdf),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Converter for FakeConverter {
        fn convert(&self, _source: &Path, dest: &Path) -> Result<(), ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.pdf {
                Some(bytes) => Ok(std::fs::write(dest, bytes)?),
                None => Err(ConversionError::Failed("fake converter refused".to_string())),
            }
        }
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("letter.docx");
        std::fs::write(&source, b"PK").unwrap();

        let converter = SofficeConverter::new("/nonexistent/soffice");
        let err = converter
            .convert(&source, &dir.path().join("letter.pdf"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Unavailable { .. }));
        // Only the source remains; the private output directory is gone.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("letter.docx");
        std::fs::write(&source, b"PK").unwrap();

        let converter = SofficeConverter::new("false");
        let err = converter
            .convert(&source, &dir.path().join("letter.pdf"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Failed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_program_is_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("letter.docx");
        std::fs::write(&source, b"PK").unwrap();

        let converter = SofficeConverter::new("true");
        let err = converter
            .convert(&source, &dir.path().join("letter.pdf"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::MissingOutput(_)));
    }
}
