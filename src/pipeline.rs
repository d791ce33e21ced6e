//! The page-selection-and-print pipeline.
//!
//! parse → (docx) convert → validate → extract → submit. Every scratch artifact
//! is owned by a [`DocumentHandle`] or a [`TempPath`], so all of them are gone
//! when [`PrintPipeline::run`] returns, whichever way it returns.

use crate::convert::Converter;
use crate::error::{ConversionError, PrintRequestError};
use crate::page_range::{self, PageSpec};
use crate::pdf::{self, DocumentHandle};
use crate::print::{self, PrintBackend};
use crate::storage::DocumentFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info};

/// What was printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReport {
    pub device: String,
    pub pages: u32,
    pub bytes: usize,
}

pub struct PrintPipeline {
    converter: Arc<dyn Converter>,
    backend: Arc<dyn PrintBackend>,
    scratch_dir: PathBuf,
}

impl PrintPipeline {
    pub fn new(
        converter: Arc<dyn Converter>,
        backend: Arc<dyn PrintBackend>,
        scratch_dir: PathBuf,
    ) -> Self {
        PrintPipeline {
            converter,
            backend,
            scratch_dir,
        }
    }

    pub fn backend(&self) -> &dyn PrintBackend {
        self.backend.as_ref()
    }

    /// Open `source` as a PDF, converting it first if it is not one.
    pub fn open_document(
        &self,
        source: &Path,
        format: DocumentFormat,
    ) -> Result<DocumentHandle, PrintRequestError> {
        match format {
            DocumentFormat::Pdf => Ok(DocumentHandle::open(source)?),
            DocumentFormat::Docx => {
                let scratch = self.scratch_pdf()?;
                self.converter.convert(source, &scratch)?;
                Ok(DocumentHandle::open_scratch(scratch)?)
            }
        }
    }

    fn scratch_pdf(&self) -> Result<TempPath, ConversionError> {
        Ok(tempfile::Builder::new()
            .prefix("printdrop-")
            .suffix(".pdf")
            .tempfile_in(&self.scratch_dir)?
            .into_temp_path())
    }

    /// Print the pages of `source` selected by `pages_input`. Blocking.
    ///
    /// The source itself is never modified or removed.
    pub fn run(
        &self,
        source: &Path,
        format: DocumentFormat,
        pages_input: &str,
        job_name: &str,
    ) -> Result<PrintReport, PrintRequestError> {
        let spec = page_range::parse(pages_input)?;
        if spec == PageSpec::Pages(Vec::new()) {
            return Err(PrintRequestError::NothingToPrint);
        }

        let doc = self.open_document(source, format)?;
        debug!(
            source = %source.display(),
            pages = doc.page_count(),
            converted = doc.is_scratch(),
            "document opened"
        );
        page_range::check(&spec, doc.page_count())?;

        let selection = pdf::extract(&doc, &spec, &self.scratch_dir)?;
        let receipt = print::submit(self.backend.as_ref(), &selection, job_name)?;

        info!(
            source = %source.display(),
            device = %receipt.device,
            pages = selection.page_count(),
            "document printed"
        );
        Ok(PrintReport {
            device: receipt.device,
            pages: selection.page_count(),
            bytes: receipt.bytes,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::convert::tests::FakeConverter;
    use crate::error::{ExtractionError, PrintError, ValidationError};
    use crate::pdf::document::tests::{create_test_pdf, page_labels};
    use crate::print::tests::RecordingBackend;
    use std::sync::atomic::Ordering;

    pub(crate) struct Fixture {
        pub dir: tempfile::TempDir,
        pub scratch: PathBuf,
        pub backend: RecordingBackend,
        pub converter: Arc<FakeConverter>,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with(RecordingBackend::default(), FakeConverter::producing(create_test_pdf(4)))
        }

        pub fn with(backend: RecordingBackend, converter: FakeConverter) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let scratch = dir.path().join("scratch");
            std::fs::create_dir(&scratch).unwrap();
            Fixture {
                dir,
                scratch,
                backend,
                converter: Arc::new(converter),
            }
        }

        pub fn pipeline(&self) -> PrintPipeline {
            PrintPipeline::new(
                self.converter.clone(),
                Arc::new(self.backend.clone()),
                self.scratch.clone(),
            )
        }

        pub fn write_pdf(&self, name: &str, pages: u32) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, create_test_pdf(pages)).unwrap();
            path
        }

        pub fn scratch_is_empty(&self) -> bool {
            std::fs::read_dir(&self.scratch).unwrap().next().is_none()
        }
    }

    #[test]
    fn test_prints_selected_pages_in_order() {
        let fx = Fixture::new();
        let source = fx.write_pdf("five.pdf", 5);

        let report = fx
            .pipeline()
            .run(&source, DocumentFormat::Pdf, "1-2,4", "five.pdf")
            .unwrap();
        assert_eq!(report.pages, 3);
        assert_eq!(report.device, "recorder");

        let jobs = fx.backend.recorder.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "five.pdf");
        assert_eq!(page_labels(&jobs[0].payload), vec!["Page 1", "Page 2", "Page 4"]);

        assert!(source.exists());
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_all_prints_original_bytes() {
        let fx = Fixture::new();
        let source = fx.write_pdf("three.pdf", 3);

        fx.pipeline()
            .run(&source, DocumentFormat::Pdf, "ALL", "three.pdf")
            .unwrap();
        let jobs = fx.backend.recorder.jobs();
        assert_eq!(jobs[0].payload, std::fs::read(&source).unwrap());
    }

    #[test]
    fn test_out_of_range_prints_nothing() {
        let fx = Fixture::new();
        let source = fx.write_pdf("three.pdf", 3);

        let err = fx
            .pipeline()
            .run(&source, DocumentFormat::Pdf, "1-10", "three.pdf")
            .unwrap_err();
        assert!(matches!(
            err,
            PrintRequestError::Validation(ValidationError { total: 3, .. })
        ));
        assert!(fx.backend.recorder.calls().is_empty());
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_reversed_range_prints_nothing() {
        let fx = Fixture::new();
        let source = fx.write_pdf("three.pdf", 3);

        let err = fx
            .pipeline()
            .run(&source, DocumentFormat::Pdf, "3-1", "three.pdf")
            .unwrap_err();
        assert!(matches!(err, PrintRequestError::NothingToPrint));
        assert!(fx.backend.recorder.calls().is_empty());
    }

    #[test]
    fn test_parse_error_before_any_work() {
        let fx = Fixture::new();
        let err = fx
            .pipeline()
            .run(Path::new("/does/not/exist.docx"), DocumentFormat::Docx, "x", "doc")
            .unwrap_err();
        assert!(matches!(err, PrintRequestError::Parse(_)));
        assert_eq!(fx.converter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_docx_is_converted_and_scratch_removed() {
        let fx = Fixture::new();
        let source = fx.dir.path().join("letter.docx");
        std::fs::write(&source, b"PK\x03\x04").unwrap();

        let report = fx
            .pipeline()
            .run(&source, DocumentFormat::Docx, "4,1", "letter.docx")
            .unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(fx.converter.calls.load(Ordering::SeqCst), 1);

        let jobs = fx.backend.recorder.jobs();
        assert_eq!(page_labels(&jobs[0].payload), vec!["Page 4", "Page 1"]);
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_conversion_failure_leaves_nothing() {
        let fx = Fixture::with(RecordingBackend::default(), FakeConverter::default());
        let source = fx.dir.path().join("letter.docx");
        std::fs::write(&source, b"PK").unwrap();

        let err = fx
            .pipeline()
            .run(&source, DocumentFormat::Docx, "all", "letter.docx")
            .unwrap_err();
        assert!(matches!(err, PrintRequestError::Conversion(_)));
        assert!(fx.scratch_is_empty());
        assert!(fx.backend.recorder.calls().is_empty());
    }

    #[test]
    fn test_corrupt_upload() {
        let fx = Fixture::new();
        let source = fx.dir.path().join("broken.pdf");
        std::fs::write(&source, b"%PDF-1.4 garbage").unwrap();

        let err = fx
            .pipeline()
            .run(&source, DocumentFormat::Pdf, "1", "broken.pdf")
            .unwrap_err();
        assert!(matches!(
            err,
            PrintRequestError::Extraction(ExtractionError::CorruptSource(_))
        ));
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_corrupt_conversion_output_is_removed() {
        let fx = Fixture::with(
            RecordingBackend::default(),
            FakeConverter::producing(b"garbage".to_vec()),
        );
        let source = fx.dir.path().join("letter.docx");
        std::fs::write(&source, b"PK\x03\x04").unwrap();

        let err = fx
            .pipeline()
            .run(&source, DocumentFormat::Docx, "1", "letter.docx")
            .unwrap_err();
        assert!(matches!(
            err,
            PrintRequestError::Extraction(ExtractionError::CorruptSource(_))
        ));
        assert_eq!(fx.converter.calls.load(Ordering::SeqCst), 1);
        assert!(fx.scratch_is_empty());
        assert!(fx.backend.recorder.calls().is_empty());
    }

    #[test]
    fn test_printer_failure_cleans_up() {
        let fx = Fixture::with(
            RecordingBackend {
                fail_at: Some("write"),
                ..Default::default()
            },
            FakeConverter::default(),
        );
        let source = fx.write_pdf("three.pdf", 3);

        let err = fx
            .pipeline()
            .run(&source, DocumentFormat::Pdf, "2", "three.pdf")
            .unwrap_err();
        assert!(matches!(err, PrintRequestError::Print(PrintError::DeviceFailure(_))));
        assert_eq!(fx.backend.recorder.calls().last().unwrap(), "close");
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_no_printer() {
        let fx = Fixture::with(
            RecordingBackend {
                no_device: true,
                ..Default::default()
            },
            FakeConverter::default(),
        );
        let source = fx.write_pdf("three.pdf", 3);

        let err = fx
            .pipeline()
            .run(&source, DocumentFormat::Pdf, "1-2", "three.pdf")
            .unwrap_err();
        assert!(matches!(err, PrintRequestError::Print(PrintError::NoDevice)));
        assert!(fx.scratch_is_empty());
    }
}
