//! Backend that "prints" by dropping each job into a directory.
//!
//! Jobs are written as `<seq>-<job>.pdf.part` and renamed to `.pdf` once the job
//! ends, so a watcher never sees a half-written file.

use super::{PrintBackend, PrintDevice};
use crate::error::PrintError;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct SpoolDirBackend {
    dir: PathBuf,
}

impl SpoolDirBackend {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        SpoolDirBackend { dir: dir.into() }
    }
}

impl PrintBackend for SpoolDirBackend {
    fn default_device(&self) -> Result<String, PrintError> {
        if self.dir.is_dir() {
            Ok(format!("spool:{}", self.dir.display()))
        } else {
            Err(PrintError::NoDevice)
        }
    }

    fn open(&self, _device: &str) -> Result<Box<dyn PrintDevice>, PrintError> {
        Ok(Box::new(SpoolDirDevice {
            dir: self.dir.clone(),
            pending: None,
        }))
    }
}

struct PendingJob {
    file: File,
    part: PathBuf,
    done: PathBuf,
}

struct SpoolDirDevice {
    dir: PathBuf,
    pending: Option<PendingJob>,
}

impl SpoolDirDevice {
    fn pending(&mut self) -> Result<&mut PendingJob, PrintError> {
        self.pending
            .as_mut()
            .ok_or_else(|| PrintError::DeviceFailure("no job has been started".to_string()))
    }
}

/// File-name-safe version of a job name.
fn job_file_stem(job_name: &str) -> String {
    let stem: String = job_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if stem.is_empty() {
        "job".to_string()
    } else {
        stem
    }
}

impl PrintDevice for SpoolDirDevice {
    fn start_job(&mut self, job_name: &str) -> Result<(), PrintError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let base = format!("{}-{:04}-{}", millis, seq, job_file_stem(job_name));

        let part = self.dir.join(format!("{}.pdf.part", base));
        let done = self.dir.join(format!("{}.pdf", base));
        let file = File::create(&part)?;
        self.pending = Some(PendingJob { file, part, done });
        Ok(())
    }

    fn start_page(&mut self) -> Result<(), PrintError> {
        self.pending().map(|_| ())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, PrintError> {
        self.pending()?.file.write_all(data)?;
        Ok(data.len())
    }

    fn end_page(&mut self) -> Result<(), PrintError> {
        self.pending()?.file.flush()?;
        Ok(())
    }

    fn end_job(&mut self) -> Result<(), PrintError> {
        let job = self
            .pending
            .take()
            .ok_or_else(|| PrintError::DeviceFailure("no job has been started".to_string()))?;
        job.file.sync_all()?;
        drop(job.file);
        std::fs::rename(&job.part, &job.done)?;
        info!(path = %job.done.display(), "job spooled");
        Ok(())
    }

    fn close(&mut self) -> Result<(), PrintError> {
        if let Some(job) = self.pending.take() {
            drop(job.file);
            match std::fs::remove_file(&job.part) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
