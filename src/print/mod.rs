//! Single-job submission to an output device.
//!
//! A job walks `NotStarted → DeviceOpened → JobStarted → PageStarted → DataWritten →
//! PageEnded → JobEnded → Closed`. The open device is owned by a guard that closes it
//! on every exit path, so a failure at any step leaves nothing open.

pub mod lp;
pub mod spool_dir;

pub use lp::LpBackend;
pub use spool_dir::SpoolDirBackend;

use crate::error::PrintError;
use crate::pdf::DocumentHandle;
use std::fmt;
use tracing::{debug, info, warn};

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    NotStarted,
    DeviceOpened,
    JobStarted,
    PageStarted,
    DataWritten,
    PageEnded,
    JobEnded,
    Closed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::NotStarted => "not-started",
            JobState::DeviceOpened => "device-opened",
            JobState::JobStarted => "job-started",
            JobState::PageStarted => "page-started",
            JobState::DataWritten => "data-written",
            JobState::PageEnded => "page-ended",
            JobState::JobEnded => "job-ended",
            JobState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// An opened output device. Every call blocks and may fail.
pub trait PrintDevice: Send {
    fn start_job(&mut self, job_name: &str) -> Result<(), PrintError>;
    fn start_page(&mut self) -> Result<(), PrintError>;
    /// Hand `data` to the device, returning how many bytes it accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, PrintError>;
    fn end_page(&mut self) -> Result<(), PrintError>;
    fn end_job(&mut self) -> Result<(), PrintError>;
    /// Release the device. Called exactly once, whatever state the job is in.
    fn close(&mut self) -> Result<(), PrintError>;
}

/// Discovery and opening of output devices.
pub trait PrintBackend: Send + Sync {
    /// Name of the default device, or `PrintError::NoDevice`.
    fn default_device(&self) -> Result<String, PrintError>;
    fn open(&self, device: &str) -> Result<Box<dyn PrintDevice>, PrintError>;
}

/// A payload and the name it is shown under in the queue.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub name: String,
    pub payload: Vec<u8>,
}

impl PrintJob {
    pub fn from_document(doc: &DocumentHandle, name: &str) -> Result<Self, PrintError> {
        Ok(PrintJob {
            name: name.to_string(),
            payload: std::fs::read(doc.path())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub device: String,
    pub bytes: usize,
}

/// Owns an open device and guarantees it is closed.
struct DeviceGuard {
    device: Box<dyn PrintDevice>,
    name: String,
    state: JobState,
}

impl DeviceGuard {
    fn open(backend: &dyn PrintBackend, name: String) -> Result<Self, PrintError> {
        let device = backend.open(&name)?;
        debug!(
            device = %name,
            from = %JobState::NotStarted,
            to = %JobState::DeviceOpened,
            "print job transition"
        );
        Ok(DeviceGuard {
            device,
            name,
            state: JobState::DeviceOpened,
        })
    }

    fn advance<T>(
        &mut self,
        next: JobState,
        step: impl FnOnce(&mut dyn PrintDevice) -> Result<T, PrintError>,
    ) -> Result<T, PrintError> {
        let out = step(self.device.as_mut())?;
        debug!(device = %self.name, from = %self.state, to = %next, "print job transition");
        self.state = next;
        Ok(out)
    }

    fn close(&mut self) -> Result<(), PrintError> {
        if self.state == JobState::Closed {
            return Ok(());
        }
        let from = self.state;
        self.state = JobState::Closed;
        debug!(device = %self.name, %from, "closing printer");
        self.device.close()
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        let from = self.state;
        if let Err(e) = self.close() {
            warn!(device = %self.name, %from, "failed to close printer: {}", e);
        }
    }
}

/// Send a whole job to the default device of `backend`.
pub fn submit_job(backend: &dyn PrintBackend, job: &PrintJob) -> Result<SubmitReceipt, PrintError> {
    let device = backend.default_device()?;
    info!(device = %device, job = %job.name, bytes = job.payload.len(), "submitting print job");

    let mut guard = DeviceGuard::open(backend, device)?;
    guard.advance(JobState::JobStarted, |d| d.start_job(&job.name))?;
    guard.advance(JobState::PageStarted, |d| d.start_page())?;

    let written = guard.advance(JobState::DataWritten, |d| d.write(&job.payload))?;
    if written != job.payload.len() {
        return Err(PrintError::DeviceFailure(format!(
            "short write: {} of {} bytes accepted",
            written,
            job.payload.len()
        )));
    }

    guard.advance(JobState::PageEnded, |d| d.end_page())?;
    guard.advance(JobState::JobEnded, |d| d.end_job())?;

    // The job is queued by now; a failing close is logged by the guard instead.
    if let Err(e) = guard.close() {
        warn!(device = %guard.name, "printer did not close cleanly: {}", e);
    }

    info!(device = %guard.name, job = %job.name, "print job submitted");
    Ok(SubmitReceipt {
        device: guard.name.clone(),
        bytes: written,
    })
}

/// Print a document's bytes as one job named `job_name`.
pub fn submit(
    backend: &dyn PrintBackend,
    doc: &DocumentHandle,
    job_name: &str,
) -> Result<SubmitReceipt, PrintError> {
    let job = PrintJob::from_document(doc, job_name)?;
    submit_job(backend, &job)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Device call log shared between a recording backend and its devices.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct Recorder {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub jobs: Arc<Mutex<Vec<PrintJob>>>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn jobs(&self) -> Vec<PrintJob> {
            self.jobs.lock().unwrap().clone()
        }
    }

    /// In-memory backend. `fail_at` names a device call that should fail.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingBackend {
        pub recorder: Recorder,
        pub no_device: bool,
        pub fail_at: Option<&'static str>,
        pub short_write: bool,
    }

    struct RecordingDevice {
        recorder: Recorder,
        fail_at: Option<&'static str>,
        short_write: bool,
        job: Option<PrintJob>,
    }

    impl RecordingDevice {
        fn call(&mut self, name: &'static str) -> Result<(), PrintError> {
            self.recorder.calls.lock().unwrap().push(name.to_string());
            if self.fail_at == Some(name) {
                return Err(PrintError::DeviceFailure(format!("{} failed", name)));
            }
            Ok(())
        }
    }

    impl PrintBackend for RecordingBackend {
        fn default_device(&self) -> Result<String, PrintError> {
            if self.no_device {
                Err(PrintError::NoDevice)
            } else {
                Ok("recorder".to_string())
            }
        }

        fn open(&self, _device: &str) -> Result<Box<dyn PrintDevice>, PrintError> {
            let mut device = RecordingDevice {
                recorder: self.recorder.clone(),
                fail_at: self.fail_at,
                short_write: self.short_write,
                job: None,
            };
            device.call("open")?;
            Ok(Box::new(device))
        }
    }

    impl PrintDevice for RecordingDevice {
        fn start_job(&mut self, job_name: &str) -> Result<(), PrintError> {
            self.call("start_job")?;
            self.job = Some(PrintJob {
                name: job_name.to_string(),
                payload: Vec::new(),
            });
            Ok(())
        }

        fn start_page(&mut self) -> Result<(), PrintError> {
            self.call("start_page")
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, PrintError> {
            self.call("write")?;
            let accepted = if self.short_write { data.len() / 2 } else { data.len() };
            if let Some(job) = self.job.as_mut() {
                job.payload.extend_from_slice(&data[..accepted]);
            }
            Ok(accepted)
        }

        fn end_page(&mut self) -> Result<(), PrintError> {
            self.call("end_page")
        }

        fn end_job(&mut self) -> Result<(), PrintError> {
            self.call("end_job")?;
            if let Some(job) = self.job.take() {
                self.recorder.jobs.lock().unwrap().push(job);
            }
            Ok(())
        }

        fn close(&mut self) -> Result<(), PrintError> {
            self.call("close")
        }
    }

    fn job() -> PrintJob {
        PrintJob {
            name: "test".to_string(),
            payload: b"%PDF-1.7 payload".to_vec(),
        }
    }

    #[test]
    fn test_full_lifecycle() {
        let backend = RecordingBackend::default();
        let receipt = submit_job(&backend, &job()).unwrap();

        assert_eq!(receipt.device, "recorder");
        assert_eq!(receipt.bytes, job().payload.len());
        assert_eq!(
            backend.recorder.calls(),
            vec!["open", "start_job", "start_page", "write", "end_page", "end_job", "close"]
        );
        let jobs = backend.recorder.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].payload, job().payload);
    }

    #[test]
    fn test_no_device_touches_nothing() {
        let backend = RecordingBackend {
            no_device: true,
            ..Default::default()
        };
        assert!(matches!(
            submit_job(&backend, &job()),
            Err(PrintError::NoDevice)
        ));
        assert!(backend.recorder.calls().is_empty());
    }

    #[test]
    fn test_failure_at_any_step_closes_device() {
        for step in ["start_job", "start_page", "write", "end_page", "end_job"] {
            let backend = RecordingBackend {
                fail_at: Some(step),
                ..Default::default()
            };
            let err = submit_job(&backend, &job()).unwrap_err();
            assert!(matches!(err, PrintError::DeviceFailure(_)), "{step}");

            let calls = backend.recorder.calls();
            assert_eq!(calls.last().map(String::as_str), Some("close"), "{step}");
            assert_eq!(calls.iter().filter(|c| *c == "close").count(), 1, "{step}");
            assert!(backend.recorder.jobs().is_empty(), "{step}");
        }
    }

    #[test]
    fn test_failed_open_has_nothing_to_close() {
        let backend = RecordingBackend {
            fail_at: Some("open"),
            ..Default::default()
        };
        assert!(submit_job(&backend, &job()).is_err());
        assert_eq!(backend.recorder.calls(), vec!["open"]);
    }

    #[test]
    fn test_short_write_fails_job() {
        let backend = RecordingBackend {
            short_write: true,
            ..Default::default()
        };
        let err = submit_job(&backend, &job()).unwrap_err();
        assert!(err.to_string().contains("short write"));
        assert_eq!(
            backend.recorder.calls(),
            vec!["open", "start_job", "start_page", "write", "close"]
        );
    }

    #[test]
    fn test_close_failure_after_job_end_is_not_fatal() {
        let backend = RecordingBackend {
            fail_at: Some("close"),
            ..Default::default()
        };
        assert!(submit_job(&backend, &job()).is_ok());
        assert_eq!(backend.recorder.jobs().len(), 1);
    }
}
