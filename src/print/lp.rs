//! CUPS / System V spooler backend driven through `lpstat` and `lp`.

use super::{PrintBackend, PrintDevice};
use crate::error::PrintError;
use regex::Regex;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// Characters that have no business in a printer name.
pub const DANGEROUS_PRINTER_CHARS: [char; 10] =
    ['\'', '"', ';', '&', '|', '`', '$', '\\', '\n', '\r'];

/// Reject printer names that are empty, overlong, or carry shell metacharacters.
pub fn validate_printer_name(name: &str) -> Result<(), PrintError> {
    if name.is_empty() || name.len() > 256 || name.contains(DANGEROUS_PRINTER_CHARS) {
        return Err(PrintError::InvalidDevice(name.to_string()));
    }
    Ok(())
}

/// Extract the destination from `lpstat -d` output.
///
/// Expected format: "system default destination: PrinterName". Anything else
/// (including "no system default destination") means there is none.
pub fn parse_default_destination(output: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^system default destination:\s*(\S+)\s*$").ok()?;
    re.captures(output).map(|caps| caps[1].to_string())
}

#[derive(Debug, Clone)]
pub struct LpBackend {
    printer: Option<String>,
    lp: String,
    lpstat: String,
}

impl LpBackend {
    /// `printer` overrides the system default destination.
    pub fn new(printer: Option<String>) -> Self {
        LpBackend {
            printer,
            lp: "lp".to_string(),
            lpstat: "lpstat".to_string(),
        }
    }

    #[cfg(test)]
    fn with_programs(printer: Option<String>, lp: &str, lpstat: &str) -> Self {
        LpBackend {
            printer,
            lp: lp.to_string(),
            lpstat: lpstat.to_string(),
        }
    }
}

impl PrintBackend for LpBackend {
    fn default_device(&self) -> Result<String, PrintError> {
        if let Some(printer) = &self.printer {
            return Ok(printer.clone());
        }

        let output = Command::new(&self.lpstat).arg("-d").output().map_err(|e| {
            warn!("failed to run {}: {}", self.lpstat, e);
            PrintError::NoDevice
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_default_destination(&stdout) {
            Some(name) => Ok(name),
            None => {
                debug!(output = %stdout.trim(), "lpstat reported no default destination");
                Err(PrintError::NoDevice)
            }
        }
    }

    fn open(&self, device: &str) -> Result<Box<dyn PrintDevice>, PrintError> {
        validate_printer_name(device)?;
        Ok(Box::new(LpDevice {
            lp: self.lp.clone(),
            printer: device.to_string(),
            child: None,
        }))
    }
}

/// One `lp` invocation; the payload is streamed to its stdin.
struct LpDevice {
    lp: String,
    printer: String,
    child: Option<Child>,
}

impl LpDevice {
    fn child(&mut self) -> Result<&mut Child, PrintError> {
        self.child
            .as_mut()
            .ok_or_else(|| PrintError::DeviceFailure("no job has been started".to_string()))
    }
}

impl PrintDevice for LpDevice {
    fn start_job(&mut self, job_name: &str) -> Result<(), PrintError> {
        let child = Command::new(&self.lp)
            .arg("-d")
            .arg(&self.printer)
            .arg("-t")
            .arg(job_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PrintError::DeviceFailure(format!("failed to execute {}: {}", self.lp, e))
            })?;
        self.child = Some(child);
        Ok(())
    }

    fn start_page(&mut self) -> Result<(), PrintError> {
        // The spooler paginates the PDF itself.
        self.child().map(|_| ())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, PrintError> {
        let stdin = self
            .child()?
            .stdin
            .as_mut()
            .ok_or_else(|| PrintError::DeviceFailure("spooler input is closed".to_string()))?;
        stdin
            .write_all(data)
            .map_err(|e| PrintError::DeviceFailure(format!("failed to send data: {}", e)))?;
        Ok(data.len())
    }

    fn end_page(&mut self) -> Result<(), PrintError> {
        self.child().map(|_| ())
    }

    fn end_job(&mut self) -> Result<(), PrintError> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| PrintError::DeviceFailure("no job has been started".to_string()))?;
        drop(child.stdin.take());

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PrintError::DeviceFailure(if stderr.trim().is_empty() {
                format!("{} exited with {}", self.lp, output.status)
            } else {
                stderr.trim().to_string()
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        info!(printer = %self.printer, "{}", stdout.trim());
        Ok(())
    }

    fn close(&mut self) -> Result<(), PrintError> {
        // A child still present here never reached end_job; cancel the submission.
        if let Some(mut child) = self.child.take() {
            warn!(printer = %self.printer, "cancelling unfinished spooler submission");
            let _ = child.kill();
            child.wait()?;
        }
        Ok(())
    }
}
