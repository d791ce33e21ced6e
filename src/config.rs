use crate::convert::SofficeConverter;
use crate::pipeline::PrintPipeline;
use crate::print::{LpBackend, PrintBackend, SpoolDirBackend};
use crate::storage::UploadStore;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Settings shared by every subcommand. Each can also be set from the environment.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory that holds uploaded files, one folder per user
    #[arg(long, global = true, env = "PRINTDROP_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Directory the MCP server may read uploaded files from
    #[arg(long, global = true, env = "PRINTDROP_INBOX_DIR")]
    pub inbox_dir: Option<PathBuf>,

    /// Directory for converted and extracted scratch PDFs
    #[arg(long, global = true, env = "PRINTDROP_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Printer to use instead of the system default
    #[arg(long, global = true, env = "PRINTDROP_PRINTER")]
    pub printer: Option<String>,

    /// Write jobs as PDF files into this directory instead of printing
    #[arg(long, global = true, env = "PRINTDROP_SPOOL_DIR")]
    pub spool_dir: Option<PathBuf>,

    /// LibreOffice executable used to convert DOCX files
    #[arg(long, global = true, env = "PRINTDROP_SOFFICE", default_value = "soffice")]
    pub soffice: PathBuf,

    /// Also append logs to this file
    #[arg(long, global = true, env = "PRINTDROP_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Config {
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("printdrop"))
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.inbox_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("printdrop-inbox"))
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn upload_store(&self) -> UploadStore {
        UploadStore::new(self.storage_dir())
    }

    pub fn backend(&self) -> Arc<dyn PrintBackend> {
        match &self.spool_dir {
            Some(dir) => Arc::new(SpoolDirBackend::new(dir)),
            None => Arc::new(LpBackend::new(self.printer.clone())),
        }
    }

    pub fn pipeline(&self) -> Result<PrintPipeline> {
        let scratch = self.scratch_dir();
        std::fs::create_dir_all(&scratch)
            .with_context(|| format!("Failed to create directory: {}", scratch.display()))?;
        Ok(PrintPipeline::new(
            Arc::new(SofficeConverter::new(&self.soffice)),
            self.backend(),
            scratch,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_flags_parse() {
        let cli = TestCli::parse_from([
            "printdrop",
            "--storage-dir",
            "/srv/uploads",
            "--printer",
            "Office",
            "--inbox-dir",
            "/srv/inbox",
            "-vv",
        ]);
        assert_eq!(cli.config.storage_dir(), PathBuf::from("/srv/uploads"));
        assert_eq!(cli.config.printer.as_deref(), Some("Office"));
        assert_eq!(cli.config.inbox_dir(), PathBuf::from("/srv/inbox"));
        assert_eq!(cli.config.verbose, 2);
    }

    #[test]
    fn test_spool_dir_selects_directory_backend() {
        let dir = tempfile::tempdir().unwrap();
        let cli = TestCli::parse_from([
            "printdrop",
            "--spool-dir",
            dir.path().to_str().unwrap(),
        ]);
        let device = cli.config.backend().default_device().unwrap();
        assert!(device.starts_with("spool:"));
    }
}
