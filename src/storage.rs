//! Per-owner upload storage on local disk.

use anyhow::{bail, Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Format of an uploaded document, taken from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("pdf") {
            Some(DocumentFormat::Pdf)
        } else if ext.eq_ignore_ascii_case("docx") {
            Some(DocumentFormat::Docx)
        } else {
            None
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

/// Uploads live in `<root>/<owner>/<file name>`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        UploadStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn owner_dir(&self, owner: &str) -> PathBuf {
        let safe: String = owner
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(safe)
    }

    /// Store `bytes` under the owner's folder and return the stored path.
    ///
    /// Only the final component of `name` is used. An existing file of the same
    /// name is kept and the new one is stored as `name (n).ext`.
    pub fn save(&self, owner: &str, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let file_name = match Path::new(name).file_name().and_then(|n| n.to_str()) {
            Some(n) if !n.trim().is_empty() => n,
            _ => bail!("Invalid file name: {:?}", name),
        };

        let dir = self.owner_dir(owner);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let path = unique_path(&dir, file_name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to save upload: {}", path.display()))?;
        info!(owner, path = %path.display(), bytes = bytes.len(), "upload saved");
        Ok(path)
    }

    /// Remove one stored file. Removing a file that is already gone is a no-op.
    pub fn remove<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove file: {}", path.display()))
            }
        }
    }

    /// Remove the owner's folder if nothing is left in it.
    pub fn remove_if_empty(&self, owner: &str) -> Result<()> {
        let dir = self.owner_dir(owner);
        let mut entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read directory: {}", dir.display()))
            }
        };
        if entries.next().is_some() {
            return Ok(());
        }

        match std::fs::remove_dir(&dir) {
            Ok(()) => {
                info!(dir = %dir.display(), "empty upload folder removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(dir = %dir.display(), "failed to remove upload folder: {}", e);
                Err(e).with_context(|| format!("Failed to remove directory: {}", dir.display()))
            }
        }
    }
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let ext = as_path.extension().and_then(|s| s.to_str());

    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
