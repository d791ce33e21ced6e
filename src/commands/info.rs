use crate::config::Config;
use crate::storage::DocumentFormat;
use anyhow::{anyhow, Result};
use std::path::Path;

pub fn run<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| {
        anyhow!("Unsupported format: {} (expected .pdf or .docx)", path.display())
    })?;

    // DOCX files are converted first; the page count is the converted one.
    let doc = config.pipeline()?.open_document(path, format)?;

    println!("File: {}", path.display());
    println!("Format: {}", format.tag());
    println!("Pages: {}", doc.page_count());

    Ok(())
}
