use crate::config::Config;
use crate::storage::DocumentFormat;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

pub fn run<P: AsRef<Path>>(
    config: &Config,
    input: P,
    pages: &str,
    job_name: Option<&str>,
) -> Result<()> {
    let input = input.as_ref();
    let format = DocumentFormat::from_path(input)
        .ok_or_else(|| {
        anyhow!("Unsupported format: {} (expected .pdf or .docx)", input.display())
    })?;

    let job_name = match job_name {
        Some(name) => name.to_string(),
        None => input
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string(),
    };

    let pipeline = config.pipeline()?;
    let report = pipeline
        .run(input, format, pages, &job_name)
        .with_context(|| format!("Failed to print {}", input.display()))?;

    println!(
        "Printed {} page(s) of {} on {} ({} bytes)",
        report.pages,
        input.display(),
        report.device,
        report.bytes
    );

    Ok(())
}
