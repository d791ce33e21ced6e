//! Conversation logic of the print bot, independent of the transport.
//!
//! Every operation returns the text to send back to the user. Errors are logged
//! here and turned into replies; nothing propagates to the transport.

use crate::error::PrintRequestError;
use crate::pipeline::{PrintPipeline, PrintReport};
use crate::session::{SessionStore, StoredDocument};
use crate::storage::{DocumentFormat, UploadStore};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const GREETING: &str = "Hi! Send me a PDF or DOCX file and I will print it. \
    After uploading, list your files, pick one, and send the page range to print.";

pub const PAGE_PROMPT: &str = "Enter the pages to print (for example '1-5' or '1,3,5'). \
    To print every page, enter 'all'.";

#[derive(Clone)]
pub struct PrintBot {
    store: UploadStore,
    sessions: SessionStore,
    pipeline: Arc<PrintPipeline>,
}

impl PrintBot {
    pub fn new(store: UploadStore, pipeline: Arc<PrintPipeline>) -> Self {
        PrintBot {
            store,
            sessions: SessionStore::new(),
            pipeline,
        }
    }

    pub fn start(&self, owner: &str) -> String {
        info!(owner, "user started the bot");
        GREETING.to_string()
    }

    /// Accept an uploaded file for `owner`.
    pub async fn upload(&self, owner: &str, name: &str, bytes: Vec<u8>) -> String {
        let Some(format) = DocumentFormat::from_path(name) else {
            return "This format is not supported. Send a PDF or DOCX file.".to_string();
        };

        let mut session = self.sessions.lock(owner).await;
        let store = self.store.clone();
        let (owner_owned, name_owned) = (owner.to_string(), name.to_string());
        let saved =
            tokio::task::spawn_blocking(move || store.save(&owner_owned, &name_owned, &bytes))
                .await;

        match saved {
            Ok(Ok(path)) => {
                session.documents.push(StoredDocument {
                    name: name.to_string(),
                    path,
                    format,
                });
                info!(owner, file = name, "file stored");
                format!(
                    "File {} uploaded. List your files and select one to print.",
                    name
                )
            }
            Ok(Err(e)) => {
                error!(owner, file = name, "failed to store upload: {:#}", e);
                format!("Could not store {}: {}", name, e)
            }
            Err(e) => {
                error!(owner, file = name, "upload task failed: {}", e);
                "Could not store the file.".to_string()
            }
        }
    }

    /// Numbered list of the owner's uploads.
    pub async fn list(&self, owner: &str) -> String {
        let session = self.sessions.lock(owner).await;
        if session.documents.is_empty() {
            return "You have not uploaded any files yet. Please send at least one file."
                .to_string();
        }

        let mut out = String::from("Choose a file to print:\n");
        for (i, doc) in session.documents.iter().enumerate() {
            let marker = if session.selected == Some(i) { " (selected)" } else { "" };
            out.push_str(&format!("{}: {}{}\n", i, doc.name, marker));
        }
        out
    }

    pub async fn select(&self, owner: &str, index: usize) -> String {
        let mut session = self.sessions.lock(owner).await;
        match session.select(index) {
            Some(doc) => {
                info!(owner, file = %doc.name, "file selected");
                PAGE_PROMPT.to_string()
            }
            None => format!(
                "There is no file number {}. You have {} file(s).",
                index,
                session.documents.len()
            ),
        }
    }

    /// Print the selected file. Rejected while another request of the owner runs.
    ///
    /// The session stays locked inside the blocking task until the upload is
    /// cleaned up, so the bookkeeping finishes even if the caller goes away.
    pub async fn print(&self, owner: &str, pages_input: &str) -> String {
        let Some(mut session) = self.sessions.try_lock(owner) else {
            warn!(owner, "print requested while another request is in progress");
            return "Your previous request is still being processed. Please wait for it to finish."
                .to_string();
        };

        let (index, doc) = match (session.selected, session.selected_document()) {
            (Some(index), Some(doc)) => (index, doc.clone()),
            _ => return "Select a file first.".to_string(),
        };
        let name = doc.name.clone();

        let pipeline = self.pipeline.clone();
        let store = self.store.clone();
        let owner_owned = owner.to_string();
        let pages = pages_input.trim().to_string();
        let job = move || -> Result<PrintReport, PrintRequestError> {
            let report = pipeline.run(&doc.path, doc.format, &pages, &doc.name)?;

            session.remove(index);
            let cleanup = store
                .remove(&doc.path)
                .and_then(|()| store.remove_if_empty(&owner_owned));
            if let Err(e) = cleanup {
                error!(owner = %owner_owned, "failed to remove upload after printing: {:#}", e);
            }
            Ok(report)
        };

        match tokio::task::spawn_blocking(job).await {
            Ok(Ok(report)) => format!(
                "Printed {} page(s) of {} on {}. The file has been deleted.",
                report.pages, name, report.device
            ),
            Ok(Err(e)) => {
                error!(owner, file = %name, pages = pages_input, "print request failed: {}", e);
                e.user_message()
            }
            Err(e) => {
                error!(owner, file = %name, "print task failed: {}", e);
                "Error: the print task stopped unexpectedly.".to_string()
            }
        }
    }

    /// Which device jobs would go to right now.
    pub async fn printer_status(&self) -> String {
        let pipeline = self.pipeline.clone();
        match tokio::task::spawn_blocking(move || pipeline.backend().default_device()).await {
            Ok(Ok(device)) => format!("Default printer: {}", device),
            Ok(Err(e)) => format!("Printer unavailable: {}", e),
            Err(e) => format!("Printer unavailable: {}", e),
        }
    }
}
