//! In-memory per-owner session state.

use crate::storage::DocumentFormat;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// An uploaded document waiting to be printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub name: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
}

#[derive(Debug, Default)]
pub struct Session {
    pub documents: Vec<StoredDocument>,
    pub selected: Option<usize>,
}

impl Session {
    pub fn select(&mut self, index: usize) -> Option<&StoredDocument> {
        let doc = self.documents.get(index)?;
        self.selected = Some(index);
        Some(doc)
    }

    pub fn selected_document(&self) -> Option<&StoredDocument> {
        self.documents.get(self.selected?)
    }

    /// Drop a document, keeping the selection pointed at the same entry.
    pub fn remove(&mut self, index: usize) -> Option<StoredDocument> {
        if index >= self.documents.len() {
            return None;
        }
        let doc = self.documents.remove(index);
        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        Some(doc)
    }
}

/// Sessions keyed by an external owner id.
///
/// Each session has its own async lock. Long operations hold it for their whole
/// duration, so requests from one owner are strictly sequential.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Arc<AsyncMutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, owner: &str) -> Arc<AsyncMutex<Session>> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.entry(owner.to_string()).or_default().clone()
    }

    /// Wait for the owner's session.
    pub async fn lock(&self, owner: &str) -> OwnedMutexGuard<Session> {
        self.entry(owner).lock_owned().await
    }

    /// The owner's session, or `None` if another request holds it.
    pub fn try_lock(&self, owner: &str) -> Option<OwnedMutexGuard<Session>> {
        self.entry(owner).try_lock_owned().ok()
    }
}
