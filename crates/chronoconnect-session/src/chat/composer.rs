//! The outgoing message draft and an optional attached text document.

use std::path::Path;

use tracing::{debug, info};

use crate::error::DocumentError;

const DOCUMENT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// A text document read from disk, waiting to be inserted into the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedDocument {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ChatComposer {
    draft: String,
    document: Option<SelectedDocument>,
}

impl ChatComposer {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn document(&self) -> Option<&SelectedDocument> {
        self.document.as_ref()
    }

    /// Read `path` as the selected document, replacing any earlier one.
    ///
    /// Only `.txt` and `.md` files are accepted. On any failure the
    /// selection is left empty.
    pub async fn select_document(&mut self, path: &Path) -> Result<&SelectedDocument, DocumentError> {
        self.document = None;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if !is_text_document(path) {
            return Err(DocumentError::InvalidType { name });
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocumentError::Read {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        info!(document = %name, bytes = text.len(), "document selected");
        Ok(&*self.document.insert(SelectedDocument { name, text }))
    }

    /// Append the selected document to the draft and clear the selection.
    /// An empty document is left selected and nothing changes.
    pub fn insert_document(&mut self) -> bool {
        match self.document.take() {
            Some(document) if !document.text.is_empty() => {
                debug!(document = %document.name, "document inserted into draft");
                self.draft.push_str(&document.text);
                true
            }
            unchanged => {
                self.document = unchanged;
                false
            }
        }
    }

    pub fn clear_document(&mut self) -> bool {
        self.document.take().is_some()
    }

    /// Hand over the draft for sending. A blank draft stays put.
    pub(crate) fn take_draft(&mut self) -> Option<String> {
        if self.draft.trim().is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.draft))
    }
}

fn is_text_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.iter().any(|d| ext.eq_ignore_ascii_case(d)))
}
