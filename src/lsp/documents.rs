//! In-memory store of the documents the client has opened

use std::collections::HashMap;
use std::sync::RwLock;

use tower_lsp::lsp_types::{Range, Url};

/// Latest known state of one open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: Url,
    pub text: String,
    pub version: i32,
    pub language_id: String,
}

/// Result of [`DocumentStore::update_text`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Applied,
    /// The uri was never opened
    Unknown,
    /// The change carries a lower version than the stored one
    Outdated { stored: i32 },
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<Url, Document>,
    current: Option<Url>,
}

/// Thread-safe document table plus the "current document" pointer.
///
/// The current pointer follows the last inserted or updated document and can
/// be moved explicitly by handlers that target a document without naming it
/// again later (code actions followed by executeCommand).
#[derive(Debug, Default)]
pub struct DocumentStore {
    inner: RwLock<Inner>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) a document and marks it current
    pub fn insert(&self, document: Document) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.current = Some(document.uri.clone());
        inner.documents.insert(document.uri.clone(), document);
    }

    pub fn get(&self, uri: &Url) -> Option<Document> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.documents.get(uri).cloned()
    }

    /// Returns the version of a document without cloning its text
    pub fn version(&self, uri: &Url) -> Option<i32> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.documents.get(uri).map(|doc| doc.version)
    }

    /// Replaces the full text of a known document.
    ///
    /// Versions never go backwards: a change older than the stored version is
    /// ignored. The current pointer moves to `uri` in every case, but no
    /// document is created for an unknown uri.
    pub fn update_text(&self, uri: &Url, version: i32, text: String) -> Update {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.current = Some(uri.clone());

        let Some(document) = inner.documents.get_mut(uri) else {
            return Update::Unknown;
        };
        if version < document.version {
            return Update::Outdated {
                stored: document.version,
            };
        }
        document.text = text;
        document.version = version;
        Update::Applied
    }

    pub fn remove(&self, uri: &Url) -> Option<Document> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.documents.remove(uri)
    }

    pub fn current_uri(&self) -> Option<Url> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.current.clone()
    }

    pub fn set_current_uri(&self, uri: Url) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.current = Some(uri);
    }

    pub fn current(&self) -> Option<Document> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let uri = inner.current.as_ref()?;
        inner.documents.get(uri).cloned()
    }

    /// Returns the whole lines `range.start.line..=range.end.line` joined by `\n`.
    ///
    /// The end line is clamped to the last line of the document. Unknown or
    /// empty documents, and ranges starting past the end, yield an empty string.
    pub fn text_in_range(&self, uri: &Url, range: Range) -> String {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        let Some(document) = inner.documents.get(uri) else {
            return String::new();
        };
        if document.text.is_empty() {
            return String::new();
        }

        let lines: Vec<&str> = document.text.split('\n').collect();
        let start = range.start.line as usize;
        if start >= lines.len() {
            return String::new();
        }

        let end = (range.end.line as usize).min(lines.len() - 1);
        if end < start {
            return String::new();
        }

        lines[start..=end].join("\n")
    }
}
