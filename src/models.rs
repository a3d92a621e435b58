//! Core data models shared by the synchronization and query pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Last-synchronized state of one source file.
///
/// Serialized field names follow the persisted metadata layout:
/// `{ "hash": "...", "modified_time": 1700000000.5 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(rename = "hash")]
    pub fingerprint: String,
    /// Seconds since the Unix epoch. Advisory only; never used to decide
    /// whether a document changed.
    pub modified_time: f64,
}

/// `file name -> record` for every document known to be in the index.
///
/// A `BTreeMap` keeps the persisted file stable and diff-friendly.
pub type MetadataSnapshot = BTreeMap<String, DocumentRecord>;

/// One retrievable unit of text: a single non-empty page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
}

/// A recognized document found in the source folder.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the source folder, `/`-separated. Unique key.
    pub file_name: String,
    pub path: PathBuf,
    pub modified_time: f64,
}

/// A source file whose content has been fingerprinted during this pass.
#[derive(Debug, Clone)]
pub struct LiveDocument {
    pub file: SourceFile,
    pub fingerprint: String,
}

impl LiveDocument {
    pub fn file_name(&self) -> &str {
        &self.file.file_name
    }

    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            fingerprint: self.fingerprint.clone(),
            modified_time: self.file.modified_time,
        }
    }
}

/// Cleaned text of one page, keyed by its zero-based position in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_index: usize,
    pub text: String,
}

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One `{role, content}` element of a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
