//! Change detection between the stored snapshot and the live folder.
//!
//! Classification is by fingerprint only. A file whose mtime moved but
//! whose bytes did not is `unchanged`; a file whose bytes changed under an
//! unchanged mtime is still reprocessed.

use std::collections::HashSet;

use crate::models::{LiveDocument, MetadataSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
}

#[derive(Debug, Clone)]
pub struct PendingDocument {
    pub document: LiveDocument,
    pub kind: ChangeKind,
}

/// Three disjoint sets describing what a pass has to do.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub to_process: Vec<PendingDocument>,
    pub unchanged: Vec<LiveDocument>,
    /// File names with a stored record but no file in the folder.
    pub to_remove: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_process.is_empty() && self.to_remove.is_empty()
    }
}

/// Classify `live` documents against `snapshot`.
///
/// `unreadable` lists files that exist in the folder but could not be
/// fingerprinted. They belong to none of the three sets: they are not
/// removed, and their stored records stay as they are.
pub fn detect_changes(
    snapshot: &MetadataSnapshot,
    live: Vec<LiveDocument>,
    unreadable: &[String],
) -> ChangeSet {
    let mut present: HashSet<&str> = unreadable.iter().map(String::as_str).collect();
    for doc in &live {
        present.insert(doc.file_name());
    }

    let to_remove = snapshot
        .keys()
        .filter(|name| !present.contains(name.as_str()))
        .cloned()
        .collect();

    let mut changes = ChangeSet {
        to_remove,
        ..ChangeSet::default()
    };

    for doc in live {
        match snapshot.get(doc.file_name()) {
            Some(record) if record.fingerprint == doc.fingerprint => {
                tracing::debug!(file = doc.file_name(), "unchanged");
                changes.unchanged.push(doc);
            }
            Some(_) => {
                tracing::debug!(file = doc.file_name(), "modified");
                changes.to_process.push(PendingDocument {
                    document: doc,
                    kind: ChangeKind::Modified,
                });
            }
            None => {
                tracing::debug!(file = doc.file_name(), "added");
                changes.to_process.push(PendingDocument {
                    document: doc,
                    kind: ChangeKind::Added,
                });
            }
        }
    }

    changes
}
