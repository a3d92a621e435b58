//! Persistent metadata snapshot.
//!
//! The snapshot is a single pretty-printed JSON object keyed by file name:
//!
//! ```json
//! {
//!   "a.pdf": { "hash": "9f86d0…", "modified_time": 1718031234.25 }
//! }
//! ```
//!
//! [`MetadataStore::save`] writes to a sibling temp file and renames it over
//! the target, so a reader only ever sees the previous snapshot or the new
//! one in full.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::MetadataSnapshot;

#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns an empty snapshot if nothing has been persisted yet.
    pub fn load(&self) -> Result<MetadataSnapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MetadataSnapshot::new())
            }
            Err(e) => return Err(Error::persistence(&self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| Error::persistence(&self.path, e))
    }

    pub fn save(&self, snapshot: &MetadataSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(&self.path, e))?;
        }

        let bytes =
            serde_json::to_vec_pretty(snapshot).map_err(|e| Error::persistence(&self.path, e))?;
        let tmp = self.tmp_path();
        fs::write(&tmp, bytes).map_err(|e| Error::persistence(&self.path, e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::persistence(&self.path, e));
        }
        Ok(())
    }

    /// Remove the persisted snapshot. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::persistence(&self.path, e)),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "metadata.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
