//! Source folder listing and content fingerprints.
//!
//! Walks the configured folder, keeps files matching the include globs
//! (case-insensitive, so `REPORT.PDF` counts), and drops everything else.
//! Dropped files are logged at debug level and otherwise ignored: they are
//! never processed and never flagged for removal.
//!
//! A walk error below the root (a dangling link, a subfolder that cannot be
//! read) skips that path and lands in [`SourceListing::unreadable`]. Only a
//! failure on the root itself fails the listing.

use std::path::Path;
use std::time::SystemTime;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::models::{LiveDocument, SourceFile};

/// Result of listing the source folder.
#[derive(Debug, Default)]
pub struct SourceListing {
    /// Recognized documents, sorted by file name.
    pub files: Vec<SourceFile>,
    /// Number of regular files skipped for not matching the globs.
    pub ignored: usize,
    /// Paths below the root the walk could not read, relative with `/`
    /// separators, paired with the reason.
    pub unreadable: Vec<(String, String)>,
}

pub fn scan_source(config: &SourceConfig) -> Result<SourceListing> {
    let root = &config.folder;
    if !root.is_dir() {
        return Err(Error::SourceFolder {
            path: root.clone(),
            source: "not a directory or does not exist".into(),
        });
    }

    let include_set = build_globset(&config.include_globs).map_err(|e| folder_err(root, e))?;
    let exclude_set = build_globset(&config.exclude_globs).map_err(|e| folder_err(root, e))?;

    let mut listing = SourceListing::default();
    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(config.follow_symlinks);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(folder_err(root, e)),
            Err(e) => {
                let relative = e
                    .path()
                    .map(|p| relative_name(root, p))
                    .unwrap_or_default();
                tracing::warn!(path = %relative, error = %e, "skipping unreadable path");
                listing.unreadable.push((relative, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let file_name = relative_name(root, path);

        if exclude_set.is_match(&file_name) || !include_set.is_match(&file_name) {
            tracing::debug!(file = %file_name, "ignoring non-document file");
            listing.ignored += 1;
            continue;
        }

        listing.files.push(SourceFile {
            modified_time: modified_secs(path),
            path: path.to_path_buf(),
            file_name,
        });
    }

    listing.files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(listing)
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

/// SHA-256 of the file's full byte content, lowercase hex.
pub fn fingerprint_file(file: &SourceFile) -> Result<LiveDocument> {
    let bytes = std::fs::read(&file.path).map_err(|e| Error::document_read(&file.file_name, e))?;
    Ok(LiveDocument {
        file: file.clone(),
        fingerprint: fingerprint_bytes(&bytes),
    })
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn modified_secs(path: &Path) -> f64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    builder.build()
}

fn folder_err(root: &Path, err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::SourceFolder {
        path: root.to_path_buf(),
        source: Box::new(err),
    }
}
