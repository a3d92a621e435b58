//! Index synchronization.
//!
//! One pass reconciles the source folder with the index and the metadata
//! snapshot:
//!
//! ```text
//! load snapshot ─▶ list + fingerprint ─▶ classify ─▶ removals ─▶ (re)process ─▶ commit
//! ```
//!
//! Commit rules:
//!
//! - The snapshot is written once, after every index mutation of the pass,
//!   and only if it changed.
//! - A document whose read, extraction, or index update failed keeps its
//!   previous record (or stays absent). Its fingerprint therefore still
//!   differs on the next pass and it is reprocessed then.
//! - A removal whose index delete failed keeps its record, so the next
//!   pass classifies it as removed again.
//! - Reprocessing always deletes the file's old entries before inserting
//!   the new ones, so a document that lost pages leaves no orphans.

use anyhow::Result as AnyResult;

use crate::config::Config;
use crate::detect::{detect_changes, ChangeKind, PendingDocument};
use crate::error::{Error, Result};
use crate::extract::{PageExtractor, PdfExtractor};
use crate::index::{self, Index};
use crate::metadata::MetadataStore;
use crate::models::MetadataSnapshot;
use crate::process::{entry_prefix, process_document, to_entries};
use crate::source::{fingerprint_file, scan_source};

/// Handles a pass operates on. Built by the caller and passed in; the
/// synchronizer holds no state of its own.
pub struct SyncContext<'a> {
    pub config: &'a Config,
    pub index: &'a dyn Index,
    pub store: &'a MetadataStore,
    pub extractor: &'a dyn PageExtractor,
}

/// A document the pass could not bring up to date.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: usize,
    pub ignored: usize,
    pub failed: Vec<SyncFailure>,
    pub entries_inserted: u64,
    pub entries_deleted: u64,
    pub snapshot_saved: bool,
    pub tracked_documents: usize,
}

impl SyncReport {
    /// Whether any index mutation was issued.
    pub fn touched_index(&self) -> bool {
        !self.added.is_empty() || !self.modified.is_empty() || !self.removed.is_empty()
    }

    fn fail(&mut self, file_name: &str, error: &Error) {
        tracing::warn!(file = file_name, error = %error, "document left for next pass");
        self.failed.push(SyncFailure {
            file_name: file_name.to_string(),
            error: error.to_string(),
        });
    }
}

/// Run one synchronization pass.
///
/// Returns `Err` only for pass-level failures (snapshot unreadable or
/// unwritable, source folder unlistable). Per-document failures are in
/// [`SyncReport::failed`].
pub async fn sync_pass(ctx: &SyncContext<'_>) -> Result<SyncReport> {
    let previous = ctx.store.load()?;
    let listing = scan_source(&ctx.config.source)?;

    let mut report = SyncReport {
        ignored: listing.ignored,
        ..SyncReport::default()
    };

    let mut live = Vec::with_capacity(listing.files.len());
    let mut unreadable = Vec::new();
    for file in &listing.files {
        match fingerprint_file(file) {
            Ok(doc) => live.push(doc),
            Err(e) => {
                report.fail(&file.file_name, &e);
                unreadable.push(file.file_name.clone());
            }
        }
    }

    // Tracked documents under a path the walk could not read may still exist.
    for (path, reason) in &listing.unreadable {
        report.fail(path, &Error::document_read(path, reason));
        let dir_prefix = format!("{}/", path);
        unreadable.extend(
            previous
                .keys()
                .filter(|name| *name == path || name.starts_with(&dir_prefix))
                .cloned(),
        );
    }

    let changes = detect_changes(&previous, live, &unreadable);
    report.unchanged = changes.unchanged.len();

    let mut working: MetadataSnapshot = previous.clone();

    for file_name in &changes.to_remove {
        match ctx.index.delete_by_id_prefix(&entry_prefix(file_name)).await {
            Ok(n) => {
                report.entries_deleted += n;
                working.remove(file_name);
                report.removed.push(file_name.clone());
            }
            Err(e) => report.fail(file_name, &e),
        }
    }

    for pending in &changes.to_process {
        let file_name = pending.document.file_name();
        match reindex_document(ctx, pending).await {
            Ok((deleted, inserted)) => {
                report.entries_deleted += deleted;
                report.entries_inserted += inserted;
                working.insert(file_name.to_string(), pending.document.to_record());
                match pending.kind {
                    ChangeKind::Added => report.added.push(file_name.to_string()),
                    ChangeKind::Modified => report.modified.push(file_name.to_string()),
                }
            }
            Err(e) => report.fail(file_name, &e),
        }
    }

    if working != previous {
        ctx.store.save(&working)?;
        report.snapshot_saved = true;
        tracing::info!(
            path = %ctx.store.path().display(),
            documents = working.len(),
            "metadata snapshot committed"
        );
    }
    report.tracked_documents = working.len();

    tracing::info!(
        added = report.added.len(),
        modified = report.modified.len(),
        removed = report.removed.len(),
        unchanged = report.unchanged,
        failed = report.failed.len(),
        "sync pass finished"
    );
    Ok(report)
}

/// Replace every entry of one document. Returns `(deleted, inserted)`.
async fn reindex_document(ctx: &SyncContext<'_>, pending: &PendingDocument) -> Result<(u64, u64)> {
    let doc = &pending.document;
    let pages = process_document(ctx.extractor, &doc.file)?;
    let entries = to_entries(doc.file_name(), &pages);

    let deleted = ctx
        .index
        .delete_by_id_prefix(&entry_prefix(doc.file_name()))
        .await?;
    ctx.index.insert(&entries).await?;

    if entries.is_empty() {
        tracing::info!(file = doc.file_name(), "no extractable text; recorded without entries");
    }
    Ok((deleted, entries.len() as u64))
}

/// `pdfctx sync`: open the configured index and run one pass.
pub async fn run_sync(config: &Config) -> AnyResult<()> {
    let index = index::open_index(config).await?;
    let report = sync_with(config, index.as_ref()).await?;
    print_report(config, &report);
    Ok(())
}

/// One pass against an already-open index, with the PDF extractor and the
/// configured metadata file.
///
/// The memory backend starts empty in every process, so any persisted
/// snapshot is stale: it is discarded and every document is reprocessed.
pub async fn sync_with(config: &Config, index: &dyn Index) -> Result<SyncReport> {
    let store = MetadataStore::new(&config.metadata.path);
    if config.index.backend == "memory" && store.clear()? {
        tracing::debug!("memory index: discarded persisted snapshot");
    }
    let ctx = SyncContext {
        config,
        index,
        store: &store,
        extractor: &PdfExtractor,
    };
    sync_pass(&ctx).await
}

pub fn print_report(config: &Config, report: &SyncReport) {
    println!("sync {}", config.source.folder.display());
    println!("  added: {}", report.added.len());
    println!("  modified: {}", report.modified.len());
    println!("  removed: {}", report.removed.len());
    println!("  unchanged: {}", report.unchanged);
    if report.ignored > 0 {
        println!("  ignored (not documents): {}", report.ignored);
    }
    println!("  entries inserted: {}", report.entries_inserted);
    println!("  entries deleted: {}", report.entries_deleted);
    println!("  tracked documents: {}", report.tracked_documents);
    for failure in &report.failed {
        println!("  failed: {} ({})", failure.file_name, failure.error);
    }
    if report.failed.is_empty() {
        println!("ok");
    } else {
        println!("ok ({} document(s) will be retried next run)", report.failed.len());
    }
}
