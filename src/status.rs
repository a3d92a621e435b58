//! Inspection and reset of the synchronized state.
//!
//! `pdfctx status` shows what the metadata snapshot believes is indexed;
//! `pdfctx reset` empties both the index and the snapshot so the next sync
//! rebuilds everything from the source folder.

use anyhow::Result;

use crate::config::Config;
use crate::index::{self, Index};
use crate::metadata::MetadataStore;
use crate::models::MetadataSnapshot;

/// What [`reset`] removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub entries_deleted: u64,
    pub snapshot_cleared: bool,
}

/// Run the status command: print tracked documents and the entry count.
pub async fn run_status(config: &Config) -> Result<()> {
    let store = MetadataStore::new(&config.metadata.path);
    let snapshot = store.load()?;
    let index = index::open_index(config).await?;
    let entry_count = index.entry_ids().await?.len();

    println!("Metadata:  {}", store.path().display());
    println!("Source:    {}", config.source.folder.display());
    println!("Index:     {} ({})", config.index.backend, config.index.path.display());
    println!();
    print_documents(&snapshot);
    println!();
    println!("  Documents: {}", snapshot.len());
    println!("  Entries:   {}", entry_count);
    Ok(())
}

fn print_documents(snapshot: &MetadataSnapshot) {
    if snapshot.is_empty() {
        println!("  No documents synchronized yet.");
        return;
    }
    println!("  {:<40} {:<12} {}", "FILE", "HASH", "MODIFIED");
    println!("  {}", "-".repeat(72));
    for (file_name, record) in snapshot {
        let short = &record.fingerprint[..record.fingerprint.len().min(12)];
        println!(
            "  {:<40} {:<12} {}",
            file_name,
            short,
            format_mtime(record.modified_time)
        );
    }
}

fn format_mtime(secs: f64) -> String {
    chrono::DateTime::from_timestamp(secs.trunc() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| format!("{:.0}", secs))
}

/// Delete every index entry, then the snapshot.
///
/// The snapshot goes last: if the index delete fails, records still point
/// at entries that exist.
pub async fn reset(index: &dyn Index, store: &MetadataStore) -> crate::error::Result<ResetSummary> {
    let ids = index.entry_ids().await?;
    let entries_deleted = if ids.is_empty() {
        0
    } else {
        index.delete_by_ids(&ids).await?
    };
    let snapshot_cleared = store.clear()?;
    tracing::info!(entries_deleted, snapshot_cleared, "index reset");
    Ok(ResetSummary {
        entries_deleted,
        snapshot_cleared,
    })
}

/// Run the reset command.
pub async fn run_reset(config: &Config) -> Result<()> {
    let store = MetadataStore::new(&config.metadata.path);
    let index = index::open_index(config).await?;
    let summary = reset(index.as_ref(), &store).await?;

    println!("reset");
    println!("  entries deleted: {}", summary.entries_deleted);
    println!(
        "  metadata: {}",
        if summary.snapshot_cleared { "removed" } else { "none" }
    );
    println!("ok");
    Ok(())
}
