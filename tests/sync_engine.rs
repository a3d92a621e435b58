//! Synchronization pass behavior against a real folder, the in-memory
//! index, and a text-based page extractor.
//!
//! Test "PDFs" are plain text files whose pages are separated by form feeds
//! (`\x0c`). A file starting with `CORRUPT` fails extraction.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use pdf_context::config::Config;
use pdf_context::error::{Error, Result};
use pdf_context::extract::{ExtractError, PageExtractor};
use pdf_context::index::{InMemoryIndex, Index};
use pdf_context::metadata::MetadataStore;
use pdf_context::models::IndexEntry;
use pdf_context::sync::{sync_pass, SyncContext, SyncReport};

struct FormFeedPages;

impl PageExtractor for FormFeedPages {
    fn extract_pages(&self, path: &Path) -> std::result::Result<Vec<String>, ExtractError> {
        let text = fs::read_to_string(path)?;
        if text.starts_with("CORRUPT") {
            return Err(ExtractError::Pdf("broken xref table".to_string()));
        }
        Ok(text.split('\x0c').map(str::to_string).collect())
    }
}

/// In-memory index that counts mutations and can refuse inserts or prefix
/// deletes for one document.
#[derive(Default)]
struct CountingIndex {
    inner: InMemoryIndex,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
    reject_inserts_for: Mutex<Option<String>>,
    reject_deletes_for: Mutex<Option<String>>,
}

impl CountingIndex {
    fn mutations(&self) -> usize {
        self.inserts.load(Ordering::SeqCst) + self.deletes.load(Ordering::SeqCst)
    }

    fn reset_counts(&self) {
        self.inserts.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }

    fn reject_inserts_for(&self, file_name: Option<&str>) {
        *self.reject_inserts_for.lock().unwrap() = file_name.map(str::to_string);
    }

    fn reject_deletes_for(&self, file_name: Option<&str>) {
        *self.reject_deletes_for.lock().unwrap() = file_name.map(str::to_string);
    }

    async fn ids(&self) -> Vec<String> {
        self.inner.entry_ids().await.unwrap()
    }
}

#[async_trait]
impl Index for CountingIndex {
    async fn insert(&self, entries: &[IndexEntry]) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = self.reject_inserts_for.lock().unwrap().as_deref() {
            let prefix = format!("{}-page-", name);
            if entries.iter().any(|e| e.id.starts_with(&prefix)) {
                return Err(Error::IndexOperation("disk full".to_string()));
            }
        }
        self.inner.insert(entries).await
    }

    async fn delete_by_id_prefix(&self, prefix: &str) -> Result<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = self.reject_deletes_for.lock().unwrap().as_deref() {
            if prefix.starts_with(&format!("{}-page-", name)) {
                return Err(Error::IndexOperation("database is locked".to_string()));
            }
        }
        self.inner.delete_by_id_prefix(prefix).await
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_by_ids(ids).await
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexEntry>> {
        self.inner.query(text, top_k).await
    }

    async fn entry_ids(&self) -> Result<Vec<String>> {
        self.inner.entry_ids().await
    }
}

struct Env {
    _tmp: TempDir,
    docs: std::path::PathBuf,
    config: Config,
    store: MetadataStore,
    index: CountingIndex,
}

impl Env {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();

        let mut config = Config::default();
        config.source.folder = docs.clone();
        config.index.backend = "memory".to_string();
        config.metadata.path = tmp.path().join("metadata.json");

        let store = MetadataStore::new(&config.metadata.path);
        Env {
            _tmp: tmp,
            docs,
            config,
            store,
            index: CountingIndex::default(),
        }
    }

    fn write(&self, name: &str, pages: &[&str]) {
        fs::write(self.docs.join(name), pages.join("\x0c")).unwrap();
    }

    fn write_raw(&self, name: &str, content: &str) {
        fs::write(self.docs.join(name), content).unwrap();
    }

    fn remove(&self, name: &str) {
        fs::remove_file(self.docs.join(name)).unwrap();
    }

    async fn sync(&self) -> Result<SyncReport> {
        let ctx = SyncContext {
            config: &self.config,
            index: &self.index,
            store: &self.store,
            extractor: &FormFeedPages,
        };
        sync_pass(&ctx).await
    }

    fn tracked(&self) -> Vec<String> {
        self.store.load().unwrap().keys().cloned().collect()
    }

    fn hash_of(&self, name: &str) -> Option<String> {
        self.store.load().unwrap().get(name).map(|r| r.fingerprint.clone())
    }
}

#[tokio::test]
async fn first_pass_indexes_every_page() {
    let env = Env::new();
    env.write("a.pdf", &["alpha one", "alpha two"]);
    env.write("b.pdf", &["beta one"]);

    let report = env.sync().await.unwrap();

    assert_eq!(report.added, vec!["a.pdf", "b.pdf"]);
    assert_eq!(report.entries_inserted, 3);
    assert!(report.snapshot_saved);
    assert_eq!(
        env.index.ids().await,
        vec!["a.pdf-page-0", "a.pdf-page-1", "b.pdf-page-0"]
    );
    assert_eq!(env.tracked(), vec!["a.pdf", "b.pdf"]);
}

#[tokio::test]
async fn second_pass_without_changes_touches_nothing() {
    let env = Env::new();
    env.write("a.pdf", &["alpha one", "alpha two"]);
    env.sync().await.unwrap();
    let saved = fs::read(env.store.path()).unwrap();
    env.index.reset_counts();

    let report = env.sync().await.unwrap();

    assert_eq!(env.index.mutations(), 0);
    assert!(!report.touched_index());
    assert!(!report.snapshot_saved);
    assert_eq!(report.unchanged, 1);
    assert_eq!(fs::read(env.store.path()).unwrap(), saved);
}

#[tokio::test]
async fn content_change_is_detected_without_mtime_help() {
    let env = Env::new();
    env.write("a.pdf", &["refund window is 30 days"]);
    env.sync().await.unwrap();
    let before = env.hash_of("a.pdf").unwrap();

    // Same length, different bytes.
    env.write("a.pdf", &["refund window is 60 days"]);
    let report = env.sync().await.unwrap();

    assert_eq!(report.modified, vec!["a.pdf"]);
    assert_ne!(env.hash_of("a.pdf").unwrap(), before);
    let hits = env.index.query("60", 3).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "refund window is 60 days");
}

#[tokio::test]
async fn rewriting_identical_bytes_is_unchanged() {
    let env = Env::new();
    env.write("a.pdf", &["stable text"]);
    env.sync().await.unwrap();
    env.index.reset_counts();

    env.write("a.pdf", &["stable text"]);
    let report = env.sync().await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(env.index.mutations(), 0);
}

#[tokio::test]
async fn removed_document_leaves_no_entries() {
    let env = Env::new();
    env.write("a.pdf", &["one", "two", "three"]);
    env.write("b.pdf", &["other"]);
    env.sync().await.unwrap();

    env.remove("a.pdf");
    let report = env.sync().await.unwrap();

    assert_eq!(report.removed, vec!["a.pdf"]);
    assert_eq!(report.entries_deleted, 3);
    assert_eq!(env.index.ids().await, vec!["b.pdf-page-0"]);
    assert_eq!(env.tracked(), vec!["b.pdf"]);
}

#[tokio::test]
async fn shrinking_document_drops_orphan_pages() {
    let env = Env::new();
    env.write("a.pdf", &["one", "two", "three"]);
    env.sync().await.unwrap();

    env.write("a.pdf", &["only page now"]);
    env.sync().await.unwrap();

    assert_eq!(env.index.ids().await, vec!["a.pdf-page-0"]);
}

#[tokio::test]
async fn similar_names_are_not_removed_together() {
    let env = Env::new();
    env.write("a.pdf", &["short name"]);
    env.write("a.pdf.pdf", &["long name"]);
    env.sync().await.unwrap();

    env.remove("a.pdf");
    env.sync().await.unwrap();

    assert_eq!(env.index.ids().await, vec!["a.pdf.pdf-page-0"]);
}

#[tokio::test]
async fn empty_pages_keep_their_positions() {
    let env = Env::new();
    env.write("a.pdf", &["first", "  \n\t ", "third"]);

    let report = env.sync().await.unwrap();

    assert_eq!(report.entries_inserted, 2);
    assert_eq!(env.index.ids().await, vec!["a.pdf-page-0", "a.pdf-page-2"]);
}

#[tokio::test]
async fn document_without_text_is_tracked_with_no_entries() {
    let env = Env::new();
    env.write("scan.pdf", &["", "   "]);

    let report = env.sync().await.unwrap();

    assert_eq!(report.added, vec!["scan.pdf"]);
    assert!(env.index.ids().await.is_empty());
    assert_eq!(env.tracked(), vec!["scan.pdf"]);

    env.index.reset_counts();
    env.sync().await.unwrap();
    assert_eq!(env.index.mutations(), 0);
}

#[tokio::test]
async fn corrupt_document_does_not_block_others() {
    let env = Env::new();
    env.write("good.pdf", &["readable"]);
    env.write_raw("bad.pdf", "CORRUPT bytes");

    let report = env.sync().await.unwrap();

    assert_eq!(report.added, vec!["good.pdf"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file_name, "bad.pdf");
    assert_eq!(env.tracked(), vec!["good.pdf"]);
    assert_eq!(env.index.ids().await, vec!["good.pdf-page-0"]);

    // Still unrecorded, so the next pass tries again.
    let again = env.sync().await.unwrap();
    assert_eq!(again.failed.len(), 1);
    assert_eq!(again.unchanged, 1);

    env.write("bad.pdf", &["repaired"]);
    let fixed = env.sync().await.unwrap();
    assert_eq!(fixed.added, vec!["bad.pdf"]);
    assert!(fixed.failed.is_empty());
}

#[tokio::test]
async fn failed_update_keeps_previous_record() {
    let env = Env::new();
    env.write("a.pdf", &["version one"]);
    env.sync().await.unwrap();
    let old_hash = env.hash_of("a.pdf").unwrap();

    env.write("a.pdf", &["version two"]);
    env.index.reject_inserts_for(Some("a.pdf"));
    let report = env.sync().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(report.modified.is_empty());
    assert_eq!(env.hash_of("a.pdf").unwrap(), old_hash);

    env.index.reject_inserts_for(None);
    let retry = env.sync().await.unwrap();
    assert_eq!(retry.modified, vec!["a.pdf"]);
    assert_ne!(env.hash_of("a.pdf").unwrap(), old_hash);
    let hits = env.index.query("two", 1).await.unwrap();
    assert_eq!(hits[0].id, "a.pdf-page-0");
}

#[tokio::test]
async fn failed_removal_keeps_record_until_delete_succeeds() {
    let env = Env::new();
    env.write("a.pdf", &["going away"]);
    env.write("b.pdf", &["staying"]);
    env.sync().await.unwrap();

    env.remove("a.pdf");
    env.index.reject_deletes_for(Some("a.pdf"));
    let report = env.sync().await.unwrap();

    assert!(report.removed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file_name, "a.pdf");
    assert_eq!(env.tracked(), vec!["a.pdf", "b.pdf"]);
    assert_eq!(env.index.ids().await, vec!["a.pdf-page-0", "b.pdf-page-0"]);

    env.index.reject_deletes_for(None);
    let retry = env.sync().await.unwrap();
    assert_eq!(retry.removed, vec!["a.pdf"]);
    assert_eq!(env.tracked(), vec!["b.pdf"]);
    assert_eq!(env.index.ids().await, vec!["b.pdf-page-0"]);
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_subfolder_keeps_its_records() {
    let mut env = Env::new();
    env.config.source.recursive = true;
    env.config.source.follow_symlinks = true;
    fs::create_dir_all(env.docs.join("archive")).unwrap();
    env.write("archive/old.pdf", &["archived"]);
    env.write("a.pdf", &["current"]);
    env.sync().await.unwrap();

    let outside = env.docs.parent().unwrap();
    fs::rename(env.docs.join("archive"), outside.join("stash")).unwrap();
    std::os::unix::fs::symlink(outside.join("unmounted"), env.docs.join("archive")).unwrap();
    env.write("b.pdf", &["fresh"]);
    let report = env.sync().await.unwrap();

    assert_eq!(report.added, vec!["b.pdf"]);
    assert!(report.removed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file_name, "archive");
    assert_eq!(env.tracked(), vec!["a.pdf", "archive/old.pdf", "b.pdf"]);
    assert!(env
        .index
        .ids()
        .await
        .contains(&"archive/old.pdf-page-0".to_string()));

    fs::remove_file(env.docs.join("archive")).unwrap();
    let report = env.sync().await.unwrap();
    assert_eq!(report.removed, vec!["archive/old.pdf"]);
    assert_eq!(env.tracked(), vec!["a.pdf", "b.pdf"]);
}

#[tokio::test]
async fn non_document_files_are_ignored() {
    let env = Env::new();
    env.write("a.pdf", &["text"]);
    env.write_raw("notes.txt", "not a document");
    env.write_raw("UPPER.PDF", "upper case extension");

    let report = env.sync().await.unwrap();

    assert_eq!(report.ignored, 1);
    assert_eq!(env.tracked(), vec!["UPPER.PDF", "a.pdf"]);
}

#[tokio::test]
async fn corrupt_snapshot_aborts_before_any_mutation() {
    let env = Env::new();
    env.write("a.pdf", &["text"]);
    fs::write(env.store.path(), b"{ not json").unwrap();

    let err = env.sync().await.unwrap_err();

    assert!(matches!(err, Error::Persistence { .. }));
    assert_eq!(env.index.mutations(), 0);
}

#[tokio::test]
async fn unwritable_snapshot_fails_pass_and_next_pass_recovers() {
    let env = Env::new();
    env.write("a.pdf", &["alpha"]);
    // A directory where the temp file would go makes the save fail.
    let blocker = env.store.path().with_file_name("metadata.json.tmp");
    fs::create_dir_all(&blocker).unwrap();

    let err = env.sync().await.unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }));
    assert!(env.tracked().is_empty());

    fs::remove_dir(&blocker).unwrap();
    let report = env.sync().await.unwrap();
    assert_eq!(report.added, vec!["a.pdf"]);
    assert_eq!(env.index.ids().await, vec!["a.pdf-page-0"]);
}

#[tokio::test]
async fn missing_source_folder_is_fatal() {
    let mut env = Env::new();
    env.config.source.folder = env.docs.join("nope");

    let err = env.sync().await.unwrap_err();
    assert!(matches!(err, Error::SourceFolder { .. }));
}

#[tokio::test]
async fn add_modify_delete_lifecycle() {
    let env = Env::new();
    env.write("a.pdf", &["apples are red", "apples grow on trees"]);
    env.write("b.pdf", &["bananas are yellow"]);

    let first = env.sync().await.unwrap();
    assert_eq!(first.added.len(), 2);
    assert_eq!(env.index.ids().await.len(), 3);

    env.write("b.pdf", &["bananas are yellow", "bananas are curved"]);
    let second = env.sync().await.unwrap();
    assert_eq!(second.modified, vec!["b.pdf"]);
    assert_eq!(second.unchanged, 1);
    assert_eq!(
        env.index.ids().await,
        vec!["a.pdf-page-0", "a.pdf-page-1", "b.pdf-page-0", "b.pdf-page-1"]
    );

    env.remove("b.pdf");
    let third = env.sync().await.unwrap();
    assert_eq!(third.removed, vec!["b.pdf"]);
    assert_eq!(env.index.ids().await, vec!["a.pdf-page-0", "a.pdf-page-1"]);
    assert_eq!(env.tracked(), vec!["a.pdf"]);

    let hits = env.index.query("bananas", 3).await.unwrap();
    assert!(hits.is_empty());
}
