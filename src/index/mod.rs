//! The page index collaborator.
//!
//! The synchronizer and context builder only ever talk to [`Index`]: insert
//! entries, delete by id prefix or by exact ids, and query by text. There
//! is deliberately no open-ended filter language.
//!
//! | Backend | Persistence | Ranking |
//! |---------|-------------|---------|
//! | [`SqliteIndex`] | SQLite file | cosine over embeddings, or FTS5 BM25 |
//! | [`InMemoryIndex`] | process lifetime | query-term overlap |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::config::Config;
use crate::embedding;
use crate::error::{Error, Result};
use crate::models::IndexEntry;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

#[async_trait]
pub trait Index: Send + Sync {
    /// Insert entries. An id that already exists is replaced.
    async fn insert(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Delete every entry whose id starts with `prefix` (literal match).
    /// Returns the number of entries removed.
    async fn delete_by_id_prefix(&self, prefix: &str) -> Result<u64>;

    /// Delete the listed ids; unknown ids are ignored.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64>;

    /// At most `top_k` entries, most relevant first.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexEntry>>;

    /// All ids, sorted.
    async fn entry_ids(&self) -> Result<Vec<String>>;
}

/// Open the backend named by `index.backend`.
pub async fn open_index(config: &Config) -> Result<Box<dyn Index>> {
    match config.index.backend.as_str() {
        "memory" => Ok(Box::new(InMemoryIndex::new())),
        _ => {
            let embedder = embedding::create_embedder(&config.embedding).map_err(Error::index)?;
            let index = SqliteIndex::open(&config.index.path, embedder, config.embedding.batch_size)
                .await?;
            Ok(Box::new(index))
        }
    }
}

/// Lowercased alphanumeric terms of `text`, deduplicated, in first-seen order.
pub(crate) fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}
