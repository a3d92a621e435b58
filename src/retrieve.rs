//! Context assembly for a single query.
//!
//! The index decides relevance and order; this module only labels the
//! returned entries by position and joins them:
//!
//! ```text
//! Page 1: <most relevant entry>
//! Page 2: <next entry>
//! ```

use anyhow::Result as AnyResult;

use crate::config::Config;
use crate::error::Result;
use crate::index::{self, Index};
use crate::models::IndexEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBlock {
    /// Retrieved entries in index order.
    pub entries: Vec<IndexEntry>,
    /// Labeled, newline-joined text handed to the chat model.
    pub text: String,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Query the index for `top_k` entries and assemble them. Fewer than
/// `top_k` results (or none) is not an error. An index failure is returned
/// as-is so the caller never reaches the chat call.
pub async fn build_context(index: &dyn Index, query: &str, top_k: usize) -> Result<ContextBlock> {
    let entries = index.query(query, top_k).await?;
    tracing::debug!(requested = top_k, retrieved = entries.len(), "context retrieved");
    Ok(assemble(entries))
}

pub fn assemble(entries: Vec<IndexEntry>) -> ContextBlock {
    let text = entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("Page {}: {}", i + 1, e.text))
        .collect::<Vec<_>>()
        .join("\n");
    ContextBlock { entries, text }
}

/// `pdfctx context`: print what a query would hand to the model.
pub async fn run_context(config: &Config, query: &str, top_k: Option<usize>) -> AnyResult<()> {
    if top_k == Some(0) {
        anyhow::bail!("top_k must be at least 1");
    }
    let index = index::open_index(config).await?;
    let block = build_context(
        index.as_ref(),
        query,
        top_k.unwrap_or(config.retrieval.top_k),
    )
    .await?;

    if block.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, entry) in block.entries.iter().enumerate() {
        println!("{}. {}", i + 1, entry.id);
    }
    println!();
    println!("{}", block.text);
    Ok(())
}
