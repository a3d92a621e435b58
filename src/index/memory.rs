//! In-memory [`Index`] for tests and throwaway runs.
//!
//! Entries live in a `BTreeMap` behind a `RwLock`. Ranking counts how many
//! distinct query terms appear in an entry; entries matching no term are
//! not returned. Ties are broken by id.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{query_terms, Index};
use crate::error::{Error, Result};
use crate::models::IndexEntry;

#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Text stored under `id`, if any.
    pub fn get(&self, id: &str) -> Result<Option<String>> {
        Ok(self.entries.read().map_err(poisoned)?.get(id).cloned())
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::IndexOperation("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl Index for InMemoryIndex {
    async fn insert(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        for e in entries {
            stored.insert(e.id.clone(), e.text.clone());
        }
        Ok(())
    }

    async fn delete_by_id_prefix(&self, prefix: &str) -> Result<u64> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        let before = stored.len();
        stored.retain(|id, _| !id.starts_with(prefix));
        Ok((before - stored.len()) as u64)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count() as u64)
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexEntry>> {
        let terms = query_terms(text);
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let stored = self.entries.read().map_err(poisoned)?;
        let mut scored: Vec<(usize, &String, &String)> = stored
            .iter()
            .filter_map(|(id, body)| {
                let words: HashSet<String> = query_terms(body).into_iter().collect();
                let score = terms.iter().filter(|t| words.contains(*t)).count();
                (score > 0).then_some((score, id, body))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, id, body)| IndexEntry {
                id: id.clone(),
                text: body.clone(),
            })
            .collect())
    }

    async fn entry_ids(&self) -> Result<Vec<String>> {
        let stored = self.entries.read().map_err(poisoned)?;
        Ok(stored.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, text: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn reinsert_replaces_text() {
        let index = InMemoryIndex::new();
        index.insert(&[entry("a.pdf-page-0", "old")]).await.unwrap();
        index.insert(&[entry("a.pdf-page-0", "new")]).await.unwrap();
        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(index.get("a.pdf-page-0").unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn prefix_delete_is_literal() {
        let index = InMemoryIndex::new();
        index
            .insert(&[
                entry("a.pdf-page-0", "x"),
                entry("a.pdf-page-1", "y"),
                entry("a.pdf.pdf-page-0", "z"),
                entry("b.pdf-page-0", "w"),
            ])
            .await
            .unwrap();

        let removed = index.delete_by_id_prefix("a.pdf-page-").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            index.entry_ids().await.unwrap(),
            vec!["a.pdf.pdf-page-0", "b.pdf-page-0"]
        );
    }

    #[tokio::test]
    async fn delete_by_ids_ignores_unknown() {
        let index = InMemoryIndex::new();
        index.insert(&[entry("a", "x"), entry("b", "y")]).await.unwrap();
        let removed = index
            .delete_by_ids(&["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.entry_ids().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn query_ranks_by_term_overlap() {
        let index = InMemoryIndex::new();
        index
            .insert(&[
                entry("p1", "refund policy for damaged goods"),
                entry("p2", "shipping times"),
                entry("p3", "refund window is thirty days"),
            ])
            .await
            .unwrap();

        let hits = index.query("refund policy?", 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);

        let top1 = index.query("refund policy?", 1).await.unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].id, "p1");
    }

    #[tokio::test]
    async fn poisoned_lock_is_an_index_error() {
        let index = std::sync::Arc::new(InMemoryIndex::new());
        let shared = index.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.entries.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(matches!(index.len(), Err(Error::IndexOperation(_))));
        assert!(matches!(index.get("x"), Err(Error::IndexOperation(_))));
        assert!(matches!(
            index.entry_ids().await,
            Err(Error::IndexOperation(_))
        ));
    }
}
