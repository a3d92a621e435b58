//! SQLite-backed [`Index`].
//!
//! Schema:
//!
//! ```text
//! entries        (id TEXT PRIMARY KEY, text, hash)
//! entries_fts    FTS5(entry_id UNINDEXED, text)
//! entry_vectors  (entry_id TEXT PRIMARY KEY, model, dims, hash, embedding BLOB)
//! ```
//!
//! `entries.hash` is the SHA-256 of the page text; `entry_vectors.hash` is the
//! text hash the vector was computed from. With an embedder configured,
//! every insert also stores a vector and queries rank by cosine similarity.
//! Entries written while embeddings were off, or under another model, are
//! embedded by [`SqliteIndex::embed_pending`] before the first similarity
//! query. Without an embedder, queries go through FTS5 and rank by BM25.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;

use super::{query_terms, Index};
use crate::db;
use crate::embedding::{self, Embedder};
use crate::error::{Error, Result};
use crate::models::IndexEntry;

pub struct SqliteIndex {
    pool: SqlitePool,
    embedder: Option<Box<dyn Embedder>>,
    batch_size: usize,
}

impl SqliteIndex {
    pub async fn open(
        path: &Path,
        embedder: Option<Box<dyn Embedder>>,
        batch_size: usize,
    ) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate(&pool).await?;
        Ok(Self {
            pool,
            embedder,
            batch_size,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Embed every entry lacking a vector for the configured model, or whose
    /// vector was computed from different text. Returns how many were
    /// embedded; always `0` without an embedder.
    pub async fn embed_pending(&self) -> Result<u64> {
        let Some(embedder) = &self.embedder else {
            return Ok(0);
        };

        let pending: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT e.id, e.text, e.hash
            FROM entries e
            LEFT JOIN entry_vectors v
                ON v.entry_id = e.id AND v.model = ? AND v.hash = e.hash
            WHERE v.entry_id IS NULL
            ORDER BY e.id
            "#,
        )
        .bind(embedder.model_name())
        .fetch_all(&self.pool)
        .await?;

        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = pending.iter().map(|(_, text, _)| text.clone()).collect();
        let vectors = embedding::embed_batched(embedder.as_ref(), &texts, self.batch_size)
            .await
            .map_err(Error::index)?;

        let mut tx = self.pool.begin().await?;
        for ((id, _, hash), vector) in pending.iter().zip(&vectors) {
            upsert_vector(&mut *tx, embedder.as_ref(), id, hash, vector).await?;
        }
        tx.commit().await?;

        tracing::info!(
            model = embedder.model_name(),
            embedded = vectors.len(),
            "embedded pending entries"
        );
        Ok(vectors.len() as u64)
    }

    async fn vector_query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<IndexEntry>> {
        let query_vec = embedder
            .embed(&[text.to_string()])
            .await
            .map_err(Error::index)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::IndexOperation("empty embedding response".to_string()))?;

        let rows = sqlx::query(
            r#"
            SELECT v.entry_id, v.embedding, e.text
            FROM entry_vectors v
            JOIN entries e ON e.id = v.entry_id
            WHERE v.model = ?
            "#,
        )
        .bind(embedder.model_name())
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, IndexEntry)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let sim = embedding::cosine_similarity(&query_vec, &embedding::blob_to_vec(&blob));
                (
                    sim,
                    IndexEntry {
                        id: row.get("entry_id"),
                        text: row.get("text"),
                    },
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.truncate(top_k);
        Ok(scored.into_iter().map(|(_, e)| e).collect())
    }

    async fn keyword_query(&self, text: &str, top_k: usize) -> Result<Vec<IndexEntry>> {
        let Some(match_expr) = fts_match_expr(text) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT entry_id, text
            FROM entries_fts
            WHERE entries_fts MATCH ?
            ORDER BY rank, entry_id
            LIMIT ?
            "#,
        )
        .bind(match_expr)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| IndexEntry {
                id: row.get("entry_id"),
                text: row.get("text"),
            })
            .collect())
    }
}

#[async_trait]
impl Index for SqliteIndex {
    async fn insert(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        // Embed before opening the transaction so a provider failure leaves
        // the table untouched.
        let vectors = match &self.embedder {
            Some(embedder) => {
                let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
                let vectors = embedding::embed_batched(embedder.as_ref(), &texts, self.batch_size)
                    .await
                    .map_err(Error::index)?;
                Some((embedder.as_ref(), vectors))
            }
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        for (i, entry) in entries.iter().enumerate() {
            sqlx::query("DELETE FROM entries_fts WHERE entry_id = ?")
                .bind(&entry.id)
                .execute(&mut *tx)
                .await?;

            let hash = text_hash(&entry.text);
            sqlx::query(
                r#"
                INSERT INTO entries (id, text, hash) VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET text = excluded.text, hash = excluded.hash
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.text)
            .bind(&hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO entries_fts (entry_id, text) VALUES (?, ?)")
                .bind(&entry.id)
                .bind(&entry.text)
                .execute(&mut *tx)
                .await?;

            if let Some((embedder, vectors)) = &vectors {
                upsert_vector(&mut *tx, *embedder, &entry.id, &hash, &vectors[i]).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_id_prefix(&self, prefix: &str) -> Result<u64> {
        // substr() instead of LIKE: file names routinely contain `_`.
        let len = prefix.chars().count() as i64;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entry_vectors WHERE substr(entry_id, 1, ?) = ?")
            .bind(len)
            .bind(prefix)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM entries_fts WHERE substr(entry_id, 1, ?) = ?")
            .bind(len)
            .bind(prefix)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM entries WHERE substr(id, 1, ?) = ?")
            .bind(len)
            .bind(prefix)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;

        for id in ids {
            sqlx::query("DELETE FROM entry_vectors WHERE entry_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM entries_fts WHERE entry_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            removed += sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(removed)
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexEntry>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        match &self.embedder {
            Some(embedder) => {
                self.embed_pending().await?;
                self.vector_query(embedder.as_ref(), text, top_k).await
            }
            None => self.keyword_query(text, top_k).await,
        }
    }

    async fn entry_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM entries ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entry_vectors (
            entry_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 has no IF NOT EXISTS on older SQLite builds.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='entries_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query("CREATE VIRTUAL TABLE entries_fts USING fts5(entry_id UNINDEXED, text)")
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn upsert_vector(
    conn: &mut SqliteConnection,
    embedder: &dyn Embedder,
    entry_id: &str,
    hash: &str,
    vector: &[f32],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO entry_vectors (entry_id, model, dims, hash, embedding) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(entry_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            hash = excluded.hash,
            embedding = excluded.embedding
        "#,
    )
    .bind(entry_id)
    .bind(embedder.model_name())
    .bind(embedder.dims() as i64)
    .bind(hash)
    .bind(embedding::vec_to_blob(vector))
    .execute(conn)
    .await?;
    Ok(())
}

/// Quote each term and OR them, so natural-language questions never hit
/// FTS5 syntax (`?`, `'`, `AND`, column filters).
fn fts_match_expr(text: &str) -> Option<String> {
    let terms = query_terms(text);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
