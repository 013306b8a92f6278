//! SQLite-backed chunk store.
//!
//! Chunks and their embeddings live in one table; search is brute-force
//! cosine similarity over every stored vector, which is plenty for the
//! few thousand chunks a documentation site produces.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    pub source: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    /// Cosine similarity, higher is closer.
    pub score: f32,
}

pub struct VectorStore {
    pool: SqlitePool,
    db_path: Option<PathBuf>,
}

impl VectorStore {
    pub async fn open(db_path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self {
            pool,
            db_path: Some(db_path.to_path_buf()),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Non-persistent store. A single pinned connection keeps the
    /// in-memory database alive for the lifetime of the pool.
    pub async fn in_memory() -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(ApiError::internal)?;
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path: None };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                title TEXT,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    pub async fn insert_batch(&self, items: &[(StoredChunk, Vec<f32>)]) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        for (chunk, embedding) in items {
            sqlx::query(
                "INSERT OR REPLACE INTO vector_chunks (chunk_id, content, source, title, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(&chunk.title)
            .bind(Self::serialize_embedding(embedding))
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }
        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, ApiError> {
        let rows = sqlx::query("SELECT chunk_id, content, source, title, embedding FROM vector_chunks")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter_map(|row| {
                let bytes: Vec<u8> = row.try_get("embedding").ok()?;
                let score = cosine_similarity(query_embedding, &Self::deserialize_embedding(&bytes));
                Some(ScoredChunk {
                    chunk: StoredChunk {
                        chunk_id: row.try_get("chunk_id").ok()?,
                        content: row.try_get("content").ok()?,
                        source: row.try_get("source").unwrap_or_default(),
                        title: row.try_get("title").unwrap_or(None),
                    },
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));
        Ok(scored)
    }

    pub async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM vector_chunks")
            .fetch_one(&self.pool)
            .await
            .map(|row| row.get(0))
            .map_err(ApiError::internal)?;
        Ok(count.max(0) as usize)
    }

    /// Drops every chunk and metadata entry.
    pub async fn clear(&self) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        sqlx::query("DELETE FROM vector_chunks")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query("DELETE FROM vector_meta")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>, ApiError> {
        let row = sqlx::query("SELECT value FROM vector_meta WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO vector_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, content: &str, source: &str) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            title: None,
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = VectorStore::in_memory().await.unwrap();
        store
            .insert_batch(&[
                (chunk("a", "tracing", "u1"), vec![1.0, 0.0, 0.0]),
                (chunk("b", "datasets", "u1"), vec![0.0, 1.0, 0.0]),
                (chunk("c", "mixed", "u2"), vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, "a");
        assert_eq!(results[1].chunk.chunk_id, "c");
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn persisted_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("index.db");
        {
            let store = VectorStore::open(&path).await.unwrap();
            store
                .insert_batch(&[(chunk("a", "text", "u"), vec![0.5, 0.5])])
                .await
                .unwrap();
            store.set_meta("embedding_model", "m1").await.unwrap();
            store.set_meta("embedding_model", "m2").await.unwrap();
        }

        let reopened = VectorStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert_eq!(reopened.get_meta("embedding_model").await.unwrap().as_deref(), Some("m2"));

        reopened.clear().await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 0);
        assert!(reopened.get_meta("embedding_model").await.unwrap().is_none());
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
