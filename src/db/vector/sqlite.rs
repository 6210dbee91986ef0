//! SQLite-backed vector index.
//!
//! Entries live in one database file inside the configured store directory.
//! Search is brute-force cosine distance over the collection, which is ample for a
//! catalog-sized corpus.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use super::{cosine_distance, VectorIndex};
use crate::{
    error::{AppError, AppResult},
    models::{Metadata, RetrievedChunk},
};

/// File name of the index database inside the store directory
pub const INDEX_FILE_NAME: &str = "index.sqlite3";

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteVectorIndex {
    /// Opens (creating if needed) the index stored under `dir`
    pub async fn open(dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Internal(format!(
                "Failed to create vector store directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let db_path = dir.join(INDEX_FILE_NAME);
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await?;

        let index = Self { pool, db_path };
        index.init_schema().await?;

        tracing::info!(path = %index.db_path.display(), "Opened vector index");

        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recorded dimension of a collection; `Err(NotFound)` if it does not exist
    async fn dimension(&self, collection: &str) -> AppResult<Option<usize>> {
        let row: Option<Option<i64>> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?1")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(dimension) => Ok(dimension.map(|d| d as usize)),
            None => Err(AppError::NotFound(format!(
                "Collection '{}' does not exist",
                collection
            ))),
        }
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
}

#[async_trait::async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn replace_collection(&self, name: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM entries WHERE collection = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO collections (name, dimension, created_at) VALUES (?1, NULL, ?2)")
            .bind(name)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(collection = %name, removed, "Collection replaced");
        Ok(())
    }

    async fn get_or_create(&self, name: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO collections (name, dimension, created_at) VALUES (?1, NULL, ?2)",
        )
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> AppResult<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM collections WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn upsert(
        &self,
        collection: &str,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
        vectors: &[Vec<f32>],
    ) -> AppResult<()> {
        let len = ids.len();
        if texts.len() != len || metadatas.len() != len || vectors.len() != len {
            return Err(AppError::InvalidInput(format!(
                "upsert sequences differ in length: {} ids, {} texts, {} metadatas, {} vectors",
                len,
                texts.len(),
                metadatas.len(),
                vectors.len()
            )));
        }

        let recorded = self.dimension(collection).await?;
        if len == 0 {
            return Ok(());
        }

        let dimension = recorded.unwrap_or(vectors[0].len());
        if dimension == 0 {
            return Err(AppError::InvalidInput("vectors must not be empty".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(AppError::InvalidInput(format!(
                "vector of dimension {} does not match collection dimension {}",
                bad.len(),
                dimension
            )));
        }

        let mut tx = self.pool.begin().await?;

        for i in 0..len {
            let metadata = serde_json::to_string(&metadatas[i])
                .map_err(|e| AppError::Internal(format!("Metadata serialization error: {}", e)))?;

            sqlx::query(
                "INSERT OR REPLACE INTO entries (collection, id, document, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(collection)
            .bind(&ids[i])
            .bind(&texts[i])
            .bind(metadata)
            .bind(Self::serialize_embedding(&vectors[i]))
            .execute(&mut *tx)
            .await?;
        }

        if recorded.is_none() {
            sqlx::query("UPDATE collections SET dimension = ?1 WHERE name = ?2")
                .bind(dimension as i64)
                .bind(collection)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(collection = %collection, entries = len, "Upserted entries");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<RetrievedChunk>> {
        let dimension = self.dimension(collection).await?;
        if let Some(dimension) = dimension {
            if query_vector.len() != dimension {
                return Err(AppError::InvalidInput(format!(
                    "query vector of dimension {} does not match collection dimension {}",
                    query_vector.len(),
                    dimension
                )));
            }
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, String, String, Vec<u8>)> = sqlx::query_as(
            "SELECT id, document, metadata, embedding FROM entries WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<RetrievedChunk> = rows
            .into_iter()
            .map(|(id, text, metadata, embedding)| {
                let metadata = serde_json::from_str::<Metadata>(&metadata).unwrap_or_else(|e| {
                    tracing::warn!(id = %id, error = %e, "Unreadable metadata in vector index");
                    Metadata::new()
                });
                let distance =
                    cosine_distance(query_vector, &Self::deserialize_embedding(&embedding));
                RetrievedChunk {
                    id,
                    text,
                    metadata,
                    distance,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        self.dimension(collection).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
