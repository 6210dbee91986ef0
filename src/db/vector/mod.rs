//! Vector index abstraction
//!
//! A vector index holds named collections of `(id, vector, text, metadata)` entries
//! and answers k-nearest-neighbour queries over them. Collections are rebuilt
//! wholesale by ingestion and only read by the query paths.

use crate::{
    error::AppResult,
    models::{Metadata, RetrievedChunk},
};

pub mod sqlite;

pub use sqlite::SqliteVectorIndex;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Drops the collection if it exists and creates it again, empty
    async fn replace_collection(&self, name: &str) -> AppResult<()>;

    /// Ensures the collection exists without touching existing entries
    async fn get_or_create(&self, name: &str) -> AppResult<()>;

    async fn collection_exists(&self, name: &str) -> AppResult<bool>;

    /// Writes entries, overwriting any with the same id
    ///
    /// All five sequences must have the same length, and every vector must match the
    /// collection's dimension.
    async fn upsert(
        &self,
        collection: &str,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
        vectors: &[Vec<f32>],
    ) -> AppResult<()>;

    /// Returns up to `k` entries nearest to `query_vector`, closest first
    async fn query(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<RetrievedChunk>>;

    /// Number of entries in the collection
    async fn count(&self, collection: &str) -> AppResult<usize>;
}

/// Cosine distance, `1 - cosine_similarity`
///
/// Zero-norm vectors are treated as maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        2.0
    } else {
        1.0 - dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance_identical_is_zero() {
        assert!(cosine_distance(&[1.0, 2.0], &[2.0, 4.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal_is_one() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_degenerate_inputs() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 2.0);
        assert_eq!(cosine_distance(&[], &[]), 2.0);
    }
}
