use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::VectorIndex,
    error::{AppError, AppResult},
    models::{keys, RetrievedChunk, SimilarMovie},
    services::providers::Embedder,
};

/// Chunks handed to the chat model as grounding context
pub const DEFAULT_CONTEXT_RESULTS: usize = 10;

/// Similar movies shown on a detail page
pub const DEFAULT_SIMILAR_TOP_K: usize = 4;

/// Candidates fetched before exclusion and deduplication
pub const SIMILAR_CANDIDATES: usize = 20;

/// Query-time nearest-neighbour retrieval over the movie collection
///
/// The public entry points fail soft: any error is logged and turned into an empty
/// result. The `try_` variants surface the error instead.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
        }
    }

    async fn search(&self, text: &str, n_results: usize) -> AppResult<Vec<RetrievedChunk>> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("query text is empty".to_string()));
        }
        let query_vector = self.embedder.embed_one(text).await?;
        self.index.query(&self.collection, &query_vector, n_results).await
    }

    /// Broad top-`n` chunks for grounding a chat answer
    pub async fn recommend_context(&self, user_text: &str, n: usize) -> Vec<RetrievedChunk> {
        match self.try_recommend_context(user_text, n).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "Context retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    /// Like [`Self::recommend_context`], but surfaces failures
    ///
    /// The collection is created if missing so a fresh install answers with no
    /// context instead of failing.
    pub async fn try_recommend_context(
        &self,
        user_text: &str,
        n: usize,
    ) -> AppResult<Vec<RetrievedChunk>> {
        self.index.get_or_create(&self.collection).await?;
        let chunks = self.search(user_text, n).await?;

        tracing::debug!(results = chunks.len(), "Context retrieved");

        Ok(chunks)
    }

    /// Up to `top_k` distinct movies similar to `record_text`, excluding one movie
    pub async fn similar_to(
        &self,
        record_text: &str,
        exclude_record_id: i64,
        top_k: usize,
    ) -> Vec<SimilarMovie> {
        match self.try_similar_to(record_text, exclude_record_id, top_k).await {
            Ok(movies) => movies,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    movie_id = exclude_record_id,
                    "Similar movie lookup failed"
                );
                Vec::new()
            }
        }
    }

    /// Like [`Self::similar_to`], but surfaces failures
    pub async fn try_similar_to(
        &self,
        record_text: &str,
        exclude_record_id: i64,
        top_k: usize,
    ) -> AppResult<Vec<SimilarMovie>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self
            .search(record_text, SIMILAR_CANDIDATES.max(top_k))
            .await?;

        Ok(dedupe_similar(candidates, exclude_record_id, top_k))
    }
}

/// Collapses ranked chunks into distinct movies
///
/// Chunks of the excluded movie and chunks whose movie id is unreadable are
/// dropped; the first chunk seen for each movie wins.
pub fn dedupe_similar(
    chunks: Vec<RetrievedChunk>,
    exclude_record_id: i64,
    top_k: usize,
) -> Vec<SimilarMovie> {
    let mut seen: HashSet<i64> = HashSet::from([exclude_record_id]);
    let mut movies = Vec::with_capacity(top_k);

    for chunk in chunks {
        if movies.len() >= top_k {
            break;
        }

        let Some(movie_id) = chunk
            .metadata
            .get(keys::MOVIE_ID)
            .and_then(|value| value.as_record_id())
        else {
            tracing::debug!(id = %chunk.id, "Chunk without a movie id, skipping");
            continue;
        };

        if !seen.insert(movie_id) {
            continue;
        }

        movies.push(SimilarMovie {
            id: movie_id,
            title: chunk.field(keys::TITLE),
            year: chunk
                .metadata
                .get(keys::YEAR)
                .and_then(|value| value.as_record_id())
                .filter(|year| *year > 0),
            poster: chunk.field(keys::POSTER_URL),
        });
    }

    movies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::vector::MockVectorIndex;
    use crate::db::SqliteVectorIndex;
    use crate::models::{chunk_id, Metadata, MetadataValue};
    use crate::services::providers::MockEmbedder;

    const COLLECTION: &str = "movies_collection";

    fn chunk(movie_id: MetadataValue, ordinal: usize, distance: f32) -> RetrievedChunk {
        let id = movie_id.as_record_id().unwrap_or(-1);
        let mut metadata = Metadata::new();
        metadata.insert(keys::MOVIE_ID.to_string(), movie_id);
        metadata.insert(keys::TITLE.to_string(), format!("Movie {}", id).into());
        metadata.insert(keys::YEAR.to_string(), 2000i64.into());
        metadata.insert(keys::POSTER_URL.to_string(), "".into());
        RetrievedChunk {
            id: chunk_id(id, ordinal),
            text: String::new(),
            metadata,
            distance,
        }
    }

    fn embedder_returning(vector: Vec<f32>) -> MockEmbedder {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed_one()
            .returning(move |_| Ok(vector.clone()));
        embedder
    }

    /// Five chunks of movie 7 nearest the query, then three chunks each of 1, 2, 3
    async fn seeded_index() -> (tempfile::TempDir, Arc<SqliteVectorIndex>) {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteVectorIndex::open(dir.path()).await.unwrap();
        index.replace_collection(COLLECTION).await.unwrap();

        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut metadatas = Vec::new();
        let mut vectors = Vec::new();

        for ordinal in 0..5 {
            let movie_id = if ordinal % 2 == 0 {
                MetadataValue::Int(7)
            } else {
                MetadataValue::from("7")
            };
            let mut metadata = Metadata::new();
            metadata.insert(keys::MOVIE_ID.to_string(), movie_id);
            ids.push(chunk_id(7, ordinal));
            texts.push(format!("seven {}", ordinal));
            metadatas.push(metadata);
            vectors.push(vec![1.0, 0.01 * ordinal as f32]);
        }
        for movie_id in 1..=3i64 {
            for ordinal in 0..3 {
                let mut metadata = Metadata::new();
                metadata.insert(keys::MOVIE_ID.to_string(), movie_id.into());
                metadata.insert(keys::TITLE.to_string(), format!("Movie {}", movie_id).into());
                ids.push(chunk_id(movie_id, ordinal));
                texts.push(format!("movie {} part {}", movie_id, ordinal));
                metadatas.push(metadata);
                vectors.push(vec![1.0, 0.2 * movie_id as f32 + 0.01 * ordinal as f32]);
            }
        }

        index
            .upsert(COLLECTION, &ids, &texts, &metadatas, &vectors)
            .await
            .unwrap();
        (dir, Arc::new(index))
    }

    #[test]
    fn test_dedupe_excludes_string_and_numeric_forms() {
        let chunks = vec![
            chunk(MetadataValue::Int(7), 0, 0.0),
            chunk(MetadataValue::from("7"), 1, 0.1),
            chunk(MetadataValue::Int(1), 0, 0.2),
            chunk(MetadataValue::from("1"), 1, 0.3),
            chunk(MetadataValue::Int(2), 0, 0.4),
        ];

        let movies = dedupe_similar(chunks, 7, 4);
        let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(movies[0].title, "Movie 1");
        assert_eq!(movies[0].year, Some(2000));
    }

    #[test]
    fn test_dedupe_stops_at_top_k() {
        let chunks = (1..=10)
            .map(|id| chunk(MetadataValue::Int(id), 0, id as f32))
            .collect();
        let movies = dedupe_similar(chunks, 99, 4);
        assert_eq!(movies.len(), 4);
        assert_eq!(movies.last().map(|m| m.id), Some(4));
    }

    #[test]
    fn test_dedupe_skips_chunks_without_movie_id() {
        let mut orphan = chunk(MetadataValue::Int(5), 0, 0.0);
        orphan.metadata.remove(keys::MOVIE_ID);
        let movies = dedupe_similar(vec![orphan], 7, 4);
        assert!(movies.is_empty());
    }

    #[tokio::test]
    async fn test_similar_to_excludes_current_movie() {
        let (_dir, index) = seeded_index().await;
        let service = RetrievalService::new(
            Arc::new(embedder_returning(vec![1.0, 0.0])),
            index,
            COLLECTION,
        );

        let movies = service.similar_to("Seven crime thriller", 7, 4).await;

        let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_recommend_context_returns_ranked_chunks() {
        let (_dir, index) = seeded_index().await;
        let service = RetrievalService::new(
            Arc::new(embedder_returning(vec![1.0, 0.0])),
            index,
            COLLECTION,
        );

        let chunks = service.recommend_context("something dark", 10).await;
        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[0].id, chunk_id(7, 0));
        for pair in chunks.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[tokio::test]
    async fn test_recommend_context_on_fresh_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(SqliteVectorIndex::open(dir.path()).await.unwrap());
        let service = RetrievalService::new(
            Arc::new(embedder_returning(vec![1.0, 0.0])),
            index.clone(),
            COLLECTION,
        );

        let chunks = service.try_recommend_context("anything", 10).await.unwrap();
        assert!(chunks.is_empty());
        assert!(index.collection_exists(COLLECTION).await.unwrap());
    }

    #[tokio::test]
    async fn test_similar_to_missing_collection_fails_soft() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(SqliteVectorIndex::open(dir.path()).await.unwrap());
        let service = RetrievalService::new(
            Arc::new(embedder_returning(vec![1.0, 0.0])),
            index,
            COLLECTION,
        );

        assert!(matches!(
            service.try_similar_to("text", 1, 4).await,
            Err(AppError::NotFound(_))
        ));
        assert!(service.similar_to("text", 1, 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_soft() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed_one()
            .returning(|_| Err(AppError::ExternalApi("503".to_string())));

        let mut index = MockVectorIndex::new();
        index.expect_get_or_create().returning(|_| Ok(()));
        index.expect_query().never();

        let service = RetrievalService::new(Arc::new(embedder), Arc::new(index), COLLECTION);

        assert!(service.recommend_context("hello", 10).await.is_empty());
        assert!(service.similar_to("hello", 1, 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_similar_to_requests_wider_candidate_pool() {
        let mut index = MockVectorIndex::new();
        index
            .expect_query()
            .withf(|collection, _, k| collection.to_string() == COLLECTION && *k == SIMILAR_CANDIDATES)
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let service = RetrievalService::new(
            Arc::new(embedder_returning(vec![1.0])),
            Arc::new(index),
            COLLECTION,
        );

        assert!(service.try_similar_to("text", 1, 4).await.unwrap().is_empty());
    }
}
