use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::SimilarMovie,
    services::{document::similarity_query_text, retrieval::DEFAULT_SIMILAR_TOP_K},
};

use super::AppState;

/// Upper bound on `top_k` accepted from callers
pub const MAX_SIMILAR_TOP_K: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_SIMILAR_TOP_K
}

/// Handler for the "more like this" endpoint
pub async fn similar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<SimilarQuery>,
) -> AppResult<Json<Vec<SimilarMovie>>> {
    let record = state
        .catalog
        .get_record(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", id)))?;

    let top_k = query.top_k.min(MAX_SIMILAR_TOP_K);
    let movies = state
        .retrieval
        .similar_to(&similarity_query_text(&record), record.id, top_k)
        .await;

    tracing::debug!(movie_id = id, found = movies.len(), "Similar movies resolved");

    Ok(Json(movies))
}
