use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::models::Recommendation;

use super::AppState;

const EMPTY_MESSAGE_REPLY: &str = "Please say something!";

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendationReply {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movies: Option<Vec<Recommendation>>,
}

/// Handler for the chat recommendation endpoint
///
/// Upstream failures never surface as errors here; the orchestrator turns them
/// into a fallback answer.
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecommendationRequest>,
) -> (StatusCode, Json<RecommendationReply>) {
    let message = request.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(RecommendationReply {
                status: "error",
                message: EMPTY_MESSAGE_REPLY.to_string(),
                movies: None,
            }),
        );
    }

    let response = state.recommender.recommend(message).await;

    (
        StatusCode::OK,
        Json(RecommendationReply {
            status: "success",
            message: response.text_response,
            movies: Some(response.recommendations),
        }),
    )
}
