use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use filmmate_api::{
    db::{Catalog, InMemoryCatalog, SqliteVectorIndex},
    error::{AppError, AppResult},
    middleware::REQUEST_ID_HEADER,
    models::CatalogRecord,
    routes::{create_router, AppState},
    services::{
        recommendations::{FALLBACK_MESSAGE, NOT_CONFIGURED_MESSAGE},
        ChatModel, Chunker, DocumentBuilder, Embedder, IngestionPipeline, IngestionSettings,
        RecommendationOrchestrator, RetrievalService,
    },
};

const COLLECTION: &str = "movies_collection";

/// Embeds text onto a few genre axes so similar genres land close together
struct KeywordEmbedder;

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let axis = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
        vec![axis("horror"), axis("comedy"), axis("crime"), 0.1]
    }
}

#[async_trait::async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

enum ChatBehaviour {
    Reply(&'static str),
    Fail,
    Unconfigured,
}

struct ScriptedChat(ChatBehaviour);

#[async_trait::async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, _prompt: &str, _temperature: f32) -> AppResult<String> {
        match self.0 {
            ChatBehaviour::Reply(raw) => Ok(raw.to_string()),
            _ => Err(AppError::ExternalApi("429 Too Many Requests".to_string())),
        }
    }

    fn is_configured(&self) -> bool {
        !matches!(self.0, ChatBehaviour::Unconfigured)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn movie(id: i64, title: &str, year: i32, genres: &[&str], description: &str) -> CatalogRecord {
    CatalogRecord {
        year: Some(year),
        description: Some(description.to_string()),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        poster: Some(format!("posters/{}.jpg", id)),
        ..CatalogRecord::new(id, title)
    }
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![
        movie(1, "Alien", 1979, &["Horror", "Science Fiction"], "A crew meets a deadly lifeform."),
        movie(2, "The Thing", 1982, &["Horror"], "An Antarctic team faces a shapeshifter."),
        movie(3, "Heat", 1995, &["Crime", "Drama"], "A detective hunts a master thief."),
        movie(4, "Airplane!", 1980, &["Comedy"], "A pilot-less flight goes sideways."),
    ])
}

/// Builds a server over a freshly ingested store; the `TempDir` must outlive the server
async fn create_test_server(chat: ChatBehaviour) -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(SqliteVectorIndex::open(dir.path()).await.unwrap());
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
    let catalog: Arc<dyn Catalog> = Arc::new(catalog());

    let pipeline = IngestionPipeline::new(
        catalog.clone(),
        embedder.clone(),
        index.clone(),
        DocumentBuilder::default(),
        IngestionSettings {
            collection: COLLECTION.to_string(),
            chunker: Chunker::default(),
            batch_size: 2,
            batch_delay: Duration::ZERO,
        },
    );
    let report = pipeline.run().await.unwrap();
    assert_eq!(report.chunks_persisted, 4);

    let retrieval = Arc::new(RetrievalService::new(embedder, index, COLLECTION));
    let recommender = Arc::new(RecommendationOrchestrator::new(
        retrieval.clone(),
        Arc::new(ScriptedChat(chat)),
        0.7,
    ));

    let app = create_router(Arc::new(AppState {
        catalog,
        retrieval,
        recommender,
    }));

    (TestServer::new(app).unwrap(), dir)
}

#[tokio::test]
async fn test_health_check() {
    let (server, _dir) = create_test_server(ChatBehaviour::Fail).await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (server, _dir) = create_test_server(ChatBehaviour::Fail).await;

    let response = server
        .get("/health")
        .add_header(
            REQUEST_ID_HEADER.parse::<axum::http::HeaderName>().unwrap(),
            "trace-abc".parse::<axum::http::HeaderValue>().unwrap(),
        )
        .await;
    assert_eq!(response.header(REQUEST_ID_HEADER), "trace-abc");

    let response = server.get("/health").await;
    assert!(!response.header(REQUEST_ID_HEADER).is_empty());
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let (server, _dir) = create_test_server(ChatBehaviour::Fail).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "message": "   " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({
        "status": "error",
        "message": "Please say something!"
    }));
}

#[tokio::test]
async fn test_recommendation_success_shape() {
    let (server, _dir) = create_test_server(ChatBehaviour::Reply(
        r#"```json
{"text_response": "Two chillers for tonight!",
 "recommendations": [
   {"title": "The Thing", "year": "1982", "genre": "Horror", "reason": "Paranoia on ice",
    "poster_url": "/media/posters/2.jpg", "detail_link": "/movies/2/"}
 ]}
```"#,
    ))
    .await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "message": "something scary" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Two chillers for tonight!");
    assert_eq!(body["movies"][0]["title"], "The Thing");
    assert_eq!(body["movies"][0]["year"], 1982);
    assert_eq!(body["movies"][0]["detail_link"], "/movies/2/");
}

#[tokio::test]
async fn test_recommendation_failure_falls_back() {
    let (server, _dir) = create_test_server(ChatBehaviour::Fail).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "message": "something funny" }))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "status": "success",
        "message": FALLBACK_MESSAGE,
        "movies": []
    }));
}

#[tokio::test]
async fn test_unconfigured_assistant_reports_it() {
    let (server, _dir) = create_test_server(ChatBehaviour::Unconfigured).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "message": "anything good?" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], NOT_CONFIGURED_MESSAGE);
    assert_eq!(body["movies"], json!([]));
}

#[tokio::test]
async fn test_similar_movies() {
    let (server, _dir) = create_test_server(ChatBehaviour::Fail).await;

    let response = server
        .get("/api/v1/movies/1/similar")
        .add_query_param("top_k", 2)
        .await;

    response.assert_status_ok();
    let movies: Vec<Value> = response.json();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[0]["id"], 2);
    assert_eq!(movies[0]["title"], "The Thing");
    assert_eq!(movies[0]["year"], 1982);
    assert_eq!(movies[0]["poster"], "/media/posters/2.jpg");
    assert!(movies.iter().all(|m| m["id"] != 1));
}

#[tokio::test]
async fn test_similar_defaults_to_four_distinct_movies() {
    let (server, _dir) = create_test_server(ChatBehaviour::Fail).await;

    let response = server.get("/api/v1/movies/3/similar").await;

    response.assert_status_ok();
    let movies: Vec<Value> = response.json();
    // Only three other movies exist
    assert_eq!(movies.len(), 3);
    assert!(movies.iter().all(|m| m["id"] != 3));
}

#[tokio::test]
async fn test_similar_unknown_movie_is_404() {
    let (server, _dir) = create_test_server(ChatBehaviour::Fail).await;

    let response = server.get("/api/v1/movies/999/similar").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
