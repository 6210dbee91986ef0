use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use filmmate_api::{
    config::Config,
    db::{open_catalog, SqliteVectorIndex},
    routes::{create_router, AppState},
    services::{GeminiChat, GeminiEmbedder, RecommendationOrchestrator, RetrievalService},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("filmmate_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if config.api_key().is_none() {
        tracing::warn!("GOOGLE_API_KEY is not set, chat and similarity will return fallbacks");
    }

    let catalog = open_catalog(&config).await?;
    let index = SqliteVectorIndex::open(&config.vector_store_path())
        .await
        .context("Failed to open vector store")?;
    let embedder = GeminiEmbedder::from_config(&config)?;
    let chat = GeminiChat::from_config(&config)?;

    let retrieval = Arc::new(RetrievalService::new(
        Arc::new(embedder),
        Arc::new(index),
        config.collection_name.clone(),
    ));
    let recommender = Arc::new(RecommendationOrchestrator::new(
        retrieval.clone(),
        Arc::new(chat),
        config.chat_temperature,
    ));

    let app = create_router(Arc::new(AppState {
        catalog,
        retrieval,
        recommender,
    }));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
