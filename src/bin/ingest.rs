use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use filmmate_api::{
    config::Config,
    db::{open_catalog, SqliteVectorIndex},
    services::{DocumentBuilder, GeminiEmbedder, IngestionPipeline, IngestionSettings},
};

/// Rebuilds the movie vector collection from the catalog
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("filmmate_api=info,ingest=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store_dir = config.vector_store_path();

    let catalog = open_catalog(&config).await?;
    let index = SqliteVectorIndex::open(&store_dir)
        .await
        .with_context(|| format!("Failed to open vector store at {}", store_dir.display()))?;
    let embedder = GeminiEmbedder::from_config(&config)?;

    let pipeline = IngestionPipeline::new(
        catalog,
        Arc::new(embedder),
        Arc::new(index),
        DocumentBuilder::new(config.media_url.clone()),
        IngestionSettings::from_config(&config)?,
    );

    let report = pipeline.run().await.context("Ingestion aborted")?;

    tracing::info!(
        state = %report.state,
        records = report.records,
        records_indexed = report.records_indexed,
        chunks = report.chunks,
        batches = report.batches,
        failed_batches = report.failed_batches,
        chunks_persisted = report.chunks_persisted,
        elapsed_ms = report.elapsed.as_millis() as u64,
        store = %store_dir.display(),
        "Ingestion finished"
    );

    Ok(())
}
