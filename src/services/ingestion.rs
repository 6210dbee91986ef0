use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    config::Config,
    db::{Catalog, VectorIndex},
    error::{AppError, AppResult},
    models::{chunk_id, CatalogRecord, Metadata, PendingChunk},
    services::{chunker::Chunker, document::DocumentBuilder, providers::Embedder},
};

/// Stages of an ingestion run
///
/// `Idle -> Resetting -> Building -> BatchEmbedding (repeated) -> Done`. A failed
/// batch passes through `FailedBatch` and the run continues with the next batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Idle,
    Resetting,
    Building,
    BatchEmbedding,
    FailedBatch,
    Done,
}

impl Display for IngestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestionState::Idle => "idle",
            IngestionState::Resetting => "resetting",
            IngestionState::Building => "building",
            IngestionState::BatchEmbedding => "batch_embedding",
            IngestionState::FailedBatch => "failed_batch",
            IngestionState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Tunables for one ingestion pipeline
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub collection: String,
    pub chunker: Chunker,
    pub batch_size: usize,
    /// Pause inserted between consecutive batches to stay under provider rate limits
    pub batch_delay: Duration,
}

impl IngestionSettings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self {
            collection: config.collection_name.clone(),
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap)?,
            batch_size: config.ingest_batch_size.max(1),
            batch_delay: config.ingest_batch_delay(),
        })
    }
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub state: IngestionState,
    /// Records read from the catalog
    pub records: usize,
    /// Records that produced at least one chunk
    pub records_indexed: usize,
    /// Chunks built from the catalog
    pub chunks: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Chunks embedded and written to the index
    pub chunks_persisted: usize,
    pub elapsed: Duration,
}

impl Default for IngestionReport {
    fn default() -> Self {
        Self {
            state: IngestionState::Idle,
            records: 0,
            records_indexed: 0,
            chunks: 0,
            batches: 0,
            failed_batches: 0,
            chunks_persisted: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Rebuilds the vector collection from the catalog
///
/// Every run starts from an empty collection, so chunks of deleted or edited
/// records never survive. Resetting the collection and reading the catalog must
/// succeed; after that, a batch whose embedding or write fails is logged and
/// skipped while the remaining batches carry on.
pub struct IngestionPipeline {
    catalog: Arc<dyn Catalog>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    documents: DocumentBuilder,
    settings: IngestionSettings,
}

impl IngestionPipeline {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        documents: DocumentBuilder,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            catalog,
            embedder,
            index,
            documents,
            settings,
        }
    }

    fn enter(&self, report: &mut IngestionReport, state: IngestionState) {
        tracing::debug!(from = %report.state, to = %state, "Ingestion state change");
        report.state = state;
    }

    /// Runs a full rebuild
    pub async fn run(&self) -> AppResult<IngestionReport> {
        // Nothing is reset without a usable embedder
        if !self.embedder.is_configured() {
            return Err(AppError::Config(format!(
                "{} embedder has no API key, refusing to rebuild '{}'",
                self.embedder.name(),
                self.settings.collection
            )));
        }

        let started = Instant::now();
        let mut report = IngestionReport::default();

        self.enter(&mut report, IngestionState::Resetting);
        self.index.replace_collection(&self.settings.collection).await?;

        self.enter(&mut report, IngestionState::Building);
        let records = self.catalog.all_records().await?;
        let pending = self.build_chunks(&records, &mut report);

        tracing::info!(
            records = report.records,
            chunks = report.chunks,
            window = self.settings.chunker.window_size(),
            overlap = self.settings.chunker.overlap(),
            collection = %self.settings.collection,
            embedder = self.embedder.name(),
            "Processing movies"
        );

        let batch_size = self.settings.batch_size.max(1);
        for (n, batch) in pending.chunks(batch_size).enumerate() {
            if n > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            self.enter(&mut report, IngestionState::BatchEmbedding);
            report.batches += 1;
            let offset = n * batch_size;

            tracing::info!(batch = n, offset, size = batch.len(), "Embedding batch");

            match self.persist_batch(batch).await {
                Ok(()) => report.chunks_persisted += batch.len(),
                Err(e) => {
                    self.enter(&mut report, IngestionState::FailedBatch);
                    report.failed_batches += 1;
                    tracing::error!(
                        batch = n,
                        offset,
                        error = %e,
                        transient = e.is_transient(),
                        first_id = %batch[0].id,
                        "Batch failed, skipping"
                    );
                }
            }
        }

        self.enter(&mut report, IngestionState::Done);
        report.elapsed = started.elapsed();

        if report.failed_batches > 0 {
            tracing::warn!(
                failed_batches = report.failed_batches,
                batches = report.batches,
                chunks_persisted = report.chunks_persisted,
                chunks = report.chunks,
                "Ingestion finished with a partially populated collection"
            );
        } else {
            tracing::info!(
                batches = report.batches,
                chunks_persisted = report.chunks_persisted,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Ingestion finished"
            );
        }

        Ok(report)
    }

    /// Chunks every record into pending `(id, text, metadata)` entries
    ///
    /// Records whose canonical text is empty contribute nothing. Whitespace-only
    /// windows are dropped before ordinals are assigned.
    pub fn build_chunks(
        &self,
        records: &[CatalogRecord],
        report: &mut IngestionReport,
    ) -> Vec<PendingChunk> {
        let mut pending = Vec::new();

        for record in records {
            report.records += 1;
            let (text, metadata) = self.documents.build(record);
            let before = pending.len();

            pending.extend(
                self.settings
                    .chunker
                    .chunks(&text)
                    .filter(|chunk| !chunk.trim().is_empty())
                    .enumerate()
                    .map(|(ordinal, chunk)| PendingChunk {
                        id: chunk_id(record.id, ordinal),
                        text: chunk.to_string(),
                        metadata: metadata.clone(),
                    }),
            );

            if pending.len() > before {
                report.records_indexed += 1;
            } else {
                tracing::debug!(movie_id = record.id, "Record has no text, skipping");
            }
        }

        report.chunks = pending.len();
        pending
    }

    async fn persist_batch(&self, batch: &[PendingChunk]) -> AppResult<()> {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_many(&texts).await?;

        let ids: Vec<String> = batch.iter().map(|chunk| chunk.id.clone()).collect();
        let metadatas: Vec<Metadata> = batch.iter().map(|chunk| chunk.metadata.clone()).collect();

        self.index
            .upsert(&self.settings.collection, &ids, &texts, &metadatas, &vectors)
            .await
    }
}
