pub mod chunker;
pub mod document;
pub mod ingestion;
pub mod providers;
pub mod recommendations;
pub mod retrieval;

pub use chunker::{chunk_text, Chunker};
pub use document::DocumentBuilder;
pub use ingestion::{IngestionPipeline, IngestionReport, IngestionSettings, IngestionState};
pub use providers::{ChatModel, Embedder, GeminiChat, GeminiEmbedder};
pub use recommendations::RecommendationOrchestrator;
pub use retrieval::RetrievalService;
