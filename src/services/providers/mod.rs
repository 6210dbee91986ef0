//! Model provider abstraction
//!
//! The retrieval pipeline talks to two remote capabilities: an embedding model that
//! turns text into vectors and a chat model that answers prompts. Both sit behind
//! traits so the pipeline can be exercised without network access.

use crate::error::AppResult;

pub mod gemini;

pub use gemini::{GeminiChat, GeminiEmbedder};

/// Trait for embedding model gateways
///
/// Gateways make exactly one attempt per call. Batching, pacing and retry policy
/// belong to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single query text
    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Embed a batch of document texts
    ///
    /// The returned vectors are positionally aligned with `texts` and share one
    /// dimension.
    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Whether a credential is available
    fn is_configured(&self) -> bool;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Trait for chat model gateways
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a fully rendered prompt and return the raw model text
    async fn complete(&self, prompt: &str, temperature: f32) -> AppResult<String>;

    /// Whether a credential is available
    ///
    /// Lets callers short-circuit before doing any other work.
    fn is_configured(&self) -> bool;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
