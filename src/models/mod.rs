mod chunk;
mod movie;
mod recommendation;

pub use chunk::{
    chunk_id, keys, Metadata, MetadataValue, PendingChunk, RetrievedChunk,
};
pub use movie::CatalogRecord;
pub use recommendation::{Recommendation, RecommendationResponse, SimilarMovie};
