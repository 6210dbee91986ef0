use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// A scalar metadata value
///
/// The vector store only accepts flat mappings of primitives, so nested values are
/// not representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Interprets the value as a record id
    ///
    /// Upstream storage may hand back ids as integers or as their string form;
    /// both are accepted.
    pub fn as_record_id(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(value) => Some(*value),
            MetadataValue::Str(value) => value.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Bool(value) => write!(f, "{}", value),
            MetadataValue::Int(value) => write!(f, "{}", value),
            MetadataValue::Float(value) => write!(f, "{}", value),
            MetadataValue::Str(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Str(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Int(value as i64)
    }
}

/// Flat metadata attached to every stored chunk
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata keys written at ingestion time
pub mod keys {
    pub const MOVIE_ID: &str = "movie_id";
    pub const TITLE: &str = "title";
    pub const YEAR: &str = "year";
    pub const GENRE: &str = "genre";
    pub const POSTER_URL: &str = "poster_url";
    pub const DETAIL_LINK: &str = "detail_link";
}

/// Builds the stored id of a chunk: `movie_<record_id>_chunk_<ordinal>`
pub fn chunk_id(record_id: i64, ordinal: usize) -> String {
    format!("movie_{}_chunk_{}", record_id, ordinal)
}

/// A chunk waiting to be embedded
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// One nearest-neighbour hit from the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine distance to the query; smaller is closer
    pub distance: f32,
}

impl RetrievedChunk {
    /// String form of a metadata field, empty when absent
    pub fn field(&self, key: &str) -> String {
        self.metadata
            .get(key)
            .map(|value| value.to_string())
            .unwrap_or_default()
    }
}
