use serde::{Deserialize, Serialize};

/// A movie from the surrounding application's catalog
///
/// Read-only input to the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogRecord {
    pub id: i64,
    pub title: String,
    /// Release year; `None` (or 0 from older seed data) means unknown
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    /// Genre labels in display order
    #[serde(default)]
    pub genres: Vec<String>,
    /// Poster reference, either a storage path relative to the media root or a URL
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub detail_link: Option<String>,
}

impl CatalogRecord {
    /// Creates a record with only an id and a title
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            year: None,
            description: None,
            genres: Vec::new(),
            poster: None,
            detail_link: None,
        }
    }

    /// Release year, treating the 0 placeholder as unknown
    pub fn known_year(&self) -> Option<i32> {
        self.year.filter(|year| *year > 0)
    }
}
