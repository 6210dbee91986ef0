use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::CatalogRecord,
};

/// Read-only access to the movie catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Every record in the catalog, ordered by id
    async fn all_records(&self) -> AppResult<Vec<CatalogRecord>>;

    async fn get_record(&self, id: i64) -> AppResult<Option<CatalogRecord>>;
}

/// Catalog held in memory
///
/// Used for local ingestion runs from an exported JSON file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: Vec<CatalogRecord>,
}

impl InMemoryCatalog {
    pub fn new(mut records: Vec<CatalogRecord>) -> Self {
        records.sort_by_key(|record| record.id);
        Self { records }
    }

    /// Loads a JSON array of records
    pub async fn from_json_file(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Internal(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        let records: Vec<CatalogRecord> = serde_json::from_str(&raw).map_err(|e| {
            AppError::InvalidInput(format!("Invalid catalog {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), records = records.len(), "Loaded JSON catalog");

        Ok(Self::new(records))
    }
}

#[async_trait::async_trait]
impl Catalog for InMemoryCatalog {
    async fn all_records(&self) -> AppResult<Vec<CatalogRecord>> {
        Ok(self.records.clone())
    }

    async fn get_record(&self, id: i64) -> AppResult<Option<CatalogRecord>> {
        Ok(self.records.iter().find(|record| record.id == id).cloned())
    }
}
