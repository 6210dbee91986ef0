use std::sync::Arc;

use crate::config::Config;

pub mod catalog;
pub mod postgres;
pub mod vector;

pub use catalog::{Catalog, InMemoryCatalog};
pub use postgres::{create_pool, PgCatalog};
pub use vector::{SqliteVectorIndex, VectorIndex};

/// Opens the configured catalog: the JSON file when `CATALOG_JSON` is set, PostgreSQL otherwise
pub async fn open_catalog(config: &Config) -> anyhow::Result<Arc<dyn Catalog>> {
    if let Some(path) = &config.catalog_json {
        tracing::info!(path = %path.display(), "Using JSON catalog");
        let catalog = InMemoryCatalog::from_json_file(path).await?;
        return Ok(Arc::new(catalog));
    }

    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Connected to catalog database");
    Ok(Arc::new(PgCatalog::new(pool)))
}
