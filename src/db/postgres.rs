use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use super::catalog::Catalog;
use crate::{error::AppResult, models::CatalogRecord};

/// Creates a PostgreSQL connection pool for the catalog database
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Movies with their genre labels, in the order genres were attached
const MOVIES_SQL: &str = r#"
    SELECT
        m.id::BIGINT AS id,
        m.title::TEXT AS title,
        m.year::INT AS year,
        m.description::TEXT AS description,
        NULLIF(m.poster, '')::TEXT AS poster,
        COALESCE(
            ARRAY_AGG(g.name::TEXT ORDER BY mg.id) FILTER (WHERE g.name IS NOT NULL),
            '{}'::TEXT[]
        ) AS genres
    FROM movies_movie m
    LEFT JOIN movies_movie_genres mg ON mg.movie_id = m.id
    LEFT JOIN genres_genre g ON g.id = mg.genre_id
"#;

#[derive(Debug, FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    year: Option<i32>,
    description: Option<String>,
    poster: Option<String>,
    genres: Vec<String>,
}

impl From<MovieRow> for CatalogRecord {
    fn from(row: MovieRow) -> Self {
        CatalogRecord {
            id: row.id,
            title: row.title,
            year: row.year,
            description: row.description,
            genres: row.genres,
            poster: row.poster,
            detail_link: None,
        }
    }
}

/// Catalog backed by the web application's PostgreSQL tables
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn all_records(&self) -> AppResult<Vec<CatalogRecord>> {
        let sql = format!("{} GROUP BY m.id ORDER BY m.id", MOVIES_SQL);
        let rows: Vec<MovieRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        tracing::debug!(records = rows.len(), "Loaded catalog from database");

        Ok(rows.into_iter().map(CatalogRecord::from).collect())
    }

    async fn get_record(&self, id: i64) -> AppResult<Option<CatalogRecord>> {
        let sql = format!("{} WHERE m.id = $1 GROUP BY m.id", MOVIES_SQL);
        let row: Option<MovieRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(CatalogRecord::from))
    }
}
