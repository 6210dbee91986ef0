use crate::models::{keys, CatalogRecord, Metadata};

/// Builds the canonical text and metadata for catalog records
///
/// Pure and deterministic: building the same record twice yields identical output,
/// which is what lets a re-ingestion reproduce the same chunk ids.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    media_url: String,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new("/media/")
    }
}

impl DocumentBuilder {
    /// `media_url` prefixes poster paths stored relative to the media root
    pub fn new(media_url: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
        }
    }

    /// Returns `(canonical_text, metadata)` for a record
    pub fn build(&self, record: &CatalogRecord) -> (String, Metadata) {
        (canonical_text(record), self.metadata(record))
    }

    /// Flat metadata snapshot stored alongside every chunk of the record
    pub fn metadata(&self, record: &CatalogRecord) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(keys::MOVIE_ID.to_string(), record.id.into());
        metadata.insert(keys::TITLE.to_string(), record.title.as_str().into());
        metadata.insert(
            keys::YEAR.to_string(),
            record.known_year().unwrap_or(0).into(),
        );
        metadata.insert(keys::GENRE.to_string(), genre_label(record).into());
        metadata.insert(
            keys::POSTER_URL.to_string(),
            resolve_poster(record, &self.media_url).into(),
        );
        metadata.insert(
            keys::DETAIL_LINK.to_string(),
            resolve_detail_link(record).into(),
        );
        metadata
    }
}

/// Comma-joined genre labels
pub fn genre_label(record: &CatalogRecord) -> String {
    record.genres.join(", ")
}

/// Labelled concatenation of title, year, genres and plot
///
/// Segments with nothing to say are left out, so a record without any content
/// produces an empty string rather than a string of bare labels.
pub fn canonical_text(record: &CatalogRecord) -> String {
    let mut segments = Vec::with_capacity(4);

    let title = record.title.trim();
    if !title.is_empty() {
        segments.push(format!("Title: {}.", title));
    }
    if let Some(year) = record.known_year() {
        segments.push(format!("Year: {}.", year));
    }
    if !record.genres.is_empty() {
        segments.push(format!("Genre: {}.", genre_label(record)));
    }
    let plot = record.description.as_deref().unwrap_or("").trim();
    if !plot.is_empty() {
        segments.push(format!("Plot: {}", plot));
    }

    segments.join(" ")
}

/// Text used to look up movies similar to `record`
pub fn similarity_query_text(record: &CatalogRecord) -> String {
    format!(
        "{} {} {}",
        record.title,
        record.genres.join(" "),
        record.description.as_deref().unwrap_or("")
    )
    .trim()
    .to_string()
}

/// Public URL of the record's poster, or an empty string when it has none
pub fn resolve_poster(record: &CatalogRecord, media_url: &str) -> String {
    match record.poster.as_deref().map(str::trim) {
        None | Some("") => String::new(),
        Some(poster) if is_absolute_url(poster) => poster.to_string(),
        Some(poster) => format!(
            "{}/{}",
            media_url.trim_end_matches('/'),
            poster.trim_start_matches('/')
        ),
    }
}

/// The record's detail link, or the conventional `/movies/<id>/` path
pub fn resolve_detail_link(record: &CatalogRecord) -> String {
    record
        .detail_link
        .as_deref()
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("/movies/{}/", record.id))
}

fn is_absolute_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://") || value.starts_with('/')
}
