//! Google Generative Language API providers
//!
//! Embeddings go through `embedContent` (queries) and `batchEmbedContents`
//! (documents); chat goes through `generateContent`. The API key travels in the
//! `x-goog-api-key` header.

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::providers::{ChatModel, Embedder},
};
use reqwest::{Client as HttpClient, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-goog-api-key";

fn build_http_client(config: &Config) -> AppResult<HttpClient> {
    Ok(HttpClient::builder().timeout(config.http_timeout()).build()?)
}

/// Model ids are addressed as `models/<name>`
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn require_key(api_key: &Option<String>) -> AppResult<&str> {
    api_key
        .as_deref()
        .ok_or_else(|| AppError::Config("GOOGLE_API_KEY is not set".to_string()))
}

/// Reads a successful response body, or turns an error status into `ExternalApi`
async fn read_body(response: Response) -> AppResult<String> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(body);
    }

    let detail = serde_json::from_str::<GeminiError>(&body)
        .map(|e| {
            format!(
                "{} - {}",
                e.error.status.unwrap_or_else(|| "UNKNOWN".to_string()),
                e.error.message
            )
        })
        .unwrap_or(body);

    Err(AppError::ExternalApi(format!(
        "Gemini API returned status {}: {}",
        status, detail
    )))
}

fn parse<T: DeserializeOwned>(body: &str, what: &str) -> AppResult<T> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, response = %body, "Failed to deserialize Gemini {}", what);
        AppError::MalformedResponse(format!("Failed to parse Gemini {}: {}", what, e))
    })
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'a str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    status: Option<String>,
}

// ============================================================================
// Embeddings
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini embedding gateway
#[derive(Clone)]
pub struct GeminiEmbedder {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(
        http_client: HttpClient,
        api_key: Option<String>,
        api_url: String,
        model: &str,
    ) -> Self {
        Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model_path(model),
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self::new(
            build_http_client(config)?,
            config.api_key().map(str::to_string),
            config.gemini_api_url.clone(),
            &config.embedding_model,
        ))
    }

    fn check_text(text: &str) -> AppResult<()> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Cannot embed empty text".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let api_key = require_key(&self.api_key)?;
        Self::check_text(text)?;

        let url = format!("{}/{}:embedContent", self.api_url, self.model);
        let request = EmbedContentRequest {
            model: &self.model,
            content: Content::text(None, text),
            task_type: "RETRIEVAL_QUERY",
        };

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response).await?;
        let parsed: EmbedContentResponse = parse(&body, "embedding response")?;

        if parsed.embedding.values.is_empty() {
            return Err(AppError::MalformedResponse(
                "Gemini returned an empty embedding".to_string(),
            ));
        }

        Ok(parsed.embedding.values)
    }

    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let api_key = require_key(&self.api_key)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            Self::check_text(text)?;
        }

        let url = format!("{}/{}:batchEmbedContents", self.api_url, self.model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content::text(None, text),
                    task_type: "RETRIEVAL_DOCUMENT",
                })
                .collect(),
        };

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response).await?;
        let parsed: BatchEmbedResponse = parse(&body, "batch embedding response")?;

        if parsed.embeddings.len() != texts.len() {
            return Err(AppError::MalformedResponse(format!(
                "Gemini returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = parsed.embeddings.into_iter().map(|e| e.values).collect();
        let dimension = vectors[0].len();
        if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            return Err(AppError::MalformedResponse(
                "Gemini returned embeddings of inconsistent dimension".to_string(),
            ));
        }

        tracing::debug!(
            inputs = texts.len(),
            dimension,
            model = %self.model,
            "Batch embedded"
        );

        Ok(vectors)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini chat gateway
#[derive(Clone)]
pub struct GeminiChat {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl GeminiChat {
    pub fn new(
        http_client: HttpClient,
        api_key: Option<String>,
        api_url: String,
        model: &str,
    ) -> Self {
        Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model_path(model),
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self::new(
            build_http_client(config)?,
            config.api_key().map(str::to_string),
            config.gemini_api_url.clone(),
            &config.chat_model,
        ))
    }
}

#[async_trait::async_trait]
impl ChatModel for GeminiChat {
    async fn complete(&self, prompt: &str, temperature: f32) -> AppResult<String> {
        let api_key = require_key(&self.api_key)?;

        let url = format!("{}/{}:generateContent", self.api_url, self.model);
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            generation_config: GenerationConfig { temperature },
        };

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response).await?;
        let parsed: GenerateContentResponse = parse(&body, "chat response")?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::MalformedResponse(
                "Gemini returned no text candidates".to_string(),
            ));
        }

        Ok(text)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
