use std::fmt::Write;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{keys, RecommendationResponse, RetrievedChunk},
    services::{
        providers::ChatModel,
        retrieval::{RetrievalService, DEFAULT_CONTEXT_RESULTS},
    },
};

/// Answer returned whenever the assistant cannot produce a valid response
pub const FALLBACK_MESSAGE: &str = "I'm having trouble accessing my movie database right now.";

/// Answer returned when no model credential is configured
pub const NOT_CONFIGURED_MESSAGE: &str = "The movie assistant is not configured yet.";

const PROMPT_INTRO: &str = "You are 'FilmMate', a friendly movie assistant.\n\nUser input:\n";

const PROMPT_CONTEXT_HEADER: &str =
    "\n\nMovies from our catalog that may be relevant (use them when helpful):\n";

const PROMPT_INSTRUCTIONS: &str = r#"

Instructions:
1. Decide whether the user wants recommendations or is asking a specific question.
2. Recommendations (e.g. "suggest a movie", "scary films"): put 1-3 movies in "recommendations" and a short friendly intro in "text_response".
3. Specific question (e.g. "tell me more about that", "who acted in it?", "what is the plot?"): answer it in "text_response" and leave "recommendations" as an empty list [].
4. Reply with STRICT JSON only, no markdown.

JSON structure:
{
    "text_response": "Your conversational answer (emojis welcome!)",
    "recommendations": [
        {
            "title": "Movie Title",
            "year": 2020,
            "genre": "Genre",
            "reason": "Why you picked it",
            "poster_url": "/media/...",
            "detail_link": "/movies/1/"
        }
    ]
}
"#;

/// Renders retrieved chunks as labelled blocks for the prompt
pub fn build_context_block(chunks: &[RetrievedChunk]) -> String {
    let mut context = String::new();
    for chunk in chunks {
        let _ = write!(
            context,
            "Title: {} (Year: {})\nGenre: {}\nPoster: {}\nLink: {}\nPlot: {}\n---\n",
            chunk.field(keys::TITLE),
            chunk.field(keys::YEAR),
            chunk.field(keys::GENRE),
            chunk.field(keys::POSTER_URL),
            chunk.field(keys::DETAIL_LINK),
            chunk.text,
        );
    }
    context
}

/// Assembles the prompt around the user's input and the context block
///
/// Both inputs are inserted verbatim; neither is scanned for placeholders.
pub fn build_prompt(user_text: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no matching movies found)"
    } else {
        context.trim_end()
    };
    let user_text = user_text.trim();

    let mut prompt = String::with_capacity(
        PROMPT_INTRO.len()
            + user_text.len()
            + PROMPT_CONTEXT_HEADER.len()
            + context.len()
            + PROMPT_INSTRUCTIONS.len(),
    );
    prompt.push_str(PROMPT_INTRO);
    prompt.push_str(user_text);
    prompt.push_str(PROMPT_CONTEXT_HEADER);
    prompt.push_str(context);
    prompt.push_str(PROMPT_INSTRUCTIONS);
    prompt
}

/// Removes a surrounding markdown code fence, if any
pub fn strip_code_fences(raw: &str) -> &str {
    let mut content = raw.trim();
    if let Some(rest) = content.strip_prefix("```") {
        content = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

/// Parses raw model output into the response schema
pub fn parse_response(raw: &str) -> AppResult<RecommendationResponse> {
    let content = strip_code_fences(raw);
    let response: RecommendationResponse = serde_json::from_str(content).map_err(|e| {
        AppError::MalformedResponse(format!("Model output is not valid response JSON: {}", e))
    })?;

    if response.text_response.trim().is_empty() {
        return Err(AppError::MalformedResponse(
            "Model output has an empty text_response".to_string(),
        ));
    }

    Ok(response)
}

/// Conversational recommendations grounded in the movie collection
pub struct RecommendationOrchestrator {
    retrieval: Arc<RetrievalService>,
    llm: Arc<dyn ChatModel>,
    temperature: f32,
    context_results: usize,
}

impl RecommendationOrchestrator {
    pub fn new(retrieval: Arc<RetrievalService>, llm: Arc<dyn ChatModel>, temperature: f32) -> Self {
        Self {
            retrieval,
            llm,
            temperature,
            context_results: DEFAULT_CONTEXT_RESULTS,
        }
    }

    /// Answers the user; never fails
    ///
    /// A missing credential yields [`NOT_CONFIGURED_MESSAGE`]; any other failure
    /// yields [`FALLBACK_MESSAGE`]. Both come with no recommendations.
    pub async fn recommend(&self, user_text: &str) -> RecommendationResponse {
        match self.try_recommend(user_text).await {
            Ok(response) => response,
            Err(AppError::Config(msg)) => {
                tracing::warn!(reason = %msg, "Recommendation skipped, assistant not configured");
                RecommendationResponse::message(NOT_CONFIGURED_MESSAGE)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    transient = e.is_transient(),
                    provider = self.llm.name(),
                    "Recommendation failed"
                );
                RecommendationResponse::message(FALLBACK_MESSAGE)
            }
        }
    }

    /// Like [`Self::recommend`], but surfaces failures
    pub async fn try_recommend(&self, user_text: &str) -> AppResult<RecommendationResponse> {
        if !self.llm.is_configured() {
            return Err(AppError::Config("chat model API key is not set".to_string()));
        }

        let candidates = self
            .retrieval
            .recommend_context(user_text, self.context_results)
            .await;
        let prompt = build_prompt(user_text, &build_context_block(&candidates));

        tracing::debug!(
            candidates = candidates.len(),
            prompt_chars = prompt.len(),
            "Requesting recommendation"
        );

        let raw = self.llm.complete(&prompt, self.temperature).await?;
        let response = parse_response(&raw)?;

        tracing::info!(
            recommendations = response.recommendations.len(),
            "Recommendation produced"
        );

        Ok(response)
    }
}
