use serde::{Deserialize, Deserializer, Serialize};

/// A single movie suggested by the assistant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    #[serde(default, deserialize_with = "year_from_number_or_string")]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub poster_url: String,
    #[serde(default)]
    pub detail_link: String,
}

/// The assistant's structured answer
///
/// `recommendations` is empty when the user asked a specific question rather than
/// for suggestions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub text_response: String,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl RecommendationResponse {
    /// A text-only answer with no recommendations
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text_response: text.into(),
            recommendations: Vec::new(),
        }
    }
}

/// Models sometimes quote the year; accept `2020`, `2020.0`, `"2020"` or `null`
///
/// Years that do not fit an `i32` or have a fractional part become `None`.
fn year_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|y| y.fract() == 0.0 && y.abs() <= i32::MAX as f64)
                    .map(|y| y as i64)
            })
            .and_then(|y| i32::try_from(y).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A semantically similar movie shown on a detail page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarMovie {
    pub id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub poster: String,
}
