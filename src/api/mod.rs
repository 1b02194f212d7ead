pub mod handlers;
pub mod routes;

use axum::http::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::language::Language;

pub const LICENSE_KEY_HEADER: &str = "x-license-key";
pub const MINIMAX_GROUP_ID_HEADER: &str = "x-minimax-group-id";
pub const MINIMAX_API_KEY_HEADER: &str = "x-minimax-api-key";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(
        default,
        rename = "minimaxVoiceId",
        deserialize_with = "string_or_none"
    )]
    pub voice_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// Reads a credential header, treating empty or non-UTF-8 values as absent.
pub fn credential<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

// Non-string values read as absent rather than rejecting the body.
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}
