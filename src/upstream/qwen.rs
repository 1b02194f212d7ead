use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use crate::config::Config;
use crate::error::AppError;
use crate::language::Language;

pub const TEMPERATURE: f64 = 0.7;
pub const MAX_TOKENS: u32 = 800;

pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    model: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub input: GenerationInput<'a>,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
pub struct GenerationInput<'a> {
    pub messages: [Message<'a>; 2],
}

#[derive(Debug, Serialize)]
pub struct Message<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GenerationParameters {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(model: &'a str, language: Language, message: &'a str) -> Self {
        Self {
            model,
            input: GenerationInput {
                messages: [
                    Message {
                        role: "system",
                        content: language.system_prompt(),
                    },
                    Message {
                        role: "user",
                        content: message,
                    },
                ],
            },
            parameters: GenerationParameters {
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
        }
    }
}

impl ChatClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            url: config.qwen_api_url.clone(),
            model: config.qwen_model.clone(),
        }
    }

    pub async fn complete(
        &self,
        api_key: &str,
        language: Language,
        message: &str,
    ) -> Result<String, AppError> {
        let payload = GenerationRequest::new(&self.model, language, message);

        let started = Instant::now();
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        tracing::debug!("Qwen API call: {:?}", started.elapsed());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Qwen API error: {} {}", status, body);
            return Err(AppError::Upstream(language.chat_error(status.as_u16())));
        }

        let data: Value = response.json().await?;
        Ok(reply_text(&data))
    }
}

/// Reply text from `output.text`, falling back to `output.content`.
pub fn reply_text(data: &Value) -> String {
    super::first_text(data, &["/output/text", "/output/content"])
}
