use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use crate::config::Config;
use crate::error::AppError;
use crate::language::Language;

pub const TTS_MODEL: &str = "speech-02-turbo";
pub const SAMPLE_RATE: u32 = 32000;
pub const BITRATE: u32 = 128000;

#[derive(Debug, Clone, Copy)]
pub struct MinimaxCredentials<'a> {
    pub group_id: &'a str,
    pub api_key: &'a str,
}

pub struct SpeechClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
pub struct SynthesisRequest<'a> {
    pub model: &'static str,
    pub text: &'a str,
    pub stream: bool,
    pub voice_setting: VoiceSetting<'a>,
    pub audio_setting: AudioSetting,
    pub language_boost: &'static str,
    pub pronunciation_dict: PronunciationDict,
}

#[derive(Debug, Serialize)]
pub struct VoiceSetting<'a> {
    pub voice_id: &'a str,
    pub speed: u32,
    pub vol: u32,
    pub pitch: i32,
}

#[derive(Debug, Serialize)]
pub struct AudioSetting {
    pub sample_rate: u32,
    pub bitrate: u32,
    pub format: &'static str,
    pub channel: u32,
}

#[derive(Debug, Serialize)]
pub struct PronunciationDict {
    pub enable: bool,
    pub language: &'static str,
}

impl<'a> SynthesisRequest<'a> {
    pub fn new(text: &'a str, voice_id: &'a str, language: Language) -> Self {
        Self {
            model: TTS_MODEL,
            text,
            stream: false,
            voice_setting: VoiceSetting {
                voice_id,
                speed: 1,
                vol: 1,
                pitch: 0,
            },
            audio_setting: AudioSetting {
                sample_rate: SAMPLE_RATE,
                bitrate: BITRATE,
                format: "mp3",
                channel: 1,
            },
            language_boost: language.language_boost(),
            pronunciation_dict: PronunciationDict {
                enable: true,
                language: language.pronunciation_language(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl SpeechClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.minimax_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn synthesize(
        &self,
        credentials: MinimaxCredentials<'_>,
        request: &SynthesisRequest<'_>,
    ) -> Result<Vec<u8>, AppError> {
        let url = format!("{}/v1/t2a_v2", self.base_url);

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .query(&[("GroupId", credentials.group_id)])
            .bearer_auth(credentials.api_key)
            .json(request)
            .send()
            .await?;
        tracing::debug!("Minimax TTS API call: {:?}", started.elapsed());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Minimax TTS API error: {} {}", status, body);
            return Err(AppError::Upstream(format!(
                "TTS API error: {}",
                status.as_u16()
            )));
        }

        let data: Value = response.json().await?;
        let hex_audio = data
            .pointer("/data/audio")
            .and_then(Value::as_str)
            .filter(|audio| !audio.is_empty())
            .ok_or_else(|| {
                tracing::error!("Invalid TTS response structure: {}", data);
                AppError::InvalidResponse("Invalid TTS response".into())
            })?;

        let audio = decode_hex_audio(hex_audio).map_err(|e| {
            tracing::error!("TTS audio is not valid hex: {}", e);
            AppError::InvalidResponse("Invalid TTS response".into())
        })?;
        tracing::debug!("Audio bytes length: {}", audio.len());

        Ok(audio)
    }

    pub async fn transcribe(
        &self,
        credentials: MinimaxCredentials<'_>,
        audio: AudioUpload,
        language: Language,
    ) -> Result<String, AppError> {
        let url = format!("{}/v1/asr", self.base_url);

        let mut part = Part::bytes(audio.bytes.to_vec())
            .file_name(audio.file_name.unwrap_or_else(|| "audio".to_string()));
        if let Some(content_type) = audio.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new()
            .part("file", part)
            .text("language", language.locale());

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .query(&[("GroupId", credentials.group_id)])
            .bearer_auth(credentials.api_key)
            .multipart(form)
            .send()
            .await?;
        tracing::debug!("Minimax STT API call: {:?}", started.elapsed());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Minimax STT API error: {} {}", status, body);
            return Err(AppError::Upstream(format!(
                "STT API error: {}",
                status.as_u16()
            )));
        }

        let data: Value = response.json().await?;
        tracing::debug!("Minimax STT response: {}", data);
        Ok(transcript_text(&data))
    }
}

/// Decodes the hex audio envelope, two digits per byte, high nibble first.
pub fn decode_hex_audio(hex_audio: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(hex_audio)
}

pub fn transcript_text(data: &Value) -> String {
    super::first_text(data, &["/text", "/transcript"])
}
