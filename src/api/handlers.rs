use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{
    credential, ChatRequest, ChatResponse, SpeechRequest, TranscriptionResponse,
    LICENSE_KEY_HEADER, MINIMAX_API_KEY_HEADER, MINIMAX_GROUP_ID_HEADER,
};
use crate::api::routes::AppState;
use crate::error::AppError;
use crate::language::Language;
use crate::upstream::{AudioUpload, MinimaxCredentials, SynthesisRequest};

const CHAT_FAILURE: &str = "An error occurred while processing your request";
const TTS_FAILURE: &str = "An error occurred during text-to-speech conversion";
const STT_FAILURE: &str = "An error occurred during speech-to-text conversion";

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    relay_chat(&state, &headers, &body)
        .await
        .map_err(|e| e.or_generic(CHAT_FAILURE))
}

async fn relay_chat(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<ChatResponse>, AppError> {
    let api_key = credential(headers, LICENSE_KEY_HEADER)
        .ok_or_else(|| AppError::BadRequest("API key is required".into()))?;

    let request: ChatRequest = serde_json::from_slice(body)?;
    let message = request
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::BadRequest("Message is required".into()))?;

    tracing::debug!("Chat request in {}", request.language.tag());
    let response = state
        .chat
        .complete(api_key, request.language, &message)
        .await?;

    Ok(Json(ChatResponse { response }))
}

pub async fn tts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    synthesize(&state, &headers, &body)
        .await
        .map_err(|e| e.or_generic(TTS_FAILURE))
}

async fn synthesize(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, AppError> {
    let license_key = credential(headers, LICENSE_KEY_HEADER);
    let group_id = credential(headers, MINIMAX_GROUP_ID_HEADER);
    let api_key = credential(headers, MINIMAX_API_KEY_HEADER);

    tracing::debug!(
        "TTS request headers: license key {}, group id {}, api key {}",
        presence(license_key.map(str::len)),
        presence(group_id.map(str::len)),
        presence(api_key.map(str::len)),
    );

    if license_key.is_none() {
        return Err(AppError::BadRequest(
            "Alibaba Cloud API key is required".into(),
        ));
    }
    let credentials = minimax_credentials(group_id, api_key)?;

    let request: SpeechRequest = serde_json::from_slice(body)?;
    let text = request
        .text
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Text is required".into()))?;

    let voice_id = state
        .config
        .voices
        .select(request.voice_id.as_deref(), request.language);
    let payload = SynthesisRequest::new(text, voice_id, request.language);

    let audio = state.speech.synthesize(credentials, &payload).await?;
    let length = audio.len();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        audio,
    )
        .into_response())
}

pub async fn stt(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<TranscriptionResponse>, AppError> {
    transcribe(&state, request)
        .await
        .map_err(|e| e.or_generic(STT_FAILURE))
}

async fn transcribe(
    state: &AppState,
    request: Request,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let headers = request.headers();
    let group_id = credential(headers, MINIMAX_GROUP_ID_HEADER).map(str::to_owned);
    let api_key = credential(headers, MINIMAX_API_KEY_HEADER).map(str::to_owned);
    let credentials = minimax_credentials(group_id.as_deref(), api_key.as_deref())?;

    let mut multipart = Multipart::from_request(request, &()).await?;
    let mut audio = None;
    let mut language = Language::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("audio") if audio.is_none() => {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await?;
                audio = Some(AudioUpload {
                    bytes,
                    file_name,
                    content_type,
                });
            }
            Some("language") => language = Language::from_tag(&field.text().await?),
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| AppError::BadRequest("Audio file is required".into()))?;
    tracing::debug!(
        "STT request: {} bytes, locale {}",
        audio.bytes.len(),
        language.locale()
    );

    let text = state
        .speech
        .transcribe(credentials, audio, language)
        .await?;

    Ok(Json(TranscriptionResponse { text }))
}

pub async fn page(State(state): State<Arc<AppState>>) -> Html<String> {
    tracing::debug!("Serving HTML page, size: {} characters", state.page.len());
    Html(state.page.clone())
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

fn minimax_credentials<'a>(
    group_id: Option<&'a str>,
    api_key: Option<&'a str>,
) -> Result<MinimaxCredentials<'a>, AppError> {
    match (group_id, api_key) {
        (Some(group_id), Some(api_key)) => Ok(MinimaxCredentials { group_id, api_key }),
        _ => Err(AppError::BadRequest(
            "Minimax credentials are required".into(),
        )),
    }
}

fn presence(length: Option<usize>) -> String {
    match length {
        Some(len) => format!("present (length: {})", len),
        None => "missing".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::create_router;
    use crate::config::Config;
    use axum::{body::Body, http, Router};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{header as header_is, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "<html><body>voice bot</body></html>";
    const BOUNDARY: &str = "relay-test-boundary";

    fn app(server: &MockServer) -> Router {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.qwen_api_url = format!("{}/generation", server.uri());
        config.minimax_base_url = server.uri();
        config.voices.japanese = "Japanese_KindLady".into();
        let state = AppState::new(config, PAGE.to_string()).unwrap();
        create_router(Arc::new(state))
    }

    fn json_post(uri: &str, headers: &[(&str, &str)], body: Value) -> Request {
        let mut builder = http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn stt_post(headers: &[(&str, &str)], audio: Option<&[u8]>, language: &str) -> Request {
        let mut body = Vec::new();
        if let Some(audio) = audio {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"clip.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(audio);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\n{language}\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );

        let mut builder = http::Request::builder().method("POST").uri("/api/stt").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn send(app: Router, request: Request) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body.to_vec())
    }

    async fn send_json(app: Router, request: Request) -> (StatusCode, Value) {
        let (status, _, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn received_json(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    const MINIMAX: [(&str, &str); 2] = [
        ("X-Minimax-Group-Id", "group-1"),
        ("X-Minimax-Api-Key", "mm-key"),
    ];
    const TTS_HEADERS: [(&str, &str); 3] = [
        ("X-License-Key", "sk-test"),
        ("X-Minimax-Group-Id", "group-1"),
        ("X-Minimax-Api-Key", "mm-key"),
    ];

    #[tokio::test]
    async fn test_chat_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generation"))
            .and(header_is("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"output": {"text": "你好，我係助手"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = json_post(
            "/api/chat",
            &[("X-License-Key", "sk-test")],
            json!({"message": "你好", "language": "cantonese"}),
        );
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "你好，我係助手"}));

        let sent = received_json(&server).await;
        assert_eq!(sent[0]["model"], "qwen-max");
        assert_eq!(sent[0]["input"]["messages"][1]["content"], "你好");
        assert_eq!(sent[0]["parameters"]["max_tokens"], 800);
    }

    #[tokio::test]
    async fn test_chat_selects_prompt_per_language() {
        for (tag, language) in [
            ("cantonese", Language::Cantonese),
            ("mandarin", Language::Mandarin),
            ("japanese", Language::Japanese),
            ("english", Language::English),
            ("swahili", Language::English),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"output": {"content": "ok"}})),
                )
                .mount(&server)
                .await;

            let request = json_post(
                "/api/chat",
                &[("X-License-Key", "sk-test")],
                json!({"message": "hi", "language": tag}),
            );
            let (status, body) = send_json(app(&server), request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["response"], "ok");

            let sent = received_json(&server).await;
            assert_eq!(sent[0]["input"]["messages"][0]["role"], "system");
            assert_eq!(
                sent[0]["input"]["messages"][0]["content"],
                language.system_prompt(),
                "language tag {}",
                tag
            );
        }
    }

    #[tokio::test]
    async fn test_chat_localized_upstream_errors() {
        for language in Language::ALL {
            for upstream_status in [401u16, 503] {
                let server = MockServer::start().await;
                Mock::given(method("POST"))
                    .respond_with(ResponseTemplate::new(upstream_status).set_body_string("nope"))
                    .mount(&server)
                    .await;

                let request = json_post(
                    "/api/chat",
                    &[("X-License-Key", "sk-test")],
                    json!({"message": "hi", "language": language.tag()}),
                );
                let (status, body) = send_json(app(&server), request).await;
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body["error"], language.chat_error(upstream_status));
            }
        }
    }

    #[tokio::test]
    async fn test_chat_requires_api_key() {
        let server = MockServer::start().await;
        let request = json_post("/api/chat", &[], json!({"message": "hi"}));
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "API key is required");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_requires_message() {
        let server = MockServer::start().await;
        let request = json_post(
            "/api/chat",
            &[("X-License-Key", "sk-test")],
            json!({"message": "", "language": "japanese"}),
        );
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");
    }

    #[tokio::test]
    async fn test_chat_non_string_message_is_bad_request() {
        let server = MockServer::start().await;
        let request = json_post(
            "/api/chat",
            &[("X-License-Key", "sk-test")],
            json!({"message": 5, "language": "cantonese"}),
        );
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_malformed_body_is_generic_error() {
        let server = MockServer::start().await;
        let request = http::Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("X-License-Key", "sk-test")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], CHAT_FAILURE);
    }

    #[tokio::test]
    async fn test_tts_returns_decoded_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/t2a_v2"))
            .and(query_param("GroupId", "group-1"))
            .and(header_is("authorization", "Bearer mm-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"audio": "48656c6c6f"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = json_post(
            "/api/tts",
            &TTS_HEADERS,
            json!({"text": "Hello", "language": "japanese"}),
        );
        let (status, headers, body) = send(app(&server), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
        assert_eq!(body, vec![0x48, 0x65, 0x6c, 0x6c, 0x6f]);

        let sent = received_json(&server).await;
        assert_eq!(sent[0]["model"], "speech-02-turbo");
        assert_eq!(sent[0]["text"], "Hello");
        assert_eq!(sent[0]["voice_setting"]["voice_id"], "Japanese_KindLady");
        assert_eq!(sent[0]["language_boost"], "Japanese");
        assert_eq!(sent[0]["pronunciation_dict"]["language"], "Japanese");
        assert_eq!(sent[0]["audio_setting"]["sample_rate"], 32000);
    }

    #[tokio::test]
    async fn test_tts_voice_override() {
        for (requested, expected) in [
            (json!("  Japanese_GentleButler "), "Japanese_GentleButler"),
            (json!("   "), "Japanese_KindLady"),
            (json!(""), "Japanese_KindLady"),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"data": {"audio": "00"}})),
                )
                .mount(&server)
                .await;

            let request = json_post(
                "/api/tts",
                &TTS_HEADERS,
                json!({"text": "こんにちは", "language": "japanese", "minimaxVoiceId": requested}),
            );
            let (status, _, _) = send(app(&server), request).await;
            assert_eq!(status, StatusCode::OK);

            let sent = received_json(&server).await;
            assert_eq!(sent[0]["voice_setting"]["voice_id"], expected);
        }
    }

    #[tokio::test]
    async fn test_tts_missing_credentials_makes_no_call() {
        let cases: [(&[(&str, &str)], &str); 3] = [
            (&MINIMAX, "Alibaba Cloud API key is required"),
            (
                &[("X-License-Key", "sk-test"), ("X-Minimax-Api-Key", "mm-key")],
                "Minimax credentials are required",
            ),
            (
                &[("X-License-Key", "sk-test"), ("X-Minimax-Group-Id", "group-1")],
                "Minimax credentials are required",
            ),
        ];

        for (headers, expected) in cases {
            let server = MockServer::start().await;
            let request = json_post("/api/tts", headers, json!({"text": "hi"}));
            let (status, body) = send_json(app(&server), request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], expected);
            assert!(server.received_requests().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_tts_requires_text() {
        let server = MockServer::start().await;
        let request = json_post("/api/tts", &TTS_HEADERS, json!({"language": "mandarin"}));
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");
    }

    #[tokio::test]
    async fn test_tts_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let request = json_post("/api/tts", &TTS_HEADERS, json!({"text": "hi"}));
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "TTS API error: 502");
    }

    #[tokio::test]
    async fn test_tts_invalid_response() {
        for upstream in [
            json!({"base_resp": {"status_code": 1004}}),
            json!({"data": {"audio": ""}}),
            json!({"data": {"audio": "xyz"}}),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(upstream))
                .mount(&server)
                .await;

            let request = json_post("/api/tts", &TTS_HEADERS, json!({"text": "hi"}));
            let (status, body) = send_json(app(&server), request).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["error"], "Invalid TTS response");
        }
    }

    #[tokio::test]
    async fn test_stt_forwards_locale() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/asr"))
            .and(query_param("GroupId", "group-1"))
            .and(header_is("authorization", "Bearer mm-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transcript": "早晨"})))
            .expect(1)
            .mount(&server)
            .await;

        let request = stt_post(&MINIMAX, Some(&b"fake-webm-audio"[..]), "cantonese");
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"text": "早晨"}));

        let received = server.received_requests().await.unwrap();
        let forwarded = String::from_utf8_lossy(&received[0].body);
        assert!(forwarded.contains("name=\"file\""));
        assert!(forwarded.contains("filename=\"clip.webm\""));
        assert!(forwarded.contains("fake-webm-audio"));
        assert!(forwarded.contains("zh-HK"));
    }

    #[tokio::test]
    async fn test_stt_requires_audio() {
        let server = MockServer::start().await;
        let request = stt_post(&MINIMAX, None, "mandarin");
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Audio file is required");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stt_missing_credentials_makes_no_call() {
        let server = MockServer::start().await;
        let request = stt_post(&MINIMAX[..1], Some(&b"audio"[..]), "japanese");
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Minimax credentials are required");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stt_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let request = stt_post(&MINIMAX, Some(&b"audio"[..]), "english");
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "STT API error: 401");
    }

    #[tokio::test]
    async fn test_stt_without_multipart_body_is_generic_error() {
        let server = MockServer::start().await;
        let request = json_post("/api/stt", &MINIMAX, json!({"audio": "x"}));
        let (status, body) = send_json(app(&server), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], STT_FAILURE);
    }

    #[tokio::test]
    async fn test_non_post_is_method_not_allowed() {
        let server = MockServer::start().await;
        for uri in ["/api/chat", "/api/tts", "/api/stt"] {
            let request = http::Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send_json(app(&server), request).await;

            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body["error"], "Method not allowed");
        }
    }

    #[tokio::test]
    async fn test_unmatched_paths_serve_page() {
        let server = MockServer::start().await;
        for uri in ["/", "/index.html", "/api/unknown"] {
            let request = http::Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, headers, body) = send(app(&server), request).await;

            assert_eq!(status, StatusCode::OK);
            assert!(headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html"));
            assert_eq!(body, PAGE.as_bytes());
        }
    }
}
