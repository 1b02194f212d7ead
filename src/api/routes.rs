use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::post,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, LICENSE_KEY_HEADER, MINIMAX_API_KEY_HEADER, MINIMAX_GROUP_ID_HEADER};
use crate::config::Config;
use crate::upstream::{self, ChatClient, SpeechClient};

const AUDIO_UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

pub const MISSING_PAGE: &str = "<html><body>Error: HTML template not found</body></html>";

pub struct AppState {
    pub config: Config,
    pub chat: ChatClient,
    pub speech: SpeechClient,
    pub page: String,
}

impl AppState {
    pub fn new(config: Config, page: String) -> Result<Self, reqwest::Error> {
        let http = upstream::build_client(&config)?;
        Ok(Self {
            chat: ChatClient::new(http.clone(), &config),
            speech: SpeechClient::new(http, &config),
            config,
            page,
        })
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(LICENSE_KEY_HEADER),
            HeaderName::from_static(MINIMAX_GROUP_ID_HEADER),
            HeaderName::from_static(MINIMAX_API_KEY_HEADER),
        ]);

    let api_routes = Router::new()
        .route(
            "/chat",
            post(handlers::chat).fallback(handlers::method_not_allowed),
        )
        .route(
            "/tts",
            post(handlers::tts).fallback(handlers::method_not_allowed),
        )
        .route(
            "/stt",
            post(handlers::stt)
                .fallback(handlers::method_not_allowed)
                .layer(DefaultBodyLimit::max(AUDIO_UPLOAD_LIMIT_BYTES)),
        );

    Router::new()
        .nest("/api", api_routes)
        .fallback(handlers::page)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn load_page(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(page) => {
            tracing::info!("Loaded HTML template, size: {} characters", page.len());
            page
        }
        Err(e) => {
            tracing::error!("Failed to load HTML template {}: {}", path.display(), e);
            MISSING_PAGE.to_string()
        }
    }
}
