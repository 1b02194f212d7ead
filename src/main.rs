use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod language;
mod upstream;

use api::routes::{create_router, load_page, AppState};
use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Merge .env before anything reads configuration
    config::load_env_file(Path::new(".env"));
    let config = Config::from_env()?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Voice Bot Relay v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let page = load_page(&config.page_path);

    let state = Arc::new(AppState::new(config, page)?);
    let app = create_router(state);

    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
