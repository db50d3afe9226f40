use std::net::SocketAddr;

use story_core::{GeminiConfig, StoryOrchestrator};
use tokio::net::TcpListener;
use tracing::info;

use server::{build_router, config::ServerConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting story server...");

    // No key, no server.
    let gemini = GeminiConfig::from_env()?;
    info!(
        "Gemini models: text={}, tts={} (voice {}), image={}, language={:?}",
        gemini.text_model, gemini.tts_model, gemini.voice, gemini.image_model, gemini.language
    );
    let orchestrator = StoryOrchestrator::from_config(gemini)?;

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, body_limit={}B",
        config.port, config.rate_limit_per_minute, config.body_limit_bytes
    );

    let state = AppState::new(orchestrator, config.clone());
    let app = build_router(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
