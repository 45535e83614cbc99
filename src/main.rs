use std::sync::Arc;

use anyhow::{Context, Result};
use cognitive_companion::{create_router, AppState, Config, LiveClient, VoiceHandle};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config/cognitive-companion")?;

    info!("Cognitive Companion v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Live model: {}", cfg.live.model);
    if cfg.live.api_key.is_empty() {
        warn!("No API key configured; set COMPANION__LIVE__API_KEY before starting voice mode");
    }

    let (voice, controller) = VoiceHandle::spawn(
        cfg.session_config(),
        Arc::new(cfg.devices()),
        Arc::new(LiveClient::default()),
    );

    let app = create_router(AppState::new(voice.clone()));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    if let Ok(Some(stats)) = voice.stop().await {
        info!("Final session {}: {} frames sent", stats.session_id, stats.frames_sent);
    }
    drop(voice);
    controller.await?;

    Ok(())
}
