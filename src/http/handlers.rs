use super::state::AppState;
use crate::error::VoiceError;
use crate::session::VoiceSnapshot;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartVoiceResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

fn controller_gone() -> axum::response::Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        VoiceError::ControllerGone.user_message(),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /voice/start
/// Acquire the microphone and open a live session
pub async fn start_voice(State(state): State<AppState>) -> impl IntoResponse {
    info!("Voice start requested");

    match state.voice.start().await {
        Ok(session_id) => (
            StatusCode::OK,
            Json(StartVoiceResponse {
                session_id,
                status: "active".to_string(),
            }),
        )
            .into_response(),
        Err(VoiceError::AlreadyRunning) => {
            error_response(StatusCode::CONFLICT, VoiceError::AlreadyRunning.user_message())
        }
        Err(VoiceError::ControllerGone) => controller_gone(),
        Err(e) => {
            error!("Failed to start voice session: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.user_message())
        }
    }
}

/// POST /voice/stop
/// Stop the session; returns its statistics, or null when none was running
pub async fn stop_voice(State(state): State<AppState>) -> impl IntoResponse {
    info!("Voice stop requested");

    match state.voice.stop().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(_) => controller_gone(),
    }
}

/// GET /voice/status
pub async fn voice_status(State(state): State<AppState>) -> Json<VoiceSnapshot> {
    Json(state.voice.snapshot())
}

/// GET /voice/stats
pub async fn voice_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.voice.stats().await {
        Ok(Some(stats)) => (StatusCode::OK, Json(stats)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No voice session has run yet"),
        Err(_) => controller_gone(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
