//! HTTP API server for controlling voice mode from a UI
//!
//! - POST /voice/start - Start a voice session
//! - POST /voice/stop - Stop the voice session
//! - GET /voice/status - Current status, transcript and speaking flag
//! - GET /voice/stats - Statistics of the current or last session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
