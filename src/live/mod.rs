//! Live conversational session transport
//!
//! - `session`: transport-agnostic session handle, events and config
//! - `client`: WebSocket implementation of [`SessionTransport`]
//! - `messages`: JSON wire messages

pub mod client;
pub mod messages;
pub mod session;

pub use client::{LiveClient, DEFAULT_ENDPOINT};
pub use messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
pub use session::{
    InboundEvent, LiveConfig, LiveSession, OutboundMessage, SessionTransport, TransportState, DEFAULT_VOICE,
};
