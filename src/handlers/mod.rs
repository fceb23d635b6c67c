//! HTTP and WebSocket request handlers
//!
//! - `api` - Root and health check endpoints
//! - `incoming_call` - TwiML call-control handoff
//! - `media_stream` - Telephony media-stream WebSocket (one call per socket)
//! - `personas` - Persona listing and voice preview

pub mod api;
pub mod incoming_call;
pub mod media_stream;
pub mod personas;

pub use incoming_call::incoming_call_handler;
pub use media_stream::media_stream_handler;
