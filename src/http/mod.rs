//! HTTP surface: WebSocket transcription endpoint + session browsing API
//!
//! - GET /ws/transcribe - duplex transcription socket (commands + audio in,
//!   events out)
//! - GET /sessions - persisted session summaries, newest first
//! - GET /sessions/:id - one summary
//! - GET /health - health check

mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::AppState;
