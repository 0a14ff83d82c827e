//! Streaming transcription session pipeline
//!
//! This module owns the lifetime of one client connection's transcription
//! work: the transcoder subprocess, the per-cycle decoder, the accumulated
//! transcript, and the background loop that moves PCM between them.
//! `start`/`stop` are idempotent and safe against racing stop paths; the
//! persistence write happens exactly once per cycle.

mod events;
mod pipeline;
mod state;

pub use events::SessionEvent;
pub use pipeline::TranscribePipeline;
pub use state::SessionStatus;
