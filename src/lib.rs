pub mod config;
pub mod http;
pub mod recognizer;
pub mod session;
pub mod store;
pub mod transcode;

pub use config::{Config, TranscodeConfig};
pub use http::{create_router, AppState};
pub use recognizer::{Hypothesis, SpeechDecoder, SpeechEngine};
pub use session::{SessionEvent, SessionStatus, TranscribePipeline};
pub use store::{MemorySessionStore, SessionRecord, SessionStore, SessionUpdate};
pub use transcode::Transcoder;
