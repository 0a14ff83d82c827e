use crate::config::Config;
use crate::recognizer::SpeechEngine;
use crate::store::SessionStore;
use std::sync::Arc;

/// Shared application state for HTTP handlers and WebSocket sessions
#[derive(Clone)]
pub struct AppState {
    /// Session summary persistence
    pub store: Arc<dyn SessionStore>,

    /// Recognition engine; model loaded once, shared read-only
    pub engine: Arc<dyn SpeechEngine>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        engine: Arc<dyn SpeechEngine>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }
}
