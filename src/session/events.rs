use serde::{Deserialize, Serialize};

/// Outbound event frames, serialized as JSON text on the socket.
///
/// All events for a connection flow through one channel into one writer
/// task, so the order they are emitted in is the order the client sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    /// Acknowledgement / status notice
    Info { message: String },

    /// Interim hypothesis; `partial` may be an empty string
    Partial { partial: String },

    /// Committed transcript segment, always non-empty
    Final { text: String },

    /// Recoverable fault; the session stays usable
    Error { message: String },
}

impl SessionEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
