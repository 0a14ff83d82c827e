//! Session summary persistence
//!
//! The pipeline treats the store as an external collaborator: create a
//! record when a cycle starts, write the summary exactly once when it stops,
//! and let the listing API browse what accumulated. Calls are expected to be
//! fast; there is no retry in the hot path.

mod memory;

pub use memory::MemorySessionStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted summary of one pipeline cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,

    /// Stamped when the record is created, i.e. at pipeline start
    pub started_at: DateTime<Utc>,

    /// None until the cycle finalizes
    pub ended_at: Option<DateTime<Utc>>,

    pub final_transcript: String,

    /// Whitespace-delimited tokens in the trimmed transcript
    pub word_count: usize,

    pub duration_seconds: f64,

    /// Which engine produced the transcript
    pub label: String,
}

/// Fields written back when a cycle finalizes.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub final_transcript: String,
    pub word_count: usize,
    pub duration_seconds: f64,
    pub ended_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate a new record stamped with the current time.
    async fn create(&self, label: &str) -> Result<Uuid>;

    /// Write the final summary fields for `id`.
    async fn update(&self, id: Uuid, update: SessionUpdate) -> Result<()>;

    /// All records, most recent first.
    async fn list(&self) -> Result<Vec<SessionRecord>>;

    /// One record, or None if the id is unknown.
    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>>;
}
