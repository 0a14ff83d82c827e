use super::{SessionRecord, SessionStore, SessionUpdate};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store backing the listing API. Records are kept in insertion
/// order; `list` returns them newest first.
#[derive(Default)]
pub struct MemorySessionStore {
    records: RwLock<Vec<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, label: &str) -> Result<Uuid> {
        let record = SessionRecord {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            final_transcript: String::new(),
            word_count: 0,
            duration_seconds: 0.0,
            label: label.to_string(),
        };
        let id = record.id;

        self.records.write().await.push(record);
        Ok(id)
    }

    async fn update(&self, id: Uuid, update: SessionUpdate) -> Result<()> {
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            bail!("unknown session {}", id);
        };

        record.final_transcript = update.final_transcript;
        record.word_count = update.word_count;
        record.duration_seconds = update.duration_seconds;
        record.ended_at = Some(update.ended_at);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().cloned().collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }
}
