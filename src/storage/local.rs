//! Local filesystem sink.
//!
//! Keeps every accepted event in a single JSON document:
//!
//! ```text
//! {
//!   "updated_at": "2026-02-02T14:00:00Z",
//!   "count": 2,
//!   "events": [ { "title": ..., "start_time": ..., ... }, ... ]
//! }
//! ```
//!
//! Events are unique on (library, title, start) like the events API.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{CleanupReport, EventSink, SinkOutcome};
use crate::error::{AppError, Result};
use crate::models::EventPayload;

/// On-disk document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredEvents {
    pub updated_at: Option<DateTime<Utc>>,
    pub count: usize,
    pub events: Vec<EventPayload>,
}

impl StoredEvents {
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
        self.count = self.events.len();
    }
}

/// JSON file sink.
pub struct LocalSink {
    path: PathBuf,
    clock: Option<DateTime<Utc>>,
    lock: Mutex<()>,
}

impl LocalSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: None,
            lock: Mutex::new(()),
        }
    }

    /// Pin "now" for cleanup and timestamps.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    /// Load the stored events, empty when the file does not exist yet.
    pub async fn load(&self) -> Result<StoredEvents> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredEvents::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write atomically (write to temp, then rename).
    async fn store(&self, data: &StoredEvents) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for LocalSink {
    async fn submit(&self, event: &EventPayload) -> Result<SinkOutcome> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;

        let key = event.dedupe_key();
        if data.events.iter().any(|e| e.dedupe_key() == key) {
            return Ok(SinkOutcome::Duplicate);
        }

        data.events.push(event.clone());
        data.events.sort_by_key(|e| e.start_time);
        data.touch(self.now());
        self.store(&data).await?;
        Ok(SinkOutcome::Inserted)
    }

    async fn cleanup(&self) -> Result<CleanupReport> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;

        let now = self.now();
        let before = data.events.len();
        data.events.retain(|e| e.start_time >= now);
        let deleted = before - data.events.len();

        if deleted > 0 {
            data.touch(now);
            self.store(&data).await?;
        }
        log::debug!("Removed {} past events from {}", deleted, self.path.display());
        Ok(CleanupReport {
            deleted: Some(deleted as u64),
        })
    }
}
