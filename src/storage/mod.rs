//! Event sinks.
//!
//! The scraper hands every tagged event to an [`EventSink`] one at a time.
//! Duplicate detection belongs to the sink; the pipeline only counts what the
//! sink reports.
//!
//! - [`ApiSink`]: the events REST API (production)
//! - [`LocalSink`]: a JSON file on disk (dry runs and tests)

mod api;
mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::EventPayload;

pub use api::ApiSink;
pub use local::{LocalSink, StoredEvents};

/// What the sink did with one submitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Stored as a new event
    Inserted,
    /// Already present; skipped by the sink
    Duplicate,
    /// Refused, with the response status and body
    Rejected { status: u16, detail: String },
}

/// Result of a past-event cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Number of removed events, when the sink reports it
    pub deleted: Option<u64>,
}

/// Destination for canonical event payloads.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Submit one event.
    ///
    /// `Err` means the request itself failed; a refusal by the sink is
    /// `Ok(SinkOutcome::Rejected { .. })`.
    async fn submit(&self, event: &EventPayload) -> Result<SinkOutcome>;

    /// Remove events whose time has passed.
    async fn cleanup(&self) -> Result<CleanupReport>;
}
