//! Calendar source adapters.
//!
//! Every calendar platform gets an adapter that can fetch its raw data and map
//! it into [`CanonicalEvent`]s:
//!
//! - `assabet`: Assabet Interactive HTML calendar pages (`AssabetAdapter`)
//! - `libcal`: Springshare LibCal hidden JSON widget API (`LibCalAdapter`)
//!
//! The orchestrator only sees the [`SourceAdapter`] trait.

mod assabet;
mod libcal;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};

use crate::error::{AppError, DateError, Result};
use crate::models::{CanonicalEvent, LibraryId, SourceConfig};
use crate::services::{TemporalNormalizer, TimeRange};

pub use assabet::AssabetAdapter;
pub use libcal::LibCalAdapter;

/// Raw payload returned by a fetch.
#[derive(Debug, Clone)]
pub enum RawData {
    /// An HTML document
    Markup(String),
    /// A decoded JSON document
    Json(serde_json::Value),
}

impl RawData {
    /// Whether the fetch produced nothing worth normalizing.
    pub fn is_empty(&self) -> bool {
        match self {
            RawData::Markup(html) => html.trim().is_empty(),
            RawData::Json(value) => match value {
                serde_json::Value::Null => true,
                serde_json::Value::Array(items) => items.is_empty(),
                serde_json::Value::Object(map) => map.is_empty(),
                _ => false,
            },
        }
    }
}

/// Inclusive `[start, end]` span of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl RollingWindow {
    /// Window from `now` to `now + days`.
    pub fn new(now: NaiveDateTime, days: i64) -> Self {
        Self {
            start: now,
            end: now + Duration::days(days),
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Per-run state shared by every adapter: the clock and the window.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeContext {
    pub window: RollingWindow,
    pub normalizer: TemporalNormalizer,
}

impl ScrapeContext {
    pub fn new(now: NaiveDateTime, window_days: i64) -> Self {
        Self {
            window: RollingWindow::new(now, window_days),
            normalizer: TemporalNormalizer::new(now.date()),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.window.start
    }
}

/// Events produced from one fetch, with counts of what was dropped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Raw items found in the payload
    pub seen: usize,
    /// Items marked as closures
    pub closed: usize,
    /// Items without a usable title or start time
    pub unparseable: usize,
    /// Items starting outside the rolling window
    pub outside_window: usize,
    pub events: Vec<CanonicalEvent>,
}

impl NormalizedBatch {
    /// Account for one raw item's time, returning it when the item should be
    /// kept.
    pub(crate) fn admit(
        &mut self,
        source: &str,
        title: &str,
        raw: (&str, Option<&str>),
        parsed: std::result::Result<TimeRange, DateError>,
        window: &RollingWindow,
    ) -> Option<TimeRange> {
        match parsed {
            Ok(range) if window.contains(range.start) => Some(range),
            Ok(range) => {
                self.outside_window += 1;
                log::debug!(
                    "[{}] '{}' at {} is outside the window",
                    source,
                    title,
                    range.start
                );
                None
            }
            Err(DateError::Closed) => {
                self.closed += 1;
                log::debug!("[{}] '{}' is a closure notice", source, title);
                None
            }
            Err(e) => {
                self.unparseable += 1;
                log::warn!(
                    "[{}] Skipped '{}': date '{}' / time '{}': {}",
                    source,
                    title,
                    raw.0,
                    raw.1.unwrap_or(""),
                    e
                );
                None
            }
        }
    }

    /// Count an item dropped before its time was looked at.
    pub(crate) fn reject(&mut self, source: &str, reason: &str) {
        self.unparseable += 1;
        log::warn!("[{}] Skipped item: {}", source, reason);
    }
}

/// A calendar platform adapter.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Display name for logs.
    fn name(&self) -> &str;

    /// Library that owns the produced events.
    fn library_id(&self) -> LibraryId;

    /// Fetch the raw calendar data.
    ///
    /// `AppError::Http` means the source could not be reached.
    async fn fetch(&self, ctx: &ScrapeContext) -> Result<RawData>;

    /// Map raw data into canonical events inside the rolling window.
    fn normalize_data(&self, raw: RawData, ctx: &ScrapeContext) -> Result<NormalizedBatch>;
}

/// Build the adapter for a configured source.
///
/// `timezone` is the IANA name passed to APIs that localize their output.
pub fn build_adapter(
    source: &SourceConfig,
    client: &reqwest::Client,
    timezone: &str,
) -> Result<Box<dyn SourceAdapter>> {
    match source.platform.trim().to_lowercase().as_str() {
        "assabet" => Ok(Box::new(AssabetAdapter::new(source, client.clone())?)),
        "libcal" => Ok(Box::new(LibCalAdapter::new(
            source,
            client.clone(),
            timezone,
        )?)),
        _ => Err(AppError::UnknownPlatform {
            platform: source.platform.clone(),
            source_name: source.name.clone(),
        }),
    }
}
