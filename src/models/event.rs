//! Canonical event record and its wire payload.

use std::collections::BTreeSet;

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::CategoryId;

/// Opaque identifier of the library that owns an event.
pub type LibraryId = i64;

/// A single normalized event occurrence.
///
/// Times are wall-clock times in the calendar's own timezone; they are pinned
/// to an offset only when converted into an [`EventPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub library_id: LibraryId,
    pub description: String,
    pub registration_link: Option<String>,
    pub event_url: Option<String>,
    category_ids: Option<BTreeSet<CategoryId>>,
}

impl CanonicalEvent {
    pub fn new(title: impl Into<String>, start_time: NaiveDateTime, library_id: LibraryId) -> Self {
        Self {
            title: title.into(),
            start_time,
            end_time: None,
            library_id,
            description: String::new(),
            registration_link: None,
            event_url: None,
            category_ids: None,
        }
    }

    pub fn with_end_time(mut self, end_time: Option<NaiveDateTime>) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_event_url(mut self, event_url: Option<String>) -> Self {
        self.event_url = event_url;
        self
    }

    pub fn with_registration_link(mut self, registration_link: Option<String>) -> Self {
        self.registration_link = registration_link;
        self
    }

    /// Category tags, `None` until the classifier has run.
    pub fn category_ids(&self) -> Option<&BTreeSet<CategoryId>> {
        self.category_ids.as_ref()
    }

    /// Attach category tags. Only the first assignment takes effect.
    pub fn assign_categories(&mut self, ids: BTreeSet<CategoryId>) -> bool {
        if self.category_ids.is_some() {
            return false;
        }
        self.category_ids = Some(ids);
        true
    }

    /// Build the sink payload, pinning local times to `tz`.
    pub fn to_payload(&self, tz: Tz) -> Result<EventPayload> {
        Ok(EventPayload {
            title: self.title.clone(),
            start_time: localize(self.start_time, tz)?,
            end_time: self.end_time.map(|t| localize(t, tz)).transpose()?,
            library_id: self.library_id,
            description: self.description.clone(),
            registration_link: self.registration_link.clone(),
            event_url: self.event_url.clone(),
            category_ids: self
                .category_ids
                .as_ref()
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default(),
        })
    }
}

/// Event as sent to the event store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPayload {
    pub title: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub library_id: LibraryId,
    pub description: String,
    pub registration_link: Option<String>,
    pub event_url: Option<String>,
    pub category_ids: Vec<CategoryId>,
}

impl EventPayload {
    /// Uniqueness key used by the store: library, title and start.
    pub fn dedupe_key(&self) -> (LibraryId, &str, i64) {
        (self.library_id, self.title.as_str(), self.start_time.timestamp())
    }
}

/// Pin a wall-clock time to `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// spring-forward gap are moved one hour later.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<FixedOffset>> {
    let resolved = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))).earliest(),
    };
    resolved
        .map(|dt| dt.with_timezone(&dt.offset().fix()))
        .ok_or_else(|| AppError::Timezone(format!("{naive} does not exist in {tz}")))
}
