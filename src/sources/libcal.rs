// src/sources/libcal.rs

//! Springshare LibCal calendars.
//!
//! LibCal widgets load their listings from an undocumented JSON endpoint,
//! `{base}/widget/events/calendar/list`, which returns an array of events with
//! ISO timestamps already localized to the requested timezone.

use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;

use super::{NormalizedBatch, RawData, ScrapeContext, SourceAdapter};
use crate::error::{AppError, DateError, Result};
use crate::models::{CanonicalEvent, LibraryId, SourceConfig};
use crate::services::{TimeRange, parse_iso_datetime};
use crate::utils::{http, normalize_whitespace, resolve};

const LIST_PATH: &str = "widget/events/calendar/list";
const UNTITLED: &str = "Untitled Event";

/// One entry of the LibCal event list.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LibCalEvent {
    title: Option<String>,
    url: Option<String>,
    short_desc: Option<String>,
    audiences: Value,
    categories: Value,
    start: Option<String>,
    end: Option<String>,
    allday: Value,
    registration: Value,
}

/// Adapter for the LibCal JSON widget API.
pub struct LibCalAdapter {
    name: String,
    library_id: LibraryId,
    base_api_url: String,
    iid: String,
    calendar_id: String,
    timezone: String,
    client: reqwest::Client,
}

impl LibCalAdapter {
    /// Create an adapter for a source with `base_api_url`, `iid` and
    /// `calendar_id` parameters.
    pub fn new(source: &SourceConfig, client: reqwest::Client, timezone: &str) -> Result<Self> {
        let params = &source.params;
        let base_api_url = source.require("base_api_url", &params.base_api_url)?;
        url::Url::parse(base_api_url)?;

        Ok(Self {
            name: source.name.clone(),
            library_id: source.library_id,
            base_api_url: base_api_url.trim_end_matches('/').to_string(),
            iid: source.require("iid", &params.iid)?.to_string(),
            calendar_id: source.require("calendar_id", &params.calendar_id)?.to_string(),
            timezone: timezone.to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_api_url, LIST_PATH)
    }

    fn query(&self, ctx: &ScrapeContext) -> Vec<(&'static str, String)> {
        vec![
            ("iid", self.iid.clone()),
            ("c", self.calendar_id.clone()),
            ("sp", "1".to_string()),
            ("timezone", self.timezone.clone()),
            ("start", ctx.window.start.format("%Y-%m-%d").to_string()),
            ("end", ctx.window.end.format("%Y-%m-%d").to_string()),
        ]
    }

    fn time_range(
        &self,
        item: &LibCalEvent,
        start: &str,
        ctx: &ScrapeContext,
    ) -> std::result::Result<TimeRange, DateError> {
        if is_truthy(&item.allday) {
            return ctx.normalizer.normalize_range(start, None, true);
        }
        let start = parse_iso_datetime(start)?;
        let end = item
            .end
            .as_deref()
            .and_then(|end| parse_iso_datetime(end).ok())
            .filter(|end| *end > start);
        Ok(TimeRange { start, end })
    }

    fn to_event(&self, item: &LibCalEvent, title: String, range: TimeRange) -> CanonicalEvent {
        let short_desc = item
            .short_desc
            .as_deref()
            .map(strip_markup)
            .unwrap_or_default();
        let description = normalize_whitespace(&format!(
            "{} {} {} {}",
            title,
            short_desc,
            flatten_labels(&item.audiences),
            flatten_labels(&item.categories)
        ));

        let event_url = item
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .and_then(|u| resolve(&format!("{}/", self.base_api_url), u));
        let registration_link = if is_truthy(&item.registration) {
            event_url.clone()
        } else {
            None
        };

        CanonicalEvent::new(title, range.start, self.library_id)
            .with_end_time(range.end)
            .with_description(description)
            .with_event_url(event_url)
            .with_registration_link(registration_link)
    }
}

#[async_trait]
impl SourceAdapter for LibCalAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn library_id(&self) -> LibraryId {
        self.library_id
    }

    async fn fetch(&self, ctx: &ScrapeContext) -> Result<RawData> {
        let endpoint = self.endpoint();
        log::info!("[{}] Fetching LibCal events from {}", self.name, endpoint);
        let json: Value = http::fetch_json(&self.client, &endpoint, &self.query(ctx)).await?;
        Ok(RawData::Json(json))
    }

    fn normalize_data(&self, raw: RawData, ctx: &ScrapeContext) -> Result<NormalizedBatch> {
        let items = match raw {
            RawData::Json(Value::Array(items)) => items,
            RawData::Json(Value::Null) => Vec::new(),
            RawData::Json(other) => {
                return Err(AppError::adapter(
                    &self.name,
                    format!("expected an event array, got {}", json_kind(&other)),
                ));
            }
            RawData::Markup(_) => {
                return Err(AppError::adapter(&self.name, "expected a JSON document"));
            }
        };

        let mut batch = NormalizedBatch::default();
        for value in items {
            batch.seen += 1;
            let item: LibCalEvent = match serde_json::from_value(value) {
                Ok(item) => item,
                Err(e) => {
                    batch.reject(&self.name, &format!("malformed item: {}", e));
                    continue;
                }
            };

            let title = item
                .title
                .as_deref()
                .map(normalize_whitespace)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            let Some(start) = item.start.as_deref() else {
                batch.reject(&self.name, &format!("'{}' has no start", title));
                continue;
            };

            let parsed = self.time_range(&item, start, ctx);
            let Some(range) = batch.admit(&self.name, &title, (start, None), parsed, &ctx.window)
            else {
                continue;
            };
            batch.events.push(self.to_event(&item, title, range));
        }

        log::info!(
            "[{}] Normalized {} of {} LibCal items",
            self.name,
            batch.events.len(),
            batch.seen
        );
        Ok(batch)
    }
}

/// Flatten an audience/category field into space-separated names.
///
/// LibCal sends these as a string, a list of strings, or a list of
/// `{"id": .., "name": ..}` objects depending on the widget version.
fn flatten_labels(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_labels)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .get("name")
            .map(flatten_labels)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// LibCal booleans arrive as `true`, `1` or `"1"`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

fn strip_markup(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    normalize_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceParams;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;

    fn source() -> SourceConfig {
        SourceConfig {
            library_id: 12,
            name: "Poughkeepsie".to_string(),
            platform: "libcal".to_string(),
            params: SourceParams {
                base_api_url: Some("https://poklib.libcal.com/".into()),
                iid: Some("4187".into()),
                calendar_id: Some("12008".into()),
                ..SourceParams::default()
            },
        }
    }

    fn adapter() -> LibCalAdapter {
        LibCalAdapter::new(&source(), reqwest::Client::new(), "America/New_York").unwrap()
    }

    fn at(m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn ctx() -> ScrapeContext {
        ScrapeContext::new(at(2, 20, 8, 0), 7)
    }

    #[test]
    fn requires_all_parameters() {
        let mut missing = source();
        missing.params.calendar_id = None;
        assert!(LibCalAdapter::new(&missing, reqwest::Client::new(), "UTC").is_err());
    }

    #[test]
    fn query_covers_the_window_dates() {
        let a = adapter();
        assert_eq!(
            a.endpoint(),
            "https://poklib.libcal.com/widget/events/calendar/list"
        );
        let query = a.query(&ctx());
        assert!(query.contains(&("c", "12008".to_string())));
        assert!(query.contains(&("sp", "1".to_string())));
        assert!(query.contains(&("timezone", "America/New_York".to_string())));
        assert!(query.contains(&("start", "2026-02-20".to_string())));
        assert!(query.contains(&("end", "2026-02-27".to_string())));
    }

    #[test]
    fn normalizes_timed_and_all_day_items() {
        let raw = json!([
            {
                "title": "Lego Club",
                "url": "/event/1001",
                "short_desc": "<p>Build with <b>Lego</b> bricks</p>",
                "audiences": [{"id": 1, "name": "Kids"}, {"id": 2, "name": "Families"}],
                "categories": "STEM",
                "start": "2026-02-25T16:00:00-05:00",
                "end": "2026-02-25T17:00:00-05:00",
                "allday": false,
                "registration": true
            },
            {
                "title": "Book Sale",
                "url": "https://poklib.libcal.com/event/1002",
                "start": "2026-02-26T00:00:00-05:00",
                "allday": "1"
            }
        ]);

        let batch = adapter().normalize_data(RawData::Json(raw), &ctx()).unwrap();
        assert_eq!(batch.seen, 2);
        assert_eq!(batch.events.len(), 2);

        let lego = &batch.events[0];
        assert_eq!(lego.start_time, at(2, 25, 16, 0));
        assert_eq!(lego.end_time, Some(at(2, 25, 17, 0)));
        assert_eq!(
            lego.description,
            "Lego Club Build with Lego bricks Kids Families STEM"
        );
        assert_eq!(
            lego.event_url.as_deref(),
            Some("https://poklib.libcal.com/event/1001")
        );
        assert_eq!(lego.registration_link, lego.event_url);

        let sale = &batch.events[1];
        assert_eq!(sale.start_time, at(2, 26, 0, 0));
        assert_eq!(sale.end_time, None);
        assert_eq!(sale.registration_link, None);
    }

    #[test]
    fn skips_bad_dates_and_defaults_title() {
        let raw = json!([
            {"start": "2026-02-21T10:00:00"},
            {"title": "No Date"},
            {"title": "Bad Date", "start": "next tuesday"},
            {"title": "Too Late", "start": "2026-03-30T10:00:00"},
            "not an object"
        ]);

        let batch = adapter().normalize_data(RawData::Json(raw), &ctx()).unwrap();
        assert_eq!(batch.seen, 5);
        assert_eq!(batch.unparseable, 3);
        assert_eq!(batch.outside_window, 1);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].title, UNTITLED);
        assert_eq!(batch.events[0].description, UNTITLED);
    }

    #[test]
    fn non_array_payload_is_an_error() {
        let err = adapter()
            .normalize_data(RawData::Json(json!({"error": "bad iid"})), &ctx())
            .unwrap_err();
        assert!(err.to_string().contains("an object"));
        assert!(
            adapter()
                .normalize_data(RawData::Json(Value::Null), &ctx())
                .unwrap()
                .events
                .is_empty()
        );
    }

    #[test]
    fn label_flattening() {
        assert_eq!(flatten_labels(&json!("Teens")), "Teens");
        assert_eq!(flatten_labels(&json!(["Teens", "Adults"])), "Teens Adults");
        assert_eq!(flatten_labels(&json!([{"name": "Seniors"}, {"id": 4}])), "Seniors");
        assert_eq!(flatten_labels(&json!(null)), "");
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("1")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!(null)));
    }
}
