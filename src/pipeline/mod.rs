// src/pipeline/mod.rs

//! Scrape pipeline.
//!
//! For every configured source, in order:
//!
//! ```text
//! configured → fetched → normalized → filtered-and-tagged → emitted
//!                 │           │
//!                 └─ skip     └─ error
//! ```
//!
//! A failing source never stops the run; only a configuration without any
//! sources is an error.

mod report;

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::error::{AppError, Result};
use crate::models::{CanonicalEvent, Config, SourceConfig};
use crate::services::{CategoryClassifier, PrivacyFilter};
use crate::sources::{ScrapeContext, SourceAdapter, build_adapter};
use crate::storage::{EventSink, SinkOutcome};

pub use report::{RunSummary, SourceReport, SourceStatus};

/// Current wall-clock time in `tz`.
pub fn local_now(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

/// Run the full pipeline against the wall clock.
pub async fn run_pipeline(
    config: &Config,
    sink: &dyn EventSink,
    client: &reqwest::Client,
) -> Result<RunSummary> {
    let now = local_now(config.tz()?);
    Pipeline::new(config)?.run(sink, client, now).await
}

/// Run only the past-event cleanup. Failures are logged, never returned.
pub async fn run_cleanup(sink: &dyn EventSink) {
    match sink.cleanup().await {
        Ok(report) => match report.deleted {
            Some(n) => log::info!("Cleanup removed {} past events", n),
            None => log::info!("Cleanup completed"),
        },
        Err(e) => log::warn!("Cleanup failed: {}", e),
    }
}

/// Read-only state shared by every source of a run.
pub struct Pipeline<'a> {
    config: &'a Config,
    classifier: CategoryClassifier,
    filter: PrivacyFilter,
    tz: Tz,
}

impl<'a> Pipeline<'a> {
    /// Validate the configuration and compile the category rules.
    pub fn new(config: &'a Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: CategoryClassifier::new(&config.categories)?,
            filter: PrivacyFilter::new(&config.exclusions),
            tz: config.tz()?,
        })
    }

    /// Clean up, then process every source sequentially.
    pub async fn run(
        &self,
        sink: &dyn EventSink,
        client: &reqwest::Client,
        now: NaiveDateTime,
    ) -> Result<RunSummary> {
        log::info!(
            "Scraping {} sources, window {} days from {}",
            self.config.sources.len(),
            self.config.window_days,
            now
        );
        run_cleanup(sink).await;

        let ctx = ScrapeContext::new(now, self.config.window_days);
        let mut summary = RunSummary::default();
        for source in &self.config.sources {
            let report = self.process_source(source, client, &ctx, sink).await;
            summary.push(report);
        }

        log::info!("Run complete: {}", summary);
        Ok(summary)
    }

    async fn process_source(
        &self,
        source: &SourceConfig,
        client: &reqwest::Client,
        ctx: &ScrapeContext,
        sink: &dyn EventSink,
    ) -> SourceReport {
        log::info!("[{}] Processing ({})", source.name, source.platform);
        match build_adapter(source, client, &self.config.timezone) {
            Ok(adapter) => self.process(adapter.as_ref(), ctx, sink).await,
            Err(e @ AppError::UnknownPlatform { .. }) => {
                log::warn!("[{}] Skipped: {}", source.name, e);
                SourceReport::new(&source.name).skipped(e.to_string())
            }
            Err(e) => {
                log::error!("[{}] Cannot build adapter: {}", source.name, e);
                SourceReport::new(&source.name).failed_with(e.to_string())
            }
        }
    }

    /// Fetch, normalize, filter, tag and emit one source.
    pub async fn process(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &ScrapeContext,
        sink: &dyn EventSink,
    ) -> SourceReport {
        let name = adapter.name();
        let mut report = SourceReport::new(name);

        let raw = match adapter.fetch(ctx).await {
            Ok(raw) if raw.is_empty() => {
                log::warn!("[{}] Skipped: nothing fetched", name);
                return report.skipped("nothing fetched");
            }
            Ok(raw) => raw,
            Err(e) if e.is_transport() => {
                log::warn!("[{}] Skipped: {}", name, e);
                return report.skipped(e.to_string());
            }
            Err(e) => {
                log::error!("[{}] Fetch failed: {}", name, e);
                return report.failed_with(e.to_string());
            }
        };

        let batch = match adapter.normalize_data(raw, ctx) {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("[{}] Normalization failed: {}", name, e);
                return report.failed_with(e.to_string());
            }
        };
        report.fetched = batch.seen;
        report.parsed = batch.events.len();
        report.closed = batch.closed;
        report.unparseable = batch.unparseable;
        report.outside_window = batch.outside_window;

        for event in batch.events {
            self.emit(event, sink, &mut report).await;
        }

        log::info!("[{}] Done: {}", name, report);
        report
    }

    async fn emit(
        &self,
        mut event: CanonicalEvent,
        sink: &dyn EventSink,
        report: &mut SourceReport,
    ) {
        if let Some(phrase) = self.filter.blocking_phrase(&event.title, &event.description) {
            report.filtered_private += 1;
            log::debug!(
                "[{}] Private: '{}' (matched '{}')",
                report.source,
                event.title,
                phrase
            );
            return;
        }

        let ids = self.classifier.classify(&event.title, &event.description);
        if !ids.is_empty() {
            report.categorized += 1;
        }
        log::debug!(
            "[{}] '{}' -> {:?}",
            report.source,
            event.title,
            self.classifier.keys(&ids)
        );
        event.assign_categories(ids);

        let payload = match event.to_payload(self.tz) {
            Ok(payload) => payload,
            Err(e) => {
                report.failed += 1;
                log::warn!("[{}] Cannot emit '{}': {}", report.source, event.title, e);
                return;
            }
        };

        report.emitted += 1;
        match sink.submit(&payload).await {
            Ok(SinkOutcome::Inserted) => {
                report.inserted += 1;
                log::info!("[{}] Inserted '{}'", report.source, payload.title);
            }
            Ok(SinkOutcome::Duplicate) => {
                report.duplicates += 1;
                log::info!("[{}] Duplicate '{}'", report.source, payload.title);
            }
            Ok(SinkOutcome::Rejected { status, detail }) => {
                report.failed += 1;
                log::warn!(
                    "[{}] Rejected '{}' ({}): {}",
                    report.source,
                    payload.title,
                    status,
                    detail
                );
            }
            Err(e) => {
                report.failed += 1;
                log::warn!("[{}] Failed to send '{}': {}", report.source, payload.title, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DateError;
    use crate::models::{EventPayload, SourceParams};
    use crate::sources::{NormalizedBatch, RawData};
    use crate::storage::CleanupReport;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<EventPayload>>,
        cleanups: Mutex<usize>,
        reject_titles: Vec<String>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn submit(&self, event: &EventPayload) -> Result<SinkOutcome> {
            if self.reject_titles.contains(&event.title) {
                return Ok(SinkOutcome::Rejected {
                    status: 400,
                    detail: "bad".into(),
                });
            }
            let mut events = self.events.lock().unwrap();
            if events.iter().any(|e| e.dedupe_key() == event.dedupe_key()) {
                return Ok(SinkOutcome::Duplicate);
            }
            events.push(event.clone());
            Ok(SinkOutcome::Inserted)
        }

        async fn cleanup(&self) -> Result<CleanupReport> {
            *self.cleanups.lock().unwrap() += 1;
            Err(AppError::sink(500, "cleanup unavailable"))
        }
    }

    enum Fetch {
        Events(Vec<(&'static str, &'static str)>),
        Empty,
        Unreachable,
        Broken,
    }

    struct FakeAdapter {
        fetch: Fetch,
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn name(&self) -> &str {
            "Fake"
        }

        fn library_id(&self) -> i64 {
            9
        }

        async fn fetch(&self, _ctx: &ScrapeContext) -> Result<RawData> {
            match &self.fetch {
                Fetch::Empty => Ok(RawData::Markup(String::new())),
                Fetch::Unreachable => {
                    // Port 9 on localhost refuses connections.
                    let err = reqwest::Client::new()
                        .get("http://127.0.0.1:9/")
                        .send()
                        .await
                        .unwrap_err();
                    Err(AppError::Http(err))
                }
                _ => Ok(RawData::Markup("<html></html>".into())),
            }
        }

        fn normalize_data(&self, _raw: RawData, ctx: &ScrapeContext) -> Result<NormalizedBatch> {
            let Fetch::Events(items) = &self.fetch else {
                return Err(AppError::adapter("Fake", "unexpected layout"));
            };
            let mut batch = NormalizedBatch::default();
            for &(title, time) in items {
                batch.seen += 1;
                let parsed = ctx
                    .normalizer
                    .normalize_range("Thursday, February 5", Some(time), false);
                let admitted = batch.admit("Fake", title, ("", Some(time)), parsed, &ctx.window);
                if let Some(range) = admitted {
                    batch.events.push(
                        CanonicalEvent::new(title, range.start, 9).with_end_time(range.end),
                    );
                }
            }
            Ok(batch)
        }
    }

    fn config() -> Config {
        Config {
            sources: vec![SourceConfig {
                library_id: 9,
                name: "Fake".into(),
                platform: "assabet".into(),
                params: SourceParams {
                    url: Some("https://example.org/calendar".into()),
                    ..SourceParams::default()
                },
            }],
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn filters_tags_and_emits() {
        let config = config();
        let pipeline = Pipeline::new(&config).unwrap();
        let sink = RecordingSink {
            reject_titles: vec!["Knitting Circle".into()],
            ..RecordingSink::default()
        };
        let adapter = FakeAdapter {
            fetch: Fetch::Events(vec![
                ("Family Storytime", "10:30 AM"),
                ("Community Room Reservation", "1:00 PM"),
                ("Library Closed", "Closed"),
                ("Mystery", "whenever"),
                ("Knitting Circle", "2:00 PM"),
                ("Chess Club", "4:00 PM"),
                ("Chess Club", "4:00 PM"),
            ]),
        };

        let ctx = ScrapeContext::new(now(), 7);
        let report = pipeline.process(&adapter, &ctx, &sink).await;

        assert_eq!(report.status, SourceStatus::Completed);
        assert_eq!(report.fetched, 7);
        assert_eq!(report.parsed, 5);
        assert_eq!(report.closed, 1);
        assert_eq!(report.unparseable, 1);
        assert_eq!(report.filtered_private, 1);
        assert_eq!(report.emitted, 4);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failed, 1);

        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].title, "Family Storytime");
        assert_eq!(events[0].category_ids, vec![1, 10]);
        assert_eq!(events[0].start_time.to_rfc3339(), "2026-02-05T10:30:00-05:00");
        assert!(events.iter().all(|e| e.title != "Community Room Reservation"));
    }

    #[tokio::test]
    async fn empty_and_unreachable_sources_are_skipped() {
        let config = config();
        let pipeline = Pipeline::new(&config).unwrap();
        let sink = RecordingSink::default();
        let ctx = ScrapeContext::new(now(), 7);

        let empty = pipeline
            .process(&FakeAdapter { fetch: Fetch::Empty }, &ctx, &sink)
            .await;
        assert!(matches!(empty.status, SourceStatus::Skipped(_)));

        let unreachable = pipeline
            .process(&FakeAdapter { fetch: Fetch::Unreachable }, &ctx, &sink)
            .await;
        assert!(matches!(unreachable.status, SourceStatus::Skipped(_)));

        let broken = pipeline
            .process(&FakeAdapter { fetch: Fetch::Broken }, &ctx, &sink)
            .await;
        assert!(matches!(broken.status, SourceStatus::Failed(_)));
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_platform_does_not_stop_the_run() {
        let mut config = config();
        config.sources.insert(
            0,
            SourceConfig {
                library_id: 1,
                name: "Mystery Library".into(),
                platform: "bibliocommons".into(),
                params: SourceParams::default(),
            },
        );
        // Nothing listens on port 9, so the second source is unreachable.
        config.sources[1].params.url = Some("http://127.0.0.1:9/calendar".into());

        let sink = RecordingSink::default();
        let summary = Pipeline::new(&config)
            .unwrap()
            .run(&sink, &reqwest::Client::new(), now())
            .await
            .unwrap();

        assert_eq!(*sink.cleanups.lock().unwrap(), 1);
        assert_eq!(summary.sources.len(), 2);
        assert_eq!(summary.skipped_sources(), 2);
        assert_eq!(summary.emitted(), 0);
    }

    #[test]
    fn no_sources_is_a_configuration_error() {
        let config = Config::default();
        assert!(matches!(Pipeline::new(&config), Err(AppError::Config(_))));
    }

    #[test]
    fn closed_error_is_not_counted_as_unparseable() {
        let ctx = ScrapeContext::new(now(), 7);
        let mut batch = NormalizedBatch::default();
        let admitted = batch.admit(
            "Fake",
            "Closed",
            ("", None),
            Err(DateError::Closed),
            &ctx.window,
        );
        assert!(admitted.is_none());
        assert_eq!(batch.closed, 1);
        assert_eq!(batch.unparseable, 0);
    }
}
