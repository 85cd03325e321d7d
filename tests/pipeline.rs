// End-to-end runs against mock calendars, writing to a local sink.
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use librova::error::AppError;
use librova::models::{Config, SourceConfig, SourceParams};
use librova::pipeline::{Pipeline, SourceStatus};
use librova::storage::LocalSink;
use mockito::{Matcher, Server};
use tempfile::TempDir;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 2)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

const PAGE: &str = r#"
<html><body>
<div class="listing-event">
  <h2><a href="/event/storytime/">Family Storytime</a></h2>
  <span class="event-day">Tuesday, February 3</span>
  <span class="event-time">10:30&mdash;11:00 AM</span>
  <div class="event-description-excerpt">Songs, rhymes and stories.</div>
</div>
<div class="listing-event">
  <h2>Community Room Reservation</h2>
  <span class="event-day">Tuesday, February 3</span>
  <span class="event-time">1:00&mdash;3:00 PM</span>
</div>
<div class="listing-event">
  <h2>Mystery Time</h2>
  <span class="event-day">Tuesday, February 3</span>
  <span class="event-time">TBD</span>
</div>
</body></html>
"#;

const LIBCAL: &str = r#"[
    {
        "title": "Python Coding for Teens",
        "url": "/event/3001",
        "start": "2026-02-04T16:00:00-05:00",
        "end": "2026-02-04T17:00:00-05:00",
        "registration": true
    },
    {
        "title": "Staff Only: Inventory",
        "start": "2026-02-05T08:00:00-05:00"
    }
]"#;

fn config(server_url: &str) -> Config {
    Config {
        sources: vec![
            SourceConfig {
                library_id: 1,
                name: "Assabet Library".into(),
                platform: "assabet".into(),
                params: SourceParams {
                    url: Some(format!("{}/calendar/", server_url)),
                    ..SourceParams::default()
                },
            },
            SourceConfig {
                library_id: 2,
                name: "Unknown Library".into(),
                platform: "bibliocommons".into(),
                params: SourceParams::default(),
            },
            SourceConfig {
                library_id: 3,
                name: "LibCal Library".into(),
                platform: "libcal".into(),
                params: SourceParams {
                    base_api_url: Some(server_url.to_string()),
                    iid: Some("1".into()),
                    calendar_id: Some("2".into()),
                    ..SourceParams::default()
                },
            },
            SourceConfig {
                library_id: 4,
                name: "Down Library".into(),
                platform: "assabet".into(),
                params: SourceParams {
                    url: Some(format!("{}/down/", server_url)),
                    ..SourceParams::default()
                },
            },
        ],
        ..Config::default()
    }
}

#[tokio::test]
async fn test_full_run_to_local_sink() {
    let mut server = Server::new_async().await;
    let _page = server
        .mock("GET", "/calendar/")
        .with_status(200)
        .with_body(PAGE)
        .create_async()
        .await;
    let _libcal = server
        .mock("GET", "/widget/events/calendar/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(LIBCAL)
        .create_async()
        .await;
    let _down = server
        .mock("GET", "/down/")
        .with_status(500)
        .create_async()
        .await;

    let tmp = TempDir::new().unwrap();
    let sink = LocalSink::new(tmp.path().join("events.json"))
        .with_clock(Utc.with_ymd_and_hms(2026, 2, 2, 14, 0, 0).unwrap());
    let config = config(&server.url());
    let pipeline = Pipeline::new(&config).unwrap();
    let client = reqwest::Client::new();

    let summary = pipeline.run(&sink, &client, now()).await.unwrap();

    assert_eq!(summary.sources.len(), 4);
    assert_eq!(summary.sources[0].status, SourceStatus::Completed);
    assert!(matches!(summary.sources[1].status, SourceStatus::Skipped(_)));
    assert_eq!(summary.sources[2].status, SourceStatus::Completed);
    assert!(matches!(summary.sources[3].status, SourceStatus::Skipped(_)));

    assert_eq!(summary.fetched(), 5);
    assert_eq!(summary.parsed(), 4);
    assert_eq!(summary.filtered_private(), 2);
    assert_eq!(summary.emitted(), 2);
    assert_eq!(summary.inserted(), 2);
    assert_eq!(summary.sources[0].unparseable, 1);

    let stored = sink.load().await.unwrap();
    assert_eq!(stored.count, 2);

    let storytime = &stored.events[0];
    assert_eq!(storytime.title, "Family Storytime");
    assert_eq!(storytime.category_ids, vec![1, 10]);
    assert_eq!(storytime.start_time.to_rfc3339(), "2026-02-03T10:30:00-05:00");
    assert_eq!(
        storytime.end_time.map(|t| t.to_rfc3339()),
        Some("2026-02-03T11:00:00-05:00".to_string())
    );

    let coding = &stored.events[1];
    assert_eq!(coding.library_id, 3);
    assert_eq!(coding.category_ids, vec![7, 8]);
    assert_eq!(coding.registration_link, coding.event_url);

    // A second run finds everything already stored.
    let again = pipeline.run(&sink, &client, now()).await.unwrap();
    assert_eq!(again.inserted(), 0);
    assert_eq!(again.duplicates(), 2);
}

#[tokio::test]
async fn test_run_without_sources_fails() {
    let config = Config::default();
    let err = Pipeline::new(&config).err().unwrap();
    assert!(matches!(err, AppError::Config(_)));
}
