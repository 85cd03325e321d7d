// Events API sink against a mock server.
use chrono::{FixedOffset, TimeZone};
use librova::error::AppError;
use librova::models::EventPayload;
use librova::storage::{ApiSink, EventSink, SinkOutcome};
use mockito::{Matcher, Server};

fn payload(title: &str) -> EventPayload {
    let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
    EventPayload {
        title: title.to_string(),
        start_time: eastern.with_ymd_and_hms(2026, 2, 5, 10, 30, 0).unwrap(),
        end_time: None,
        library_id: 3,
        description: "Songs and stories".to_string(),
        registration_link: None,
        event_url: Some("https://example.org/event/1".to_string()),
        category_ids: vec![1, 10],
    }
}

#[tokio::test]
async fn test_submit_reports_inserted_and_duplicate() {
    let mut server = Server::new_async().await;
    let inserted = server
        .mock("POST", "/api/events")
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::PartialJsonString(
            r#"{"title": "Family Storytime", "start_time": "2026-02-05T10:30:00-05:00", "category_ids": [1, 10]}"#
                .to_string(),
        ))
        .with_status(201)
        .with_body(r#"{"inserted": true}"#)
        .create_async()
        .await;
    let duplicate = server
        .mock("POST", "/api/events")
        .match_body(Matcher::PartialJsonString(r#"{"title": "Chess Club"}"#.to_string()))
        .with_status(201)
        .with_body(r#"{"inserted": false}"#)
        .create_async()
        .await;

    let sink = ApiSink::new(
        reqwest::Client::new(),
        &format!("{}/api/events", server.url()),
        "secret",
    );

    assert_eq!(
        sink.submit(&payload("Family Storytime")).await.unwrap(),
        SinkOutcome::Inserted
    );
    assert_eq!(
        sink.submit(&payload("Chess Club")).await.unwrap(),
        SinkOutcome::Duplicate
    );
    inserted.assert_async().await;
    duplicate.assert_async().await;
}

#[tokio::test]
async fn test_submit_reports_rejection_detail() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/events")
        .with_status(400)
        .with_body("library_id is required")
        .create_async()
        .await;

    let sink = ApiSink::new(
        reqwest::Client::new(),
        &format!("{}/api/events", server.url()),
        "secret",
    );

    assert_eq!(
        sink.submit(&payload("Chess Club")).await.unwrap(),
        SinkOutcome::Rejected {
            status: 400,
            detail: "library_id is required".to_string()
        }
    );
}

#[tokio::test]
async fn test_submit_with_unreadable_created_body_is_rejected() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/events")
        .with_status(201)
        .with_body("ok")
        .create_async()
        .await;

    let sink = ApiSink::new(
        reqwest::Client::new(),
        &format!("{}/api/events", server.url()),
        "secret",
    );

    assert_eq!(
        sink.submit(&payload("Chess Club")).await.unwrap(),
        SinkOutcome::Rejected {
            status: 201,
            detail: "ok".to_string()
        }
    );
}

#[tokio::test]
async fn test_cleanup_reports_deleted_count() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/api/events/cleanup")
        .match_header("authorization", "Bearer secret")
        .with_status(200)
        .with_body(r#"{"deletedCount": 12}"#)
        .create_async()
        .await;

    let sink = ApiSink::new(
        reqwest::Client::new(),
        &format!("{}/api/events/", server.url()),
        "secret",
    );

    let report = sink.cleanup().await.unwrap();
    assert_eq!(report.deleted, Some(12));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cleanup_failure_is_sink_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/api/events/cleanup")
        .with_status(401)
        .with_body("unauthorized")
        .create_async()
        .await;

    let sink = ApiSink::new(
        reqwest::Client::new(),
        &format!("{}/api/events", server.url()),
        "wrong",
    );

    let err = sink.cleanup().await.unwrap_err();
    assert!(matches!(err, AppError::Sink { status: 401, .. }));
}
