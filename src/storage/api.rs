//! REST API sink.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{CleanupReport, EventSink, SinkOutcome};
use crate::error::{AppError, Result};
use crate::models::EventPayload;

#[derive(Debug, Deserialize)]
struct InsertResponse {
    #[serde(default)]
    inserted: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupResponse {
    deleted_count: Option<u64>,
}

/// Posts events to the events API with a bearer token.
pub struct ApiSink {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ApiSink {
    pub fn new(client: reqwest::Client, api_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn cleanup_url(&self) -> String {
        format!("{}/cleanup", self.api_url)
    }
}

#[async_trait]
impl EventSink for ApiSink {
    async fn submit(&self, event: &EventPayload) -> Result<SinkOutcome> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(event)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::CREATED {
            return Ok(SinkOutcome::Rejected {
                status: status.as_u16(),
                detail: body,
            });
        }

        // A 201 the API did not write itself (proxy page, empty body) is a refusal.
        let Ok(parsed) = serde_json::from_str::<InsertResponse>(&body) else {
            return Ok(SinkOutcome::Rejected {
                status: status.as_u16(),
                detail: body,
            });
        };
        Ok(if parsed.inserted {
            SinkOutcome::Inserted
        } else {
            SinkOutcome::Duplicate
        })
    }

    async fn cleanup(&self) -> Result<CleanupReport> {
        let response = self
            .client
            .delete(self.cleanup_url())
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            return Err(AppError::sink(status.as_u16(), body));
        }

        let parsed: CleanupResponse = serde_json::from_str(&body).unwrap_or_default();
        Ok(CleanupReport {
            deleted: parsed.deleted_count,
        })
    }
}
