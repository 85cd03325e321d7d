//! Source (library calendar) configuration.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::LibraryId;

/// One library calendar to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Identifier of the owning library in the event store
    pub library_id: LibraryId,

    /// Display name used in logs
    pub name: String,

    /// Calendar platform, selects the adapter (e.g. "assabet", "libcal")
    pub platform: String,

    /// Platform-specific parameters
    #[serde(flatten)]
    pub params: SourceParams,
}

/// Platform-specific parameter bag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceParams {
    /// Calendar page URL for markup sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Base API URL for JSON sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_api_url: Option<String>,

    /// LibCal institution id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iid: Option<String>,

    /// LibCal calendar id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

impl SourceConfig {
    /// Fetch a required parameter or fail with a configuration error.
    pub fn require<'a>(&self, name: &str, value: &'a Option<String>) -> Result<&'a str> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "source '{}' ({}) is missing '{}'",
                    self.name, self.platform, name
                ))
            })
    }
}
