// src/error.rs

//! Unified error handling for the scraper.

use std::fmt;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Keyword pattern failed to compile
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Date/time normalization failed
    #[error("Date error: {0}")]
    Date(#[from] DateError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local time could not be pinned to the deployment timezone
    #[error("Timezone error: {0}")]
    Timezone(String),

    /// Source platform has no adapter
    #[error("Unknown platform '{platform}' for source {source_name}")]
    UnknownPlatform {
        platform: String,
        source_name: String,
    },

    /// A source adapter failed after fetching
    #[error("Source error for {source_name}: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    /// The event sink rejected a request
    #[error("Sink error ({status}): {detail}")]
    Sink { status: u16, detail: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a source error with context.
    pub fn adapter(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Create a sink error from a response status and body.
    pub fn sink(status: u16, detail: impl Into<String>) -> Self {
        Self::Sink {
            status,
            detail: detail.into(),
        }
    }

    /// Whether this error means the source could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Reasons a raw date/time pair does not yield a start timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// The listing is a closure notice, not an event.
    #[error("closed")]
    Closed,

    /// A human-readable date came without any time text.
    #[error("missing time for '{0}'")]
    MissingTime(String),

    /// The date text does not have a recognizable layout.
    #[error("unrecognized date '{0}'")]
    InvalidDate(String),

    /// The time text does not have a recognizable layout.
    #[error("unrecognized time '{0}'")]
    InvalidTime(String),

    /// The assembled timestamp was rejected by the parser.
    #[error("cannot parse '{input}': {source}")]
    Parse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}
