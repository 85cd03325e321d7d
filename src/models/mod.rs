// src/models/mod.rs

//! Domain models for the scraper.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod category;
mod config;
mod event;
mod source;

// Re-export all public types
pub use category::{CategoryId, CategoryRule};
pub use config::{Config, HttpConfig, SinkConfig};
pub use event::{CanonicalEvent, EventPayload, LibraryId, localize};
pub use source::{SourceConfig, SourceParams};
