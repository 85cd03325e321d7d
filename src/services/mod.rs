//! Service layer for the scraper.
//!
//! This module contains the decision logic applied to every event:
//! - Date/time normalization (`TemporalNormalizer`)
//! - Category tagging (`CategoryClassifier`)
//! - Private booking detection (`PrivacyFilter`)

mod classifier;
mod filter;
mod temporal;

pub use classifier::{CategoryClassifier, keyword_pattern};
pub use filter::PrivacyFilter;
pub use temporal::{Period, TemporalNormalizer, TimeRange, parse_iso_datetime};
