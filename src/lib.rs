// src/lib.rs

//! Librova: public library event calendar scraper.
//!
//! Fetches library calendars (Assabet Interactive pages, LibCal JSON), turns
//! their listings into canonical events with normalized start times, drops
//! private bookings, tags the rest with audience and topic categories, and
//! hands them to an event store.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sources;
pub mod storage;
pub mod utils;
