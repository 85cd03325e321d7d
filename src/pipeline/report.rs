// src/pipeline/report.rs

//! Per-source reports and the run summary.

use std::fmt;

/// How a source's processing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// Events were normalized and handed to the sink
    Completed,
    /// Nothing to do: unreachable, empty, or unknown platform
    Skipped(String),
    /// The adapter failed after fetching
    Failed(String),
}

/// Counters for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub status: SourceStatus,
    /// Raw items found in the fetched payload
    pub fetched: usize,
    /// Items that yielded a start time inside the window
    pub parsed: usize,
    /// Closure notices
    pub closed: usize,
    /// Items dropped for unparseable dates or missing fields
    pub unparseable: usize,
    /// Items outside the rolling window
    pub outside_window: usize,
    /// Events dropped as private bookings
    pub filtered_private: usize,
    /// Events that received at least one category
    pub categorized: usize,
    /// Events handed to the sink
    pub emitted: usize,
    /// Events stored as new
    pub inserted: usize,
    /// Events the sink already had
    pub duplicates: usize,
    /// Events rejected by the sink or lost in transit
    pub failed: usize,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::Completed,
            fetched: 0,
            parsed: 0,
            closed: 0,
            unparseable: 0,
            outside_window: 0,
            filtered_private: 0,
            categorized: 0,
            emitted: 0,
            inserted: 0,
            duplicates: 0,
            failed: 0,
        }
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.status = SourceStatus::Skipped(reason.into());
        self
    }

    pub fn failed_with(mut self, message: impl Into<String>) -> Self {
        self.status = SourceStatus::Failed(message.into());
        self
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} parsed={} closed={} unparseable={} outside_window={} \
             filtered_private={} categorized={} emitted={} inserted={} duplicates={} failed={}",
            self.fetched,
            self.parsed,
            self.closed,
            self.unparseable,
            self.outside_window,
            self.filtered_private,
            self.categorized,
            self.emitted,
            self.inserted,
            self.duplicates,
            self.failed
        )
    }
}

/// Totals across every source of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: SourceReport) {
        self.sources.push(report);
    }

    fn total(&self, field: impl Fn(&SourceReport) -> usize) -> usize {
        self.sources.iter().map(field).sum()
    }

    pub fn fetched(&self) -> usize {
        self.total(|r| r.fetched)
    }

    pub fn parsed(&self) -> usize {
        self.total(|r| r.parsed)
    }

    pub fn filtered_private(&self) -> usize {
        self.total(|r| r.filtered_private)
    }

    pub fn categorized(&self) -> usize {
        self.total(|r| r.categorized)
    }

    pub fn emitted(&self) -> usize {
        self.total(|r| r.emitted)
    }

    pub fn inserted(&self) -> usize {
        self.total(|r| r.inserted)
    }

    pub fn duplicates(&self) -> usize {
        self.total(|r| r.duplicates)
    }

    pub fn failed(&self) -> usize {
        self.total(|r| r.failed)
    }

    pub fn completed_sources(&self) -> usize {
        self.count_status(|s| matches!(s, SourceStatus::Completed))
    }

    pub fn skipped_sources(&self) -> usize {
        self.count_status(|s| matches!(s, SourceStatus::Skipped(_)))
    }

    pub fn failed_sources(&self) -> usize {
        self.count_status(|s| matches!(s, SourceStatus::Failed(_)))
    }

    fn count_status(&self, pred: impl Fn(&SourceStatus) -> bool) -> usize {
        self.sources.iter().filter(|r| pred(&r.status)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sources={} (completed={} skipped={} failed={}) fetched={} parsed={} \
             filtered_private={} categorized={} emitted={} inserted={} duplicates={} failed={}",
            self.sources.len(),
            self.completed_sources(),
            self.skipped_sources(),
            self.failed_sources(),
            self.fetched(),
            self.parsed(),
            self.filtered_private(),
            self.categorized(),
            self.emitted(),
            self.inserted(),
            self.duplicates(),
            self.failed()
        )
    }
}
