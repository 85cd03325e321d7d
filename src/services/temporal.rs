// src/services/temporal.rs

//! Date/time normalization for calendar listings.
//!
//! Calendars render dates in several shapes:
//!
//! - ISO dates, optionally with a time (`2026-02-25T10:00:00`)
//! - weekday-qualified dates without a year (`Thursday, February 5`,
//!   `Thu, Feb 5`) paired with a separate time text that may be a single time,
//!   a range (`11:15—11:45 AM`), `All Day`, or `Closed`
//!
//! [`TemporalNormalizer`] turns any of these into a wall-clock
//! [`NaiveDateTime`] in the calendar's timezone. The year of a yearless date is
//! inferred from the reference date the normalizer was built with.

use chrono::format::ParseErrorKind;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::DateError;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const RANGE_SEPARATORS: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

/// Morning or afternoon half of a 12-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Am,
    Pm,
}

impl Period {
    /// Library-hours heuristic for a time without any marker: nothing is
    /// scheduled between 1 AM and 7 AM, so small hours and noon are afternoon.
    pub fn infer(hour: u32) -> Self {
        if hour < 8 || hour == 12 {
            Period::Pm
        } else {
            Period::Am
        }
    }

    fn opposite(self) -> Self {
        match self {
            Period::Am => Period::Pm,
            Period::Pm => Period::Am,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Period::Am => "AM",
            Period::Pm => "PM",
        }
    }
}

/// A normalized start with an optional end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    fn starting(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }
}

/// Polymorphic date parser anchored to a reference date.
#[derive(Debug, Clone, Copy)]
pub struct TemporalNormalizer {
    today: NaiveDate,
}

impl TemporalNormalizer {
    /// Create a normalizer whose year inference is relative to `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Normalize a raw date and time into the event start.
    pub fn normalize(
        &self,
        date_raw: &str,
        time_raw: Option<&str>,
        is_all_day: bool,
    ) -> Result<NaiveDateTime, DateError> {
        self.normalize_range(date_raw, time_raw, is_all_day)
            .map(|range| range.start)
    }

    /// Normalize a raw date and time into a start and, for ranges, an end.
    ///
    /// The start is identical to [`normalize`](Self::normalize). The end is
    /// best effort: it is `None` when missing, unparseable, or not after the
    /// start.
    pub fn normalize_range(
        &self,
        date_raw: &str,
        time_raw: Option<&str>,
        is_all_day: bool,
    ) -> Result<TimeRange, DateError> {
        let date_raw = date_raw.trim();
        if date_raw.is_empty() {
            return Err(DateError::InvalidDate(String::new()));
        }

        if let Some((date, has_time_part)) = parse_iso_date(date_raw) {
            if has_time_part || is_all_day {
                return Ok(TimeRange::starting(date.and_time(NaiveTime::MIN)));
            }
            return self.normalize_iso_with_time(date, date_raw, time_raw);
        }

        let date = HumanDate::parse(date_raw)?;
        if is_all_day {
            return self.date_only(&date).map(TimeRange::starting);
        }

        let time_raw = time_raw
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DateError::MissingTime(date_raw.to_string()))?;

        match classify_time(time_raw) {
            TimeText::Closed => Err(DateError::Closed),
            TimeText::AllDay => self.date_only(&date).map(TimeRange::starting),
            TimeText::Clock { start, end } => {
                let start_clock = Clock::parse(start)
                    .ok_or_else(|| DateError::InvalidTime(time_raw.to_string()))?;
                let (hour, period) = start_clock.resolve(find_period(time_raw));
                let start_at = self.date_time(&date, hour, start_clock.minute, period)?;

                let end_at = end.and_then(Clock::parse).and_then(|clock| {
                    clock
                        .end_readings(period)
                        .into_iter()
                        .filter_map(|(hour, period)| {
                            self.date_time(&date, hour, clock.minute, period).ok()
                        })
                        .find(|end_at| *end_at > start_at)
                });

                Ok(TimeRange {
                    start: start_at,
                    end: end_at,
                })
            }
        }
    }

    /// ISO date without a time part, with the time carried separately.
    fn normalize_iso_with_time(
        &self,
        date: NaiveDate,
        date_raw: &str,
        time_raw: Option<&str>,
    ) -> Result<TimeRange, DateError> {
        let time_raw = time_raw
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DateError::MissingTime(date_raw.to_string()))?;

        match classify_time(time_raw) {
            TimeText::Closed => Err(DateError::Closed),
            TimeText::AllDay => Ok(TimeRange::starting(date.and_time(NaiveTime::MIN))),
            TimeText::Clock { start, end } => {
                let clock = Clock::parse(start)
                    .ok_or_else(|| DateError::InvalidTime(time_raw.to_string()))?;
                let (hour, period) = clock.resolve(find_period(time_raw));
                let start_at = date.and_time(clock.time_at(hour, period)?);
                let end_at = end.and_then(Clock::parse).and_then(|clock| {
                    clock
                        .end_readings(period)
                        .into_iter()
                        .filter_map(|(hour, period)| clock.time_at(hour, period).ok())
                        .map(|time| date.and_time(time))
                        .find(|end_at| *end_at > start_at)
                });
                Ok(TimeRange {
                    start: start_at,
                    end: end_at,
                })
            }
        }
    }

    /// Year for a yearless date: the reference year, or the next one when a
    /// January date is seen in December.
    pub fn infer_year(&self, month: u32) -> i32 {
        let year = self.today.year();
        if self.today.month() == 12 && month == 1 {
            year + 1
        } else {
            year
        }
    }

    fn date_only(&self, date: &HumanDate) -> Result<NaiveDateTime, DateError> {
        let year = date.year.unwrap_or_else(|| self.infer_year(date.month));
        let stamp = format!("{} {}", date.render(), year);
        let format = format!("{} %Y", date.format());

        let parsed = match NaiveDate::parse_from_str(&stamp, &format) {
            Err(e) if e.kind() == ParseErrorKind::Impossible => {
                // Weekday disagrees with the inferred year; month and day win.
                NaiveDate::parse_from_str(
                    &format!("{} {}", date.render_without_weekday(), year),
                    &format!("{} %Y", date.format_without_weekday()),
                )
            }
            other => other,
        };

        parsed
            .map(|d| d.and_time(NaiveTime::MIN))
            .map_err(|source| DateError::Parse {
                input: stamp,
                source,
            })
    }

    fn date_time(
        &self,
        date: &HumanDate,
        hour: u32,
        minute: u32,
        period: Period,
    ) -> Result<NaiveDateTime, DateError> {
        let year = date.year.unwrap_or_else(|| self.infer_year(date.month));
        let clock = format!("{}:{:02} {}", hour, minute, period.as_str());
        let stamp = format!("{} {} {}", date.render(), year, clock);
        let format = format!("{} %Y %I:%M %p", date.format());

        match NaiveDateTime::parse_from_str(&stamp, &format) {
            Ok(parsed) => Ok(parsed),
            Err(e) if e.kind() == ParseErrorKind::Impossible => NaiveDateTime::parse_from_str(
                &format!("{} {} {}", date.render_without_weekday(), year, clock),
                &format!("{} %Y %I:%M %p", date.format_without_weekday()),
            )
            .map_err(|source| DateError::Parse {
                input: stamp,
                source,
            }),
            Err(source) => Err(DateError::Parse {
                input: stamp,
                source,
            }),
        }
    }
}

/// Parse a full ISO-8601 timestamp into wall-clock time.
///
/// Offsets are dropped: the local reading is kept as written, which is what
/// APIs that already localize to the calendar's timezone return.
pub fn parse_iso_datetime(raw: &str) -> Result<NaiveDateTime, DateError> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| DateError::InvalidDate(raw.to_string()))
}

/// Parse the date portion of an ISO string, reporting whether a `T` time part
/// follows it.
fn parse_iso_date(raw: &str) -> Option<(NaiveDate, bool)> {
    let head = raw.get(..10)?;
    let date = NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()?;
    let has_time_part = raw[10..].starts_with(['T', 't']);
    Some((date, has_time_part))
}

enum TimeText<'a> {
    Closed,
    AllDay,
    Clock { start: &'a str, end: Option<&'a str> },
}

fn classify_time(time_raw: &str) -> TimeText<'_> {
    let lowered = time_raw.to_lowercase();
    if lowered.contains("closed") {
        return TimeText::Closed;
    }
    if lowered.contains("all day") {
        return TimeText::AllDay;
    }

    match time_raw.find(RANGE_SEPARATORS) {
        Some(idx) => {
            let sep_len = time_raw[idx..].chars().next().map_or(1, char::len_utf8);
            let end = time_raw[idx + sep_len..].trim();
            TimeText::Clock {
                start: time_raw[..idx].trim(),
                end: (!end.is_empty()).then_some(end),
            }
        }
        None => TimeText::Clock {
            start: time_raw.trim(),
            end: None,
        },
    }
}

/// Uppercase `text` with whitespace and periods removed, so `a.m.`, `a. m.`
/// and `AM` all read as `AM`.
fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect::<String>()
        .to_uppercase()
}

/// First AM/PM marker that directly follows a digit.
fn find_period(text: &str) -> Option<Period> {
    let compacted = compact(text);
    let bytes = compacted.as_bytes();
    (1..bytes.len().saturating_sub(1)).find_map(|i| {
        if !bytes[i - 1].is_ascii_digit() || bytes[i + 1] != b'M' {
            return None;
        }
        match bytes[i] {
            b'A' => Some(Period::Am),
            b'P' => Some(Period::Pm),
            _ => None,
        }
    })
}

/// A clock reading as written, before AM/PM resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clock {
    hour: u32,
    minute: u32,
    period: Option<Period>,
}

impl Clock {
    fn parse(text: &str) -> Option<Self> {
        let compacted = compact(text);
        match compacted.as_str() {
            "NOON" => {
                return Some(Self {
                    hour: 12,
                    minute: 0,
                    period: Some(Period::Pm),
                });
            }
            "MIDNIGHT" => {
                return Some(Self {
                    hour: 12,
                    minute: 0,
                    period: Some(Period::Am),
                });
            }
            _ => {}
        }

        let (digits, period) = if let Some(rest) = compacted.strip_suffix("AM") {
            (rest, Some(Period::Am))
        } else if let Some(rest) = compacted.strip_suffix("PM") {
            (rest, Some(Period::Pm))
        } else {
            (compacted.as_str(), None)
        };

        let (hour, minute) = match digits.split_once(':') {
            Some((h, m)) if m.len() == 2 => (h, m),
            Some(_) => return None,
            None => (digits, "00"),
        };
        if hour.is_empty() || hour.len() > 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !minute.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;
        if hour > 23 || minute > 59 || (period.is_some() && !(1..=12).contains(&hour)) {
            return None;
        }

        Some(Self {
            hour,
            minute,
            period,
        })
    }

    /// Resolve to a 12-hour reading: own marker, then `inherited`, then the
    /// library-hours heuristic. Hours 0 and 13-23 are read as a 24-hour clock.
    fn resolve(&self, inherited: Option<Period>) -> (u32, Period) {
        if self.period.is_none() && (self.hour == 0 || self.hour > 12) {
            return match self.hour {
                0 => (12, Period::Am),
                h => (h - 12, Period::Pm),
            };
        }
        let period = self
            .period
            .or(inherited)
            .unwrap_or_else(|| Period::infer(self.hour));
        (self.hour, period)
    }

    /// Candidate readings for a range end, in order. An end without its own
    /// marker tries the start's period first, then the other half of the day.
    fn end_readings(&self, start: Period) -> [(u32, Period); 2] {
        if self.period.is_some() || self.hour == 0 || self.hour > 12 {
            let reading = self.resolve(None);
            return [reading, reading];
        }
        [(self.hour, start), (self.hour, start.opposite())]
    }

    fn time_at(&self, hour: u32, period: Period) -> Result<NaiveTime, DateError> {
        let hour24 = match (hour, period) {
            (12, Period::Am) => 0,
            (12, Period::Pm) => 12,
            (h, Period::Am) => h,
            (h, Period::Pm) => h + 12,
        };
        NaiveTime::from_hms_opt(hour24, self.minute, 0)
            .ok_or_else(|| DateError::InvalidTime(format!("{}:{:02}", hour, self.minute)))
    }
}

/// A weekday-qualified date as written, e.g. `Thursday, February 5`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HumanDate {
    weekday: usize,
    month: u32,
    day: u32,
    year: Option<i32>,
    long_weekday: bool,
    long_month: bool,
}

impl HumanDate {
    /// Tokenize on commas and whitespace, tolerating stray separators such as
    /// `Thursday,February 5` or `Thu , Feb. 5`.
    fn parse(raw: &str) -> Result<Self, DateError> {
        let invalid = || DateError::InvalidDate(raw.to_string());
        let tokens: Vec<&str> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.trim_matches('.'))
            .filter(|t| !t.is_empty())
            .collect();

        let (weekday_tok, month_tok, day_tok, year_tok) = match tokens.as_slice() {
            [w, m, d] => (*w, *m, *d, None),
            [w, m, d, y] => (*w, *m, *d, Some(*y)),
            _ => return Err(invalid()),
        };

        let weekday = name_index(weekday_tok, &WEEKDAYS).ok_or_else(invalid)?;
        let month = name_index(month_tok, &MONTHS).ok_or_else(invalid)? as u32 + 1;

        let day_digits = day_tok.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        let day: u32 = day_digits.parse().map_err(|_| invalid())?;
        if !(1..=31).contains(&day) {
            return Err(invalid());
        }

        let year = match year_tok {
            Some(y) if y.len() == 4 => Some(y.parse::<i32>().map_err(|_| invalid())?),
            Some(_) => return Err(invalid()),
            None => None,
        };

        Ok(Self {
            weekday,
            month,
            day,
            year,
            long_weekday: weekday_tok.len() > 3,
            long_month: month_tok.len() > 3,
        })
    }

    fn weekday_name(&self) -> &'static str {
        let name = WEEKDAYS[self.weekday];
        if self.long_weekday { name } else { &name[..3] }
    }

    fn month_name(&self) -> &'static str {
        let name = MONTHS[(self.month - 1) as usize];
        if self.long_month { name } else { &name[..3] }
    }

    /// Canonical text in the style detected from the input.
    fn render(&self) -> String {
        format!("{}, {}", self.weekday_name(), self.render_without_weekday())
    }

    fn render_without_weekday(&self) -> String {
        format!("{} {}", self.month_name(), self.day)
    }

    /// strftime pattern matching [`render`](Self::render).
    fn format(&self) -> String {
        let weekday = if self.long_weekday { "%A" } else { "%a" };
        format!("{}, {}", weekday, self.format_without_weekday())
    }

    fn format_without_weekday(&self) -> String {
        let month = if self.long_month { "%B" } else { "%b" };
        format!("{} %d", month)
    }
}

/// Match a (possibly abbreviated) name by its first three letters.
fn name_index(token: &str, names: &[&str]) -> Option<usize> {
    if token.len() < 3 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let token = token.to_ascii_lowercase();
    names.iter().position(|name| {
        let name = name.to_ascii_lowercase();
        name.starts_with(&token) || (token.starts_with(&name[..3]) && token.len() <= name.len())
    })
}
