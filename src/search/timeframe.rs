//! Relative time phrases ("yesterday", "last week", "last 3 days") → time ranges
//!
//! All windows are computed against an explicit reference time in UTC.
//! When a query holds several phrases, the shortest window wins.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::params::TimeRange;

#[derive(Debug, Clone, Copy)]
enum Phrase {
    LastN,
    Today,
    Yesterday,
    LastWeek,
    ThisWeek,
    ThisMonth,
    LastMonth,
}

fn patterns() -> &'static [(Regex, Phrase)] {
    static PATTERNS: OnceLock<Vec<(Regex, Phrase)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                r"(?i)\b(?:last|past|previous)\s+(\d{1,3})\s+(hours?|days?|weeks?)\b",
                Phrase::LastN,
            ),
            (r"(?i)\b(?:today|this\s+day)\b", Phrase::Today),
            (r"(?i)\byesterday\b", Phrase::Yesterday),
            (r"(?i)\b(?:last|past|previous)\s+week\b", Phrase::LastWeek),
            (r"(?i)\b(?:this|current)\s+week\b", Phrase::ThisWeek),
            (r"(?i)\b(?:this|current)\s+month\b", Phrase::ThisMonth),
            (r"(?i)\b(?:last|past|previous)\s+month\b", Phrase::LastMonth),
        ]
        .into_iter()
        .map(|(p, kind)| (Regex::new(p).expect("Invalid time phrase regex"), kind))
        .collect()
    })
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_nano_opt(23, 59, 59, 999_999_999)?.and_utc())
}

fn window(kind: Phrase, caps: &Captures, now: DateTime<Utc>) -> Option<TimeRange> {
    let today = now.date_naive();
    match kind {
        Phrase::LastN => {
            let n: i64 = caps.get(1)?.as_str().parse().ok()?;
            if n == 0 {
                return None;
            }
            let unit = caps.get(2)?.as_str().to_lowercase();
            let (span, unit_name) = if unit.starts_with("hour") {
                (Duration::hours(n), "hours")
            } else if unit.starts_with("week") {
                (Duration::weeks(n), "weeks")
            } else {
                (Duration::days(n), "days")
            };
            Some(TimeRange::new(
                now - span,
                now,
                format!("last {} {}", n, unit_name),
            ))
        }
        Phrase::Today => Some(TimeRange::new(start_of_day(today)?, now, "today")),
        Phrase::Yesterday => {
            let day = today.pred_opt()?;
            Some(TimeRange::new(
                start_of_day(day)?,
                end_of_day(day)?,
                "yesterday",
            ))
        }
        Phrase::LastWeek => Some(TimeRange::new(now - Duration::days(7), now, "last week")),
        Phrase::ThisWeek => {
            let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            Some(TimeRange::new(start_of_day(monday)?, now, "this week"))
        }
        Phrase::ThisMonth => {
            let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
            let next_first = if today.month() == 12 {
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)?
            };
            Some(TimeRange::new(
                start_of_day(first)?,
                end_of_day(next_first.pred_opt()?)?,
                "this month",
            ))
        }
        Phrase::LastMonth => Some(TimeRange::new(
            now - Duration::days(30),
            now,
            "last month",
        )),
    }
}

/// Every time phrase in `text` with its byte span
fn find_all(text: &str, now: DateTime<Utc>) -> Vec<(std::ops::Range<usize>, TimeRange)> {
    let mut found = Vec::new();
    for (regex, kind) in patterns() {
        for caps in regex.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if let Some(range) = window(*kind, &caps, now) {
                found.push((m.range(), range));
            }
        }
    }
    found.sort_by_key(|(span, _)| span.start);
    found
}

/// Shortest window among `found`; earliest phrase wins ties
fn most_specific(found: &[(std::ops::Range<usize>, TimeRange)]) -> Option<TimeRange> {
    found
        .iter()
        .min_by_key(|(span, range)| (range.span(), span.start))
        .map(|(_, range)| range.clone())
}

/// Resolve a standalone phrase (e.g. from model output) to a range
pub fn resolve(phrase: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    most_specific(&find_all(phrase, now))
}

/// Pull time phrases out of `text`, returning the chosen range and the remaining text
pub fn extract(text: &str, now: DateTime<Utc>) -> (Option<TimeRange>, String) {
    let found = find_all(text, now);
    let chosen = most_specific(&found);

    let mut remaining = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, _) in &found {
        if span.start < cursor {
            continue;
        }
        remaining.push_str(&text[cursor..span.start]);
        remaining.push(' ');
        cursor = span.end;
    }
    remaining.push_str(&text[cursor..]);

    (chosen, remaining)
}
