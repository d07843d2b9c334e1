// src/normalize/date.rs
//! Partial date parsing for listing pages.
//!
//! Listing sites print dates as `02 Nov`, `OCT 20-21`, `DEC 9-10 2026` or `OCT 13, 2025`.
//! When the year is missing we take the caller's fallback year (usually read off the page
//! heading) or the processing year, then apply the upcoming-occurrence rule: a date that
//! lands before yesterday is moved to next year. Processing time is always passed in.

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NormalizeError;

/// Resolved start date plus an optional same-month end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

// "02 NOV", "2 NOV 2025"
static RE_DAY_MON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<d>\d{1,2})\s+(?P<mon>[A-Z]{3,4})(?:[, ]+(?P<y>\d{4}))?$")
        .expect("day-month regex")
});

// "OCT 20", "OCT 20-21", "DEC 9-10 2026", "OCT 13, 2025"
static RE_MON_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<mon>[A-Z]{3,4})\s+(?P<d1>\d{1,2})(?:\s*-\s*(?P<d2>\d{1,2}))?(?:[, ]+(?P<y>\d{4}))?$",
    )
    .expect("month-day regex")
});

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("year regex"));

fn month_number(token: &str) -> Option<u32> {
    let m = match token {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" | "JUNE" => 6,
        "JUL" | "JULY" => 7,
        "AUG" => 8,
        "SEP" | "SEPT" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    Some(m)
}

/// Upper-case, unify dashes, drop periods and collapse whitespace.
fn clean(text: &str) -> String {
    let s = text
        .replace('\u{00A0}', " ")
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace('.', "")
        .to_uppercase();
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First 4-digit year in a heading such as `Energy Conference in Singapore 2025-2026`.
pub fn infer_year_from_heading(text: &str) -> Option<i32> {
    RE_YEAR
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

// Leap-day gaps span at most eight years (e.g. 2096 -> 2104).
const LEAP_SEARCH_YEARS: i32 = 8;

/// First valid `(year, date)` from `base` on, rolled once past the first valid date that
/// lands before yesterday. Year-less `29 Feb` lands on the next leap year.
fn upcoming(base: i32, mon: u32, day: u32, today: NaiveDate) -> Option<(i32, NaiveDate)> {
    let yesterday = today - Duration::days(1);
    let mut rolled = false;
    for y in base..=base + LEAP_SEARCH_YEARS {
        let Some(d) = NaiveDate::from_ymd_opt(y, mon, day) else {
            continue;
        };
        if rolled || d >= yesterday {
            return Some((y, d));
        }
        rolled = true;
    }
    None
}

/// Parse listing date text into a [`DateSpan`].
///
/// `fallback_year` is used when the text carries no year; otherwise `today`'s year.
/// Inferred-year dates strictly before `today - 1 day` are rolled into the next year
/// (the next leap year for `29 Feb`).
pub fn normalize_partial_date(
    text: &str,
    fallback_year: Option<i32>,
    today: NaiveDate,
) -> Result<DateSpan, NormalizeError> {
    let invalid = || NormalizeError::InvalidDate(text.to_string());
    let s = clean(text);
    if s.is_empty() {
        return Err(invalid());
    }

    let (mon, d1, d2, year) = if let Some(c) = RE_DAY_MON.captures(&s) {
        (
            c.name("mon").map(|m| m.as_str()),
            c.name("d").map(|m| m.as_str()),
            None,
            c.name("y").map(|m| m.as_str()),
        )
    } else if let Some(c) = RE_MON_DAY.captures(&s) {
        (
            c.name("mon").map(|m| m.as_str()),
            c.name("d1").map(|m| m.as_str()),
            c.name("d2").map(|m| m.as_str()),
            c.name("y").map(|m| m.as_str()),
        )
    } else {
        return Err(invalid());
    };

    let mon = mon.and_then(month_number).ok_or_else(invalid)?;
    let d1: u32 = d1.and_then(|d| d.parse().ok()).ok_or_else(invalid)?;
    let d2: Option<u32> = d2.and_then(|d| d.parse().ok());
    let explicit_year: Option<i32> = year.and_then(|y| y.parse().ok());

    let resolved = match explicit_year {
        Some(y) => NaiveDate::from_ymd_opt(y, mon, d1).map(|d| (y, d)),
        None => upcoming(fallback_year.unwrap_or_else(|| today.year()), mon, d1, today),
    };
    let (y, start) = resolved.ok_or_else(invalid)?;

    let end = d2
        .and_then(|d| NaiveDate::from_ymd_opt(y, mon, d))
        .filter(|e| *e >= start);

    Ok(DateSpan { start, end })
}
