// src/normalize/location.rs
//! Venue text → `{city, region}`.
//!
//! Venue cells look like `KUALA LUMPUR, MALAYSIA`, `Singapore`, `Hanoi - Viet Nam` or
//! `Houston | USA`. Segments are title-cased, the city is the first one, and the region is
//! the right-most segment found in the gazetteer (aliases included).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::NormalizeError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub city: Option<String>,
    pub region: Option<String>,
}

/// Canonical ASEAN regions keyed by lower-cased name or alias.
static GAZETTEER: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("singapore", "Singapore"),
        ("republic of singapore", "Singapore"),
        ("malaysia", "Malaysia"),
        ("indonesia", "Indonesia"),
        ("thailand", "Thailand"),
        ("vietnam", "Vietnam"),
        ("viet nam", "Vietnam"),
        ("philippines", "Philippines"),
        ("the philippines", "Philippines"),
        ("cambodia", "Cambodia"),
        ("laos", "Laos"),
        ("lao pdr", "Laos"),
        ("myanmar", "Myanmar"),
        ("burma", "Myanmar"),
        ("brunei", "Brunei"),
        ("brunei darussalam", "Brunei"),
    ])
});

/// Countries outside the gazetteer that a single-segment venue may still name.
const KNOWN_COUNTRIES: &[&str] = &[
    "australia",
    "bangladesh",
    "china",
    "france",
    "germany",
    "hong kong",
    "india",
    "japan",
    "netherlands",
    "new zealand",
    "pakistan",
    "south korea",
    "sri lanka",
    "taiwan",
    "united arab emirates",
    "united kingdom",
    "united states",
    "usa",
    "uae",
    "uk",
];

static RE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,/|\-\x{2013}\x{2014}]").expect("location split regex"));

/// Gazetteer lookup, case-insensitive.
pub fn canonical_region(name: &str) -> Option<&'static str> {
    let key = name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    GAZETTEER.get(key.as_str()).copied()
}

fn is_known_country(name: &str) -> bool {
    let key = name.trim().to_lowercase();
    KNOWN_COUNTRIES.contains(&key.as_str())
}

/// `KUALA LUMPUR` → `Kuala Lumpur`.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut out = String::with_capacity(w.len());
            let mut at_start = true;
            for ch in w.chars() {
                if at_start {
                    out.extend(ch.to_uppercase());
                } else {
                    out.extend(ch.to_lowercase());
                }
                at_start = !ch.is_alphanumeric() && ch != '\'' && ch != '\u{2019}';
            }
            out
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split venue text into `{city, region}`.
///
/// Regions come from the gazetteer (right-to-left), then a lone known country, then
/// `fallback_region`, then, with no fallback, the last of several segments as-is.
/// A missing city, or one equal to the region, becomes the region.
pub fn normalize_location(
    text: &str,
    fallback_region: Option<&str>,
) -> Result<Location, NormalizeError> {
    let cleaned = text.replace('\u{00A0}', " ");
    let segments: Vec<String> = RE_SPLIT
        .split(&cleaned)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(title_case)
        .collect();

    let fallback = fallback_region.map(str::trim).filter(|f| !f.is_empty());
    if segments.is_empty() && fallback.is_none() {
        return Err(NormalizeError::InvalidLocation(text.to_string()));
    }

    let mut city = segments.first().cloned();
    let mut region: Option<String> = segments
        .iter()
        .rev()
        .find_map(|seg| canonical_region(seg))
        .map(String::from);

    if segments.len() == 1 {
        if region.is_some() {
            city = region.clone();
        } else if is_known_country(&segments[0]) {
            region = Some(segments[0].clone());
        }
    }

    if region.is_none() {
        region = fallback.map(String::from);
    }
    if region.is_none() && segments.len() > 1 {
        region = segments.last().cloned();
    }

    if let Some(r) = &region {
        let same = city.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(r));
        if city.is_none() || same {
            city = Some(r.clone());
        }
    }

    Ok(Location { city, region })
}
