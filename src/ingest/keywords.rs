// src/ingest/keywords.rs
//! Title keyword gate for news entries.

use std::collections::BTreeSet;

/// Outcome of [`matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub keep: bool,
    /// Any-keyword hits plus the full all-keyword set, sorted and deduplicated.
    pub matched: Vec<String>,
}

fn as_str<S: AsRef<str>>(s: &S) -> &str {
    s.as_ref()
}

/// Case-insensitive substring gate.
///
/// `keep = (any empty || some any-keyword present) && (all empty || every all-keyword present)`.
pub fn matches<S: AsRef<str>>(title: &str, any_keywords: &[S], all_keywords: &[S]) -> KeywordMatch {
    let t = title.to_lowercase();
    let present = |k: &str| t.contains(&k.to_lowercase());

    let any_hits: Vec<&str> = any_keywords
        .iter()
        .map(as_str)
        .filter(|k| !k.is_empty() && present(*k))
        .collect();
    let all_ok = all_keywords.iter().all(|k| present(as_str(k)));

    let keep = (any_keywords.is_empty() || !any_hits.is_empty())
        && (all_keywords.is_empty() || all_ok);

    let matched: BTreeSet<String> = any_hits
        .into_iter()
        .chain(all_keywords.iter().map(as_str))
        .map(str::to_string)
        .collect();

    KeywordMatch {
        keep,
        matched: matched.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_keywords_keep_and_label() {
        let any = ["energy", "solar"];
        let got = matches("Solar park opens in Laos", &any, &[]);
        assert!(got.keep);
        assert_eq!(got.matched, vec!["solar".to_string()]);

        let got = matches("City council meeting", &any, &[]);
        assert!(!got.keep);
        assert!(got.matched.is_empty());
    }

    #[test]
    fn all_keywords_must_all_be_present() {
        let any: [&str; 0] = [];
        let all = ["grid", "Battery"];
        assert!(matches("Grid-scale battery tender", &any, &all).keep);
        let got = matches("Grid tender", &any, &all);
        assert!(!got.keep);
        assert_eq!(got.matched, vec!["Battery".to_string(), "grid".to_string()]);
    }

    #[test]
    fn empty_sets_keep_everything() {
        let none: [&str; 0] = [];
        let got = matches("Anything at all", &none, &none);
        assert!(got.keep);
        assert!(got.matched.is_empty());
    }

    #[test]
    fn matched_is_sorted_and_deduplicated() {
        let any = ["wind", "solar", "wind"];
        let all = ["solar"];
        let got = matches("Wind and solar auction", &any, &all);
        assert!(got.keep);
        assert_eq!(got.matched, vec!["solar".to_string(), "wind".to_string()]);
    }
}
