// src/normalize/region.rs
//! Multi-label region inference for news titles.
//!
//! A `RegionTable` is an ordered list of regions, each with word-boundary patterns
//! (names, capitals, demonyms, diacritic spellings, upper-case country codes) plus the
//! bare name and ccTLD used by the source/link fallback. Build it once with
//! [`RegionTable::asean`] and pass it to the inference functions.

use regex::{Regex, RegexBuilder};

/// Primary region when nothing matched.
pub const GLOBAL_REGION: &str = "Global";

#[derive(Debug)]
struct RegionRule {
    label: &'static str,
    patterns: Vec<Regex>,
    /// Lower-case needles for the source/link fallback (`"philippines"`, `".ph"`).
    link_needles: Vec<&'static str>,
}

#[derive(Debug)]
pub struct RegionTable {
    /// Title scan order.
    rules: Vec<RegionRule>,
    /// Primary-selection order.
    priority: Vec<&'static str>,
    /// Source/link scan order (first hit wins).
    link_order: Vec<&'static str>,
}

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("region pattern")
}

fn cs(pattern: &str) -> Regex {
    Regex::new(pattern).expect("region code pattern")
}

impl RegionTable {
    /// The ten ASEAN member states.
    ///
    /// Two-letter codes are matched upper-case only so that `my`, `id` or `th` in running
    /// text do not tag a region.
    pub fn asean() -> Self {
        let rules = vec![
            RegionRule {
                label: "Singapore",
                patterns: vec![
                    ci(r"\bsingapore(an)?\b"),
                    ci(r"\bs['\x{2019}]pore(an)?\b"),
                    cs(r"\b(SG|Sg)\b"),
                ],
                link_needles: vec!["singapore", ".sg"],
            },
            RegionRule {
                label: "Malaysia",
                patterns: vec![
                    ci(r"\bmalaysian?\b"),
                    ci(r"\bm['\x{2019}]sia\b"),
                    ci(r"\bkuala lumpur\b"),
                    cs(r"\bMY\b"),
                ],
                link_needles: vec!["malaysia", ".my"],
            },
            RegionRule {
                label: "Philippines",
                patterns: vec![
                    ci(r"\bphilippines?\b"),
                    ci(r"\bfilipino\b"),
                    ci(r"\bmanila\b"),
                    cs(r"\bPH\b"),
                ],
                link_needles: vec!["philippines", ".ph"],
            },
            RegionRule {
                label: "Indonesia",
                patterns: vec![ci(r"\bindonesian?\b"), ci(r"\bjakarta\b"), cs(r"\bID\b")],
                link_needles: vec!["indonesia", ".id"],
            },
            RegionRule {
                label: "Vietnam",
                patterns: vec![
                    ci(r"\bviet ?nam(ese)?\b"),
                    ci(r"\bvi\x{1EC7}t nam\b"),
                    ci(r"\bhanoi\b"),
                    ci(r"\bh\x{00E0} n\x{1ED9}i\b"),
                    ci(r"\bho chi minh\b"),
                    ci(r"\bhcmc\b"),
                    cs(r"\bVN\b"),
                ],
                link_needles: vec!["vietnam", ".vn"],
            },
            RegionRule {
                label: "Thailand",
                patterns: vec![ci(r"\bthailand\b"), ci(r"\bthai\b"), ci(r"\bbangkok\b"), cs(r"\bTH\b")],
                link_needles: vec!["thailand", ".th"],
            },
            RegionRule {
                label: "Cambodia",
                patterns: vec![ci(r"\bcambodian?\b"), ci(r"\bphnom penh\b"), cs(r"\bKH\b")],
                link_needles: vec!["cambodia", ".kh"],
            },
            RegionRule {
                label: "Laos",
                patterns: vec![ci(r"\blaos\b"), ci(r"\blao pdr\b"), ci(r"\bvientiane\b")],
                link_needles: vec!["laos", ".la/"],
            },
            RegionRule {
                label: "Myanmar",
                patterns: vec![ci(r"\bmyanmar\b"), ci(r"\bburma\b"), ci(r"\byangon\b"), cs(r"\bMM\b")],
                link_needles: vec!["myanmar", ".mm"],
            },
            RegionRule {
                label: "Brunei",
                patterns: vec![ci(r"\bbrunei\b"), ci(r"\bbandar seri begawan\b"), cs(r"\bBN\b")],
                link_needles: vec!["brunei", ".bn"],
            },
        ];

        let priority = vec![
            "Singapore",
            "Malaysia",
            "Philippines",
            "Indonesia",
            "Vietnam",
            "Thailand",
            "Cambodia",
            "Laos",
            "Myanmar",
            "Brunei",
        ];

        let link_order = vec![
            "Philippines",
            "Singapore",
            "Malaysia",
            "Indonesia",
            "Vietnam",
            "Thailand",
            "Cambodia",
            "Laos",
            "Myanmar",
            "Brunei",
        ];

        Self {
            rules,
            priority,
            link_order,
        }
    }

    fn rank(&self, label: &str) -> usize {
        self.priority
            .iter()
            .position(|p| *p == label)
            .unwrap_or(usize::MAX)
    }

    fn sort_by_priority(&self, labels: &mut [String]) {
        labels.sort_by_key(|l| self.rank(l));
    }
}

/// All regions named in `title`, priority-sorted. Dashes count as word breaks, so
/// `Vietnam-Malaysia-Singapore` yields all three.
pub fn infer_regions(title: &str, table: &RegionTable) -> Vec<String> {
    let text = title.replace(['-', '\u{2013}', '\u{2014}'], " ");

    let mut found: Vec<String> = Vec::new();
    for rule in &table.rules {
        if rule.patterns.iter().any(|re| re.is_match(&text))
            && !found.iter().any(|f| f == rule.label)
        {
            found.push(rule.label.to_string());
        }
    }
    table.sort_by_priority(&mut found);
    found
}

/// Single-region guess from the source label and link; empty when nothing fits.
pub fn infer_regions_from_source(source: &str, link: &str, table: &RegionTable) -> Vec<String> {
    let text = format!("{source} {link}").to_lowercase();
    for label in &table.link_order {
        let Some(rule) = table.rules.iter().find(|r| r.label == *label) else {
            continue;
        };
        if rule.link_needles.iter().any(|n| text.contains(n)) {
            return vec![rule.label.to_string()];
        }
    }
    Vec::new()
}

/// Title first, then source/link.
pub fn infer_regions_with_fallback(
    title: &str,
    source: &str,
    link: &str,
    table: &RegionTable,
) -> Vec<String> {
    let from_title = infer_regions(title, table);
    if !from_title.is_empty() {
        return from_title;
    }
    infer_regions_from_source(source, link, table)
}

/// Highest-priority region, or [`GLOBAL_REGION`].
pub fn primary_region(regions: &[String], table: &RegionTable) -> String {
    regions
        .iter()
        .min_by_key(|r| table.rank(r))
        .cloned()
        .unwrap_or_else(|| GLOBAL_REGION.to_string())
}
