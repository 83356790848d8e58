//! Stage-1 relevance gate: decides from the request URL alone whether a network
//! response is worth reading.
//!
//! Scoring is a weighted, case-insensitive substring match against six keyword
//! groups plus a handful of co-occurrence bonuses. Each keyword contributes once
//! no matter how often it appears.

use aho_corasick::AhoCorasick;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::blocklist;
use crate::core::types::{ScoredUrl, UrlScore};

/// Default capture threshold. A classification choice, tuned by hand.
pub const DEFAULT_THRESHOLD: f64 = 4.0;

const CORE_KEYWORDS: &[&str] = &[
    "api",
    "search",
    "products",
    "items",
    "product-search",
    "productsearch",
];

const SUPPLEMENTARY_KEYWORDS: &[&str] = &[
    "catalogue", "catalog", "list", "browse", "query", "filter", "v1", "v2", "v3", "v4", "v5",
    "v6", "v7", "v8", "v9", "v10", "graphql",
];

const PAGINATION_KEYWORDS: &[&str] = &["page", "start", "offset", "limit", "sz", "pagesize"];

const SALE_KEYWORDS: &[&str] = &["sale", "clearance", "deals", "discount", "outlet"];

const PLATFORM_KEYWORDS: &[&str] = &["cgid", "collections", "demandware.store", "mobify"];

const OTHER_KEYWORDS: &[&str] = &[
    "category",
    "categories",
    "id",
    "ids",
    "sku",
    "skus",
    "inventory",
    "stock",
    "availability",
    "options",
    "variants",
    "attributes",
    "recommendations",
    "orchestra",
    "getdeals",
    "zgw",
];

const KEYWORD_GROUPS: &[(&[&str], f64)] = &[
    (CORE_KEYWORDS, 3.0),
    (SUPPLEMENTARY_KEYWORDS, 2.0),
    (PAGINATION_KEYWORDS, 1.5),
    (SALE_KEYWORDS, 1.5),
    (PLATFORM_KEYWORDS, 1.0),
    (OTHER_KEYWORDS, 0.5),
];

const VERSION_BONUS: f64 = 1.5;
const ENDPOINT_TERMS: &[&str] = &["api", "search", "products"];
const PAGING_TERMS: &[&str] = &["page", "start", "offset"];

struct UrlVocabulary {
    matcher: AhoCorasick,
    weights: Vec<f64>,
}

static URL_VOCABULARY: OnceLock<UrlVocabulary> = OnceLock::new();
static VERSION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn url_vocabulary() -> &'static UrlVocabulary {
    URL_VOCABULARY.get_or_init(|| {
        let mut patterns = Vec::new();
        let mut weights = Vec::new();
        for (group, weight) in KEYWORD_GROUPS {
            for keyword in group.iter() {
                patterns.push(*keyword);
                weights.push(*weight);
            }
        }
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .expect("valid URL keyword patterns");
        UrlVocabulary { matcher, weights }
    })
}

fn version_pattern() -> &'static Regex {
    VERSION_PATTERN.get_or_init(|| Regex::new(r"(?i)v\d+").expect("valid version pattern"))
}

/// Weighted relevance score of a URL (query string included).
pub fn score_url(url: &str) -> UrlScore {
    let vocab = url_vocabulary();

    // Overlapping search so "v10" credits both "v1" and "v10", and
    // "product-search" also credits "search".
    let matched: HashSet<usize> = vocab
        .matcher
        .find_overlapping_iter(url)
        .map(|m| m.pattern().as_usize())
        .collect();
    let mut score: f64 = matched.iter().map(|&idx| vocab.weights[idx]).sum();

    if version_pattern().is_match(url) {
        score += VERSION_BONUS;
    }

    let lower = url.to_ascii_lowercase();
    let has_any = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));
    let has_all = |terms: &[&str]| terms.iter().all(|t| lower.contains(t));

    if has_any(ENDPOINT_TERMS) && has_any(PAGING_TERMS) {
        score += 3.0;
    }
    if has_all(ENDPOINT_TERMS) {
        score += 3.0;
    }
    if lower.contains("sale") && has_any(ENDPOINT_TERMS) {
        score += 2.0;
    }

    UrlScore(score)
}

pub fn score(url: &str) -> ScoredUrl {
    ScoredUrl {
        url: url.to_string(),
        score: score_url(url),
    }
}

/// `score_url(url) >= DEFAULT_THRESHOLD`.
pub fn is_relevant(url: &str) -> bool {
    score_url(url).value() >= DEFAULT_THRESHOLD
}

/// Which checks run before the threshold comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RelevancePolicy {
    /// Weighted score only.
    #[default]
    Scored,
    /// Tracker/ad blocklist first; a hit is irrelevant regardless of score.
    BlocklistThenScored,
}

impl RelevancePolicy {
    pub fn parse_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scored" | "score" => Some(RelevancePolicy::Scored),
            "blocklist" | "blocklist_then_scored" | "negative" => {
                Some(RelevancePolicy::BlocklistThenScored)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelevancePolicy::Scored => "scored",
            RelevancePolicy::BlocklistThenScored => "blocklist",
        }
    }
}

/// Configured relevance gate: a policy plus a threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelevanceGate {
    pub policy: RelevancePolicy,
    pub threshold: f64,
}

impl Default for RelevanceGate {
    fn default() -> Self {
        Self {
            policy: RelevancePolicy::Scored,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl RelevanceGate {
    pub fn new(policy: RelevancePolicy, threshold: f64) -> Self {
        Self { policy, threshold }
    }

    pub fn is_relevant(&self, url: &str) -> bool {
        if self.policy == RelevancePolicy::BlocklistThenScored && blocklist::is_blocked(url) {
            return false;
        }
        score_url(url).value() >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_api_with_paging_is_relevant() {
        let url = "https://shop.example.com/api/products/search?page=2";
        let s = score_url(url).value();
        // api+search+products (9) + page (1.5) + two combination bonuses (6)
        assert_eq!(s, 16.5);
        assert!(is_relevant(url));
    }

    #[test]
    fn test_static_asset_scores_zero() {
        let url = "https://cdn.example.com/static/logo.png";
        assert_eq!(score_url(url).value(), 0.0);
        assert!(!is_relevant(url));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(
            score_url("https://x.example.com/API/Search").value(),
            score_url("https://x.example.com/api/search").value()
        );
    }

    #[test]
    fn test_version_token_and_overlap() {
        // v10 credits v1 and v10 (2 + 2) plus the version bonus.
        assert_eq!(score_url("https://x.example.com/v10/").value(), 5.5);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        assert_eq!(
            score_url("https://x.example.com/items/items/items").value(),
            3.0
        );
    }

    #[test]
    fn test_sale_bonus() {
        // sale (1.5) + search (3) + sale/endpoint bonus (2)
        assert_eq!(score_url("https://x.example.com/sale/search").value(), 6.5);
    }

    #[test]
    fn test_gate_policies() {
        let url = "https://securepubads.doubleclick.net/api/products/search";
        assert!(RelevanceGate::default().is_relevant(url));
        let strict = RelevanceGate::new(RelevancePolicy::BlocklistThenScored, DEFAULT_THRESHOLD);
        assert!(!strict.is_relevant(url));
    }

    #[test]
    fn test_threshold_is_tunable() {
        let url = "https://x.example.com/items";
        assert!(!RelevanceGate::default().is_relevant(url));
        assert!(RelevanceGate::new(RelevancePolicy::Scored, 3.0).is_relevant(url));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            RelevancePolicy::parse_str("Blocklist"),
            Some(RelevancePolicy::BlocklistThenScored)
        );
        assert_eq!(RelevancePolicy::parse_str("scored"), Some(RelevancePolicy::Scored));
        assert_eq!(RelevancePolicy::parse_str("bogus"), None);
    }
}
