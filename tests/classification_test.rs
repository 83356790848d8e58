use catalog_scout::extraction::keywords::KeywordExtractor;
use catalog_scout::extraction::ranking::select_top;
use catalog_scout::filters::{RelevanceGate, RelevancePolicy};
use catalog_scout::{
    extract, extract_json_candidates, is_relevant, score_url, ContentKind, KeywordMatchResult,
    ResponsePayload,
};
use serde_json::json;
use std::collections::BTreeSet;

const SEARCH_API: &str = "https://shop.example.com/api/products/search?page=2";
const STATIC_ASSET: &str = "https://cdn.example.com/static/logo.png";

fn text_keywords(text: &str) -> BTreeSet<String> {
    extract(&ResponsePayload::Text(text.to_string()), ContentKind::Text)
        .map(|r| r.keywords_found)
        .unwrap_or_default()
}

fn scored(score: usize, tag: &str) -> KeywordMatchResult {
    let keywords: BTreeSet<String> = (0..score).map(|i| format!("k{}", i)).collect();
    KeywordMatchResult::new(tag.to_string(), keywords, vec![])
}

#[test]
fn url_scoring_is_deterministic() {
    for url in [SEARCH_API, STATIC_ASSET, "https://x.example.com/graphql?sku=1"] {
        let first = score_url(url);
        for _ in 0..5 {
            assert_eq!(score_url(url), first);
        }
    }
}

#[test]
fn adding_text_never_loses_keywords() {
    let base = "the product has a price and a sku";
    let before = text_keywords(base);
    for suffix in [" brand", " gtin", "", " lorem ipsum", " sale_price"] {
        let after = text_keywords(&format!("{}{}", base, suffix));
        assert!(after.is_superset(&before), "lost keywords after appending {:?}", suffix);
    }
    assert!(text_keywords(&format!("{} brand", base)).contains("brand"));
}

#[test]
fn band_selection_keeps_two_highest_scores() {
    let results = vec![
        scored(5, "a"),
        scored(5, "b"),
        scored(3, "c"),
        scored(3, "d"),
        scored(1, "e"),
    ];
    let ranked = select_top(results);
    let tags: Vec<&str> = ranked.iter().map(|r| r.source_text.as_str()).collect();
    assert_eq!(tags, vec!["a", "b", "c", "d"]);

    let flat = select_top(vec![scored(2, "x"), scored(2, "y"), scored(2, "z")]);
    assert_eq!(flat.len(), 3);
}

#[test]
fn trailing_comma_is_repaired_and_garbage_yields_nothing() {
    let candidates = extract_json_candidates(r#"{"id": 1, "name": "x",}"#);
    assert_eq!(candidates, vec![json!({"id": 1, "name": "x"})]);
    assert!(extract_json_candidates("not json at all").is_empty());
}

#[test]
fn url_scoring_boundaries() {
    assert!(score_url(SEARCH_API).value() >= 4.0);
    assert!(is_relevant(SEARCH_API));
    assert_eq!(score_url(STATIC_ASSET).value(), 0.0);
    assert!(!is_relevant(STATIC_ASSET));
}

#[test]
fn blocklist_policy_overrides_positive_score() {
    let url = "https://ad.doubleclick.net/api/products/search?page=1";
    assert!(score_url(url).value() >= 4.0);

    let scored_only = RelevanceGate::new(RelevancePolicy::Scored, 4.0);
    let blocklist_first = RelevanceGate::new(RelevancePolicy::BlocklistThenScored, 4.0);
    assert!(scored_only.is_relevant(url));
    assert!(!blocklist_first.is_relevant(url));
    assert!(blocklist_first.is_relevant(SEARCH_API));
}

#[test]
fn json_payload_extraction_reports_whole_value() {
    let body = json!({"products": [{"sku": "A", "price": 2.5, "currency": "EUR"}]});
    let result = KeywordExtractor::default()
        .extract(&ResponsePayload::Json(body.clone()), ContentKind::Json)
        .unwrap();
    assert_eq!(result.json_objects.first(), Some(&body));
    assert_eq!(result.score(), 3);
}
