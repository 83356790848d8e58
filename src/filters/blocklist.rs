//! Negative-keyword short-circuit for the relevance gate.
//!
//! Analytics, ad-exchange, tag-manager and social-widget endpoints frequently
//! carry words like `api` or `id` and would otherwise score well. Substring
//! match, case-insensitive, checked before any positive scoring.

use aho_corasick::AhoCorasick;
use std::sync::OnceLock;

const NEGATIVE_PATTERNS: &[&str] = &[
    // Analytics and tracking pixels
    "assets",
    "google-analytics",
    "analytics",
    "ga.",
    "collect",
    "v1/b",
    "v1/p",
    "v1/t",
    "v1/i",
    "v1/a",
    "track",
    "event",
    "metrics",
    "pxl",
    "pixel",
    "t.gif",
    "tr.gif",
    "log",
    "data",
    // Ad exchanges
    "doubleclick",
    "adservice",
    "ads",
    "pubads",
    "gampad",
    "pagead",
    "syndication",
    "securepubads",
    "adx",
    "adnxs",
    "appnexus",
    "criteo",
    "rubicon",
    "openx",
    "pubmatic",
    "indexexchange",
    "amazon-adsystem",
    "media.net",
    "yieldmo",
    "taboola",
    "outbrain",
    // Social widgets and third-party APIs
    "connect.facebook",
    "platform.twitter",
    "api.instagram",
    "api.pinterest",
    "api.linkedin",
    "graph.facebook.com",
    "api.twitter.com",
    // Tag managers and experimentation
    "googletagmanager",
    "gtm.",
    "segment",
    "tealium",
    "ensighten",
    "optimizely",
    "visualwebsiteoptimizer",
    "mparticle",
    // Static hosts and maps
    "cdn.example.com/api",
    "assets.example.com/api",
    "maps.googleapis.com",
    "geolocation",
    "places",
    "directions",
    "maps",
    "upload",
];

static NEGATIVE_MATCHER: OnceLock<AhoCorasick> = OnceLock::new();

fn negative_matcher() -> &'static AhoCorasick {
    NEGATIVE_MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(NEGATIVE_PATTERNS)
            .expect("valid negative patterns")
    })
}

/// Returns `true` if the URL hits the tracker/ad blocklist.
pub fn is_blocked(url: &str) -> bool {
    negative_matcher().is_match(url)
}

/// First blocklist fragment found in the URL, for logging.
pub fn blocked_by(url: &str) -> Option<&'static str> {
    negative_matcher()
        .find(url)
        .map(|m| NEGATIVE_PATTERNS[m.pattern().as_usize()])
}
