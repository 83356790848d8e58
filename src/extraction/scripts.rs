//! Keyword/JSON harvesting from inline `<script>` bodies of a rendered page.

use scraper::{Html, Selector};
use tracing::debug;

use super::keywords::KeywordExtractor;
use super::ranking::select_top;
use crate::core::types::{ContentKind, RankedResultSet, ResponsePayload};

/// Text of every non-empty `<script>` element, in document order.
pub fn inline_scripts(html: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse("script") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&sel)
        .map(|script| script.text().collect::<String>())
        .filter(|body| !body.trim().is_empty())
        .collect()
}

/// Extract every inline script as text and keep the top two keyword bands.
///
/// Scripts with neither a vocabulary hit nor a recoverable JSON object are
/// discarded before ranking.
pub fn rank_inline_scripts(html: &str, extractor: &KeywordExtractor) -> RankedResultSet {
    let scripts = inline_scripts(html);
    let total = scripts.len();
    let results: Vec<_> = scripts
        .into_iter()
        .filter_map(|body| extractor.extract(&ResponsePayload::Text(body), ContentKind::Text))
        .filter(|result| !result.is_empty())
        .collect();
    debug!(
        "script harvest: {} scripts, {} with signal",
        total,
        results.len()
    );
    select_top(results)
}
