//! Content keyword extraction: which product-domain terms a body mentions,
//! plus the JSON that can be recovered from it.

use aho_corasick::AhoCorasick;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use super::json_recovery;
use super::repair::{HeuristicRepair, JsonRepair};
use crate::core::types::{ContentKind, KeywordMatchResult, ResponsePayload};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeywordGroup {
    Identifier,
    Pricing,
    Attribute,
}

pub const PRODUCT_IDENTIFIERS: &[&str] = &[
    "id",
    "sku",
    "upc",
    "ean",
    "gtin",
    "mpn",
    "asin",
    "product_id",
    "item_id",
    "productId",
    "itemId",
];

pub const PRICING_KEYWORDS: &[&str] = &[
    "price",
    "sale_price",
    "original_price",
    "list_price",
    "msrp",
    "discount",
    "currency",
];

pub const PRODUCT_ATTRIBUTES: &[&str] = &[
    "name",
    "title",
    "description",
    "short_description",
    "brand",
    "category",
    "image",
    "url",
    "color",
    "size",
    "dimensions",
    "weight",
];

struct ContentVocabulary {
    matcher: AhoCorasick,
    entries: Vec<(&'static str, KeywordGroup)>,
}

static CONTENT_VOCABULARY: OnceLock<ContentVocabulary> = OnceLock::new();

fn content_vocabulary() -> &'static ContentVocabulary {
    CONTENT_VOCABULARY.get_or_init(|| {
        let entries: Vec<(&'static str, KeywordGroup)> = PRODUCT_IDENTIFIERS
            .iter()
            .map(|k| (*k, KeywordGroup::Identifier))
            .chain(PRICING_KEYWORDS.iter().map(|k| (*k, KeywordGroup::Pricing)))
            .chain(PRODUCT_ATTRIBUTES.iter().map(|k| (*k, KeywordGroup::Attribute)))
            .collect();
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(entries.iter().map(|(k, _)| *k))
            .expect("valid content keyword patterns");
        ContentVocabulary { matcher, entries }
    })
}

/// Distinct vocabulary keywords found in `text`, with their group.
///
/// Case-insensitive and overlapping, so `sale_price` also credits `price`.
/// Camel-case entries fold onto the same text as their lowercase spelling
/// (`productId` matches `productid`) but are still distinct keywords from
/// `product_id`.
pub fn matched_keywords(text: &str) -> Vec<(&'static str, KeywordGroup)> {
    let vocab = content_vocabulary();
    let mut seen = vec![false; vocab.entries.len()];
    for m in vocab.matcher.find_overlapping_iter(text) {
        seen[m.pattern().as_usize()] = true;
    }
    vocab
        .entries
        .iter()
        .zip(seen)
        .filter_map(|(entry, hit)| hit.then_some(*entry))
        .collect()
}

pub fn matched_groups(text: &str) -> BTreeSet<KeywordGroup> {
    matched_keywords(text).into_iter().map(|(_, g)| g).collect()
}

pub fn keywords_in(text: &str) -> BTreeSet<String> {
    matched_keywords(text)
        .into_iter()
        .map(|(k, _)| k.to_string())
        .collect()
}

/// Extracts keywords and JSON candidates, with a swappable repair strategy.
#[derive(Clone)]
pub struct KeywordExtractor {
    repair: Arc<dyn JsonRepair>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(Arc::new(HeuristicRepair))
    }
}

impl std::fmt::Debug for KeywordExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordExtractor")
            .field("repair", &self.repair.name())
            .finish()
    }
}

impl KeywordExtractor {
    pub fn new(repair: Arc<dyn JsonRepair>) -> Self {
        Self { repair }
    }

    /// Normalise the payload to text, collect vocabulary hits and recover
    /// JSON candidates.
    ///
    /// Keywords always come from the body text as given. Text declared as
    /// JSON that only parses after repair contributes the repaired value as
    /// its first candidate, but the text itself is left untouched.
    ///
    /// Returns `None` only when a structured payload can't be serialised;
    /// that is logged here and never propagated.
    pub fn extract(
        &self,
        payload: &ResponsePayload,
        kind: ContentKind,
    ) -> Option<KeywordMatchResult> {
        let (text, whole) = match (payload, kind) {
            (ResponsePayload::Json(value), ContentKind::Json) => {
                match serde_json::to_string(value) {
                    Ok(text) => (text, Some(value.clone())),
                    Err(e) => {
                        warn!("keyword extraction: could not serialise JSON payload: {}", e);
                        return None;
                    }
                }
            }
            (ResponsePayload::Text(text), ContentKind::Json) => {
                let whole = serde_json::from_str::<serde_json::Value>(text.trim())
                    .ok()
                    .or_else(|| self.repair.repair(text));
                if whole.is_none() {
                    debug!("keyword extraction: body declared JSON but is not one JSON value");
                }
                (text.clone(), whole)
            }
            (ResponsePayload::Json(serde_json::Value::String(s)), ContentKind::Text) => {
                (s.clone(), None)
            }
            (ResponsePayload::Json(value), ContentKind::Text) => (value.to_string(), None),
            (ResponsePayload::Text(text), ContentKind::Text) => (text.clone(), None),
        };

        let keywords_found = keywords_in(&text);
        let json_objects = json_recovery::recover(&text, whole, self.repair.as_ref());
        Some(KeywordMatchResult::new(text, keywords_found, json_objects))
    }
}

/// [`KeywordExtractor::extract`] with the default repair strategy.
pub fn extract(payload: &ResponsePayload, kind: ContentKind) -> Option<KeywordMatchResult> {
    KeywordExtractor::default().extract(payload, kind)
}
