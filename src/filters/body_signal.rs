//! Stage-2 product-data detector over a response body.
//!
//! Independent of the URL score and of the plain keyword count kept on
//! [`KeywordMatchResult`](crate::core::types::KeywordMatchResult): identifiers
//! weigh 3, pricing terms 2, descriptive attributes 1, and list-of-object
//! shapes add a structural bonus.

use serde_json::Value;

use crate::core::types::ResponsePayload;
use crate::extraction::keywords::{self, KeywordGroup};

const LIST_OF_OBJECTS_BONUS: f64 = 1.5;
const IDENTIFIED_ITEM_BONUS: f64 = 2.0;

fn group_weight(group: KeywordGroup) -> f64 {
    match group {
        KeywordGroup::Identifier => 3.0,
        KeywordGroup::Pricing => 2.0,
        KeywordGroup::Attribute => 1.0,
    }
}

/// Optional body-level gate applied after a response has been extracted.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum BodyGate {
    #[default]
    Off,
    /// Keep results with at least this many distinct vocabulary keywords.
    KeywordCount(usize),
    /// Keep results whose weighted product-data score reaches the threshold.
    Weighted(f64),
}

impl BodyGate {
    pub fn admits(&self, payload: &ResponsePayload, keyword_count: usize) -> bool {
        match *self {
            BodyGate::Off => true,
            BodyGate::KeywordCount(min) => keyword_count >= min,
            BodyGate::Weighted(threshold) => product_data_score(payload) >= threshold,
        }
    }
}

fn mentions_identifier(value: &Value) -> bool {
    let text = value.to_string();
    keywords::matched_groups(&text).contains(&KeywordGroup::Identifier)
}

fn first_object(items: &[Value]) -> Option<&Value> {
    items.first().filter(|v| v.is_object())
}

fn structural_bonus(value: &Value) -> f64 {
    let list_bonus = |items: &[Value]| match first_object(items) {
        Some(first) if mentions_identifier(first) => LIST_OF_OBJECTS_BONUS + IDENTIFIED_ITEM_BONUS,
        Some(_) => LIST_OF_OBJECTS_BONUS,
        None => 0.0,
    };
    match value {
        Value::Array(items) => list_bonus(items),
        Value::Object(map) => map
            .values()
            .filter_map(Value::as_array)
            .map(|items| list_bonus(items))
            .sum(),
        _ => 0.0,
    }
}

/// Weighted product-data score of a body.
///
/// Text payloads get keyword weights only. A JSON payload that is neither an
/// object nor an array scores zero.
pub fn product_data_score(payload: &ResponsePayload) -> f64 {
    match payload {
        ResponsePayload::Text(text) => keyword_weight(text),
        ResponsePayload::Json(value @ (Value::Object(_) | Value::Array(_))) => {
            let keyword_part = match value {
                // Arrays only earn the structural bonus.
                Value::Array(_) => 0.0,
                _ => keyword_weight(&value.to_string()),
            };
            keyword_part + structural_bonus(value)
        }
        ResponsePayload::Json(_) => 0.0,
    }
}

fn keyword_weight(text: &str) -> f64 {
    keywords::matched_keywords(text)
        .into_iter()
        .map(|(_, group)| group_weight(group))
        .sum()
}

pub fn is_product_data(payload: &ResponsePayload, threshold: f64) -> bool {
    product_data_score(payload) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_listing_scores_high() {
        let payload = ResponsePayload::Json(json!({
            "products": [{"sku": "A1", "price": 10, "currency": "USD"}]
        }));
        assert!(product_data_score(&payload) >= 4.0);
        assert!(is_product_data(&payload, 4.0));
    }

    #[test]
    fn test_unrelated_json_scores_low() {
        let payload = ResponsePayload::Json(json!({"status": "ok"}));
        assert_eq!(product_data_score(&payload), 0.0);
    }

    #[test]
    fn test_top_level_list_gets_structural_bonus_only() {
        let payload = ResponsePayload::Json(json!([{"sku": "A1"}]));
        assert_eq!(product_data_score(&payload), 3.5);
        let plain = ResponsePayload::Json(json!([{"colour": "red"}]));
        assert_eq!(product_data_score(&plain), 1.5);
    }

    #[test]
    fn test_gate_variants() {
        let payload = ResponsePayload::Text("price".to_string());
        assert!(BodyGate::Off.admits(&payload, 0));
        assert!(BodyGate::KeywordCount(1).admits(&payload, 1));
        assert!(!BodyGate::KeywordCount(2).admits(&payload, 1));
        assert!(BodyGate::Weighted(2.0).admits(&payload, 1));
        assert!(!BodyGate::Weighted(4.0).admits(&payload, 1));
    }
}
