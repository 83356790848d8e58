use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// URL relevance score. Weighted sum over the URL vocabulary; never compared
/// against a [`KeywordMatchResult::score`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct UrlScore(pub f64);

impl UrlScore {
    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredUrl {
    pub url: String,
    pub score: UrlScore,
}

/// How the caller decoded a body before handing it to keyword extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Json,
    Text,
}

/// A decoded response body or script text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Already structured (decoded by the HTTP layer or repaired).
    Json(serde_json::Value),
    /// Raw text. With [`ContentKind::Json`] it is still parsed as a whole value first.
    Text(String),
}

impl ResponsePayload {
    /// The kind a payload of this shape is extracted as.
    pub fn natural_kind(&self) -> ContentKind {
        match self {
            ResponsePayload::Json(v) if v.is_object() || v.is_array() => ContentKind::Json,
            ResponsePayload::Json(_) | ResponsePayload::Text(_) => ContentKind::Text,
        }
    }
}

/// One network response that passed the relevance gate during a capture window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedExchange {
    pub url: String,
    pub method: String,
    pub content_type: String,
    pub status_code: u16,
    /// Body as read from the browser. JSON bodies keep their decoded form.
    pub raw_body: RawBody,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBody {
    Json(serde_json::Value),
    Text(String),
}

impl From<&ResponsePayload> for RawBody {
    fn from(payload: &ResponsePayload) -> Self {
        match payload {
            ResponsePayload::Json(v) => RawBody::Json(v.clone()),
            ResponsePayload::Text(t) => RawBody::Text(t.clone()),
        }
    }
}

/// Keyword hits and recovered JSON for one response body or script.
///
/// `score` is derived from `keywords_found` and is only set through the
/// constructor, so the two can't drift apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordMatchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub source_text: String,
    pub keywords_found: BTreeSet<String>,
    pub json_objects: Vec<serde_json::Value>,
    score: usize,
}

impl KeywordMatchResult {
    pub fn new(
        source_text: String,
        keywords_found: BTreeSet<String>,
        json_objects: Vec<serde_json::Value>,
    ) -> Self {
        let score = keywords_found.len();
        Self {
            url: None,
            source_text,
            keywords_found,
            json_objects,
            score,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn score(&self) -> usize {
        self.score
    }

    /// Nothing worth keeping: no vocabulary hits and no recovered JSON.
    pub fn is_empty(&self) -> bool {
        self.keywords_found.is_empty() && self.json_objects.is_empty()
    }
}

/// Results that fall in the two highest distinct score bands, in input order.
pub type RankedResultSet = Vec<KeywordMatchResult>;

/// Everything a closed capture window hands back to the caller.
#[derive(Debug, Clone, Default)]
pub struct VisitCapture {
    pub ranked: RankedResultSet,
    pub exchanges: Vec<CapturedExchange>,
    /// Responses that passed the gate but produced no usable result.
    pub dropped: usize,
}
