//! Per-visit response capture window.
//!
//! `Idle -> Armed -> Draining -> Closed`. A session is armed with a fresh
//! subscription, accepts gated responses until the operator's advance signal,
//! finishes the body reads already in flight, then detaches the feed and ranks
//! what it collected. Each visit gets a new session.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use super::feed::{ObservedResponse, ResponseSubscription};
use crate::core::config::ScoutConfig;
use crate::core::error::SessionError;
use crate::core::types::{
    CapturedExchange, ContentKind, KeywordMatchResult, RawBody, ResponsePayload, VisitCapture,
};
use crate::extraction::keywords::KeywordExtractor;
use crate::extraction::ranking::select_top;
use crate::filters::{BodyGate, RelevanceGate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Armed,
    Draining,
    Closed,
}

fn log_state(state: SessionState) {
    info!("capture_session_state={:?}", state);
}

/// Sending half of the single-slot, latest-wins advance signal.
#[derive(Debug, Clone)]
pub struct AdvanceTrigger {
    tx: watch::Sender<u64>,
}

impl AdvanceTrigger {
    /// Presses coalesce: any number of fires before the next wait count once.
    pub fn fire(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// Receiving half of the advance signal.
#[derive(Debug, Clone)]
pub struct AdvanceSignal {
    rx: watch::Receiver<u64>,
}

impl AdvanceSignal {
    /// Forget any fire that happened before now.
    pub fn clear(&mut self) {
        self.rx.borrow_and_update();
    }

    /// Wait for the next fire. A dropped trigger counts as a fire so a
    /// capture window can't outlive its operator.
    pub async fn fired(&mut self) {
        if self.rx.changed().await.is_err() {
            warn!("advance trigger dropped; closing capture window");
        }
    }
}

pub fn advance_channel() -> (AdvanceTrigger, AdvanceSignal) {
    let (tx, rx) = watch::channel(0u64);
    (AdvanceTrigger { tx }, AdvanceSignal { rx })
}

/// How a body is read, decided by content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyRead {
    /// Parse as JSON, repair if needed.
    Json,
    Text,
}

impl BodyRead {
    /// `None` means the content type is not captured at all.
    pub fn for_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.to_ascii_lowercase();
        if ct.contains("application/json") || ct.contains("text/plain") {
            Some(BodyRead::Json)
        } else if ct.contains("text/html") || ct.contains("javascript") {
            Some(BodyRead::Text)
        } else {
            None
        }
    }
}

/// Everything that decides what a session keeps.
#[derive(Debug, Clone, Default)]
pub struct CapturePolicy {
    pub gate: RelevanceGate,
    pub body_gate: BodyGate,
    pub extractor: KeywordExtractor,
}

impl CapturePolicy {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            gate: RelevanceGate::new(
                config.resolve_relevance_policy(),
                config.resolve_url_threshold(),
            ),
            body_gate: config.resolve_body_gate(),
            extractor: KeywordExtractor::default(),
        }
    }

    /// Decode a body according to `read`.
    ///
    /// Only a body that parses strictly becomes a JSON payload. Anything else
    /// stays as the text the server sent; repair happens during extraction.
    pub fn decode(&self, text: String, read: BodyRead) -> ResponsePayload {
        if read == BodyRead::Json {
            if let Ok(value) = serde_json::from_str(text.trim()) {
                return ResponsePayload::Json(value);
            }
        }
        ResponsePayload::Text(text)
    }
}

struct Accepted {
    exchange: CapturedExchange,
    result: Option<KeywordMatchResult>,
}

#[derive(Default)]
struct Accumulator {
    results: Vec<KeywordMatchResult>,
    exchanges: Vec<CapturedExchange>,
    dropped: usize,
}

async fn process_response(
    response: ObservedResponse,
    read: BodyRead,
    policy: Arc<CapturePolicy>,
) -> Option<Accepted> {
    let ObservedResponse {
        url,
        method,
        status,
        content_type,
        body,
    } = response;

    let text = match body.text().await {
        Ok(text) => text,
        Err(e) => {
            warn!("capture: failed to read body of {}: {}", url, e);
            return None;
        }
    };
    if text.trim().is_empty() {
        debug!("capture: empty body from {}", url);
        return None;
    }

    let payload = policy.decode(text, read);
    let exchange = CapturedExchange {
        url: url.clone(),
        method,
        content_type,
        status_code: status,
        raw_body: RawBody::from(&payload),
        captured_at: Utc::now(),
    };
    let kind = match (&payload, read) {
        (ResponsePayload::Text(_), BodyRead::Json) => ContentKind::Json,
        _ => payload.natural_kind(),
    };
    let result = policy
        .extractor
        .extract(&payload, kind)
        .filter(|r| policy.body_gate.admits(&payload, r.score()))
        .map(|r| r.with_url(url));
    Some(Accepted { exchange, result })
}

pub struct CaptureSession {
    policy: Arc<CapturePolicy>,
    state: SessionState,
    subscription: Option<ResponseSubscription>,
    in_flight: JoinSet<Option<Accepted>>,
    accumulator: Accumulator,
}

impl CaptureSession {
    pub fn new(policy: CapturePolicy) -> Self {
        Self::with_shared_policy(Arc::new(policy))
    }

    pub fn with_shared_policy(policy: Arc<CapturePolicy>) -> Self {
        Self {
            policy,
            state: SessionState::Idle,
            subscription: None,
            in_flight: JoinSet::new(),
            accumulator: Accumulator::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> Result<(), SessionError> {
        if self.state != from {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        log_state(to);
        Ok(())
    }

    /// `Idle -> Armed`: attach the feed for this visit.
    pub fn arm(&mut self, subscription: ResponseSubscription) -> Result<(), SessionError> {
        self.transition(SessionState::Idle, SessionState::Armed)?;
        self.accumulator = Accumulator::default();
        self.subscription = Some(subscription);
        Ok(())
    }

    fn dispatch(&mut self, response: ObservedResponse) {
        if !self.policy.gate.is_relevant(&response.url) {
            return;
        }
        if response.is_redirect() {
            debug!("capture: skipping redirect {} {}", response.status, response.url);
            return;
        }
        let Some(read) = BodyRead::for_content_type(&response.content_type) else {
            debug!(
                "capture: ignoring {} ({})",
                response.url,
                if response.content_type.is_empty() {
                    "no content type"
                } else {
                    response.content_type.as_str()
                }
            );
            return;
        };
        info!("capture: {} {}", response.method, response.url);
        let policy = Arc::clone(&self.policy);
        self.in_flight.spawn(process_response(response, read, policy));
    }

    fn accept(&mut self, joined: Result<Option<Accepted>, JoinError>) {
        match joined {
            Ok(Some(accepted)) => {
                self.accumulator.exchanges.push(accepted.exchange);
                match accepted.result {
                    Some(result) => self.accumulator.results.push(result),
                    None => self.accumulator.dropped += 1,
                }
            }
            Ok(None) => self.accumulator.dropped += 1,
            Err(e) => {
                warn!("capture: response task failed: {}", e);
                self.accumulator.dropped += 1;
            }
        }
    }

    /// `Armed -> Draining`: process responses while `navigation` runs, until
    /// the advance signal fires.
    ///
    /// Navigation finishing (or failing) doesn't end the window; only the
    /// signal does. Fires from before this call are ignored.
    pub async fn run_until_advance<F>(
        &mut self,
        navigation: F,
        advance: &mut AdvanceSignal,
    ) -> Result<(), SessionError>
    where
        F: Future<Output = ()>,
    {
        if self.state != SessionState::Armed {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Draining,
            });
        }
        let Some(mut subscription) = self.subscription.take() else {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Draining,
            });
        };

        advance.clear();
        tokio::pin!(navigation);
        let mut navigating = true;
        let mut feed_open = true;

        loop {
            tokio::select! {
                biased;
                _ = advance.fired() => break,
                _ = &mut navigation, if navigating => {
                    navigating = false;
                    debug!("capture: navigation settled; waiting for advance");
                }
                joined = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Some(joined) = joined {
                        self.accept(joined);
                    }
                }
                next = subscription.next(), if feed_open => match next {
                    Some(response) => self.dispatch(response),
                    None => {
                        debug!("capture: response feed ended");
                        feed_open = false;
                    }
                },
            }
        }

        self.subscription = Some(subscription);
        self.transition(SessionState::Armed, SessionState::Draining)
    }

    /// `Draining -> Closed`: finish in-flight reads, detach the feed, rank.
    pub async fn close(&mut self) -> Result<VisitCapture, SessionError> {
        if self.state != SessionState::Draining {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Closed,
            });
        }
        while let Some(joined) = self.in_flight.join_next().await {
            self.accept(joined);
        }
        if let Some(mut subscription) = self.subscription.take() {
            subscription.detach();
        }
        self.transition(SessionState::Draining, SessionState::Closed)?;

        let accumulator = std::mem::take(&mut self.accumulator);
        let captured = accumulator.results.len();
        let ranked = select_top(accumulator.results);
        info!(
            "capture: window closed with {} exchanges, {} results, {} ranked, {} dropped",
            accumulator.exchanges.len(),
            captured,
            ranked.len(),
            accumulator.dropped
        );
        Ok(VisitCapture {
            ranked,
            exchanges: accumulator.exchanges,
            dropped: accumulator.dropped,
        })
    }

    /// Whole lifecycle for one visit.
    pub async fn capture<F>(
        mut self,
        subscription: ResponseSubscription,
        navigation: F,
        advance: &mut AdvanceSignal,
    ) -> Result<VisitCapture, SessionError>
    where
        F: Future<Output = ()>,
    {
        self.arm(subscription)?;
        self.run_until_advance(navigation, advance).await?;
        self.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::feed::{NoBody, ResponseSubscription, StaticBody};

    const API: &str = "https://shop.example.com/api/products/search?page=1";

    fn json_response(url: &str, body: &str) -> ObservedResponse {
        ObservedResponse::new(url, "GET", 200, "application/json", StaticBody(body.to_string()))
    }

    #[test]
    fn test_body_read_policy() {
        assert_eq!(
            BodyRead::for_content_type("application/json; charset=utf-8"),
            Some(BodyRead::Json)
        );
        assert_eq!(BodyRead::for_content_type("text/plain"), Some(BodyRead::Json));
        assert_eq!(BodyRead::for_content_type("text/html"), Some(BodyRead::Text));
        assert_eq!(BodyRead::for_content_type("application/javascript"), Some(BodyRead::Text));
        assert_eq!(BodyRead::for_content_type("image/png"), None);
        assert_eq!(BodyRead::for_content_type(""), None);
    }

    #[test]
    fn test_decode_keeps_text_unless_strict_json() {
        let policy = CapturePolicy::default();
        assert_eq!(
            policy.decode(r#"{"id": 1}"#.to_string(), BodyRead::Json),
            ResponsePayload::Json(serde_json::json!({"id": 1}))
        );
        assert_eq!(
            policy.decode(r#"{"id": 1,}"#.to_string(), BodyRead::Json),
            ResponsePayload::Text(r#"{"id": 1,}"#.to_string())
        );
        assert_eq!(
            policy.decode("OK".to_string(), BodyRead::Json),
            ResponsePayload::Text("OK".to_string())
        );
        assert_eq!(
            policy.decode(r#"{"id": 1}"#.to_string(), BodyRead::Text),
            ResponsePayload::Text(r#"{"id": 1}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_multi_record_body_is_stored_and_searched_verbatim() {
        let body = "{\"status\":\"ok\"}\n{\"sku\":\"B2\",\"price\":9,\"brand\":\"X\"}";
        let (tx, sub) = ResponseSubscription::channel();
        let (trigger, mut advance) = advance_channel();
        tx.send(json_response(API, body)).unwrap();

        let navigation = async move {
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            trigger.fire();
        };
        let visit = CaptureSession::new(CapturePolicy::default())
            .capture(sub, navigation, &mut advance)
            .await
            .unwrap();

        assert_eq!(visit.exchanges.len(), 1);
        assert_eq!(visit.exchanges[0].raw_body, RawBody::Text(body.to_string()));
        assert_eq!(visit.ranked.len(), 1);
        let ranked = &visit.ranked[0];
        for keyword in ["sku", "price", "brand"] {
            assert!(ranked.keywords_found.contains(keyword), "missing {}", keyword);
        }
        assert!(ranked
            .json_objects
            .contains(&serde_json::json!({"sku": "B2", "price": 9, "brand": "X"})));
        assert!(ranked.json_objects.contains(&serde_json::json!({"status": "ok"})));
    }

    #[tokio::test]
    async fn test_out_of_order_calls_are_rejected() {
        let mut session = CaptureSession::new(CapturePolicy::default());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(
            session.close().await.unwrap_err(),
            SessionError::InvalidTransition {
                from: SessionState::Idle,
                to: SessionState::Closed
            }
        );

        let (_tx, sub) = ResponseSubscription::channel();
        session.arm(sub).unwrap();
        let (_tx2, sub2) = ResponseSubscription::channel();
        assert!(session.arm(sub2).is_err());
    }

    #[tokio::test]
    async fn test_window_collects_until_advance() {
        let (tx, sub) = ResponseSubscription::channel();
        let (trigger, mut advance) = advance_channel();
        let mut session = CaptureSession::new(CapturePolicy::default());
        session.arm(sub).unwrap();

        tx.send(json_response(API, r#"{"products": [{"sku": "A", "price": 3}]}"#))
            .unwrap();
        tx.send(json_response("https://cdn.example.com/logo.png", r#"{"sku": 1}"#))
            .unwrap();
        tx.send(ObservedResponse::new(API, "GET", 302, "application/json", NoBody))
            .unwrap();

        let navigation = async move {
            tokio::task::yield_now().await;
            trigger.fire();
        };
        session.run_until_advance(navigation, &mut advance).await.unwrap();
        assert_eq!(session.state(), SessionState::Draining);

        let visit = session.close().await.unwrap();
        assert_eq!(visit.exchanges.len(), 1);
        assert_eq!(visit.ranked.len(), 1);
        assert_eq!(visit.ranked[0].url.as_deref(), Some(API));
        assert_eq!(visit.dropped, 0);
    }

    #[tokio::test]
    async fn test_failed_body_is_isolated() {
        struct Broken;

        #[async_trait::async_trait]
        impl crate::capture::feed::ResponseBody for Broken {
            async fn text(&self) -> anyhow::Result<String> {
                Err(anyhow::anyhow!("connection reset"))
            }
        }

        let (tx, sub) = ResponseSubscription::channel();
        let (trigger, mut advance) = advance_channel();
        tx.send(ObservedResponse::new(API, "GET", 200, "application/json", Broken))
            .unwrap();
        tx.send(json_response(API, r#"{"sku": "B"}"#)).unwrap();

        let navigation = async move {
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            trigger.fire();
        };
        let visit = CaptureSession::new(CapturePolicy::default())
            .capture(sub, navigation, &mut advance)
            .await
            .unwrap();
        assert_eq!(visit.exchanges.len(), 1);
        assert_eq!(visit.ranked.len(), 1);
        assert_eq!(visit.dropped, 1);
    }
}
