//! The response feed a capture session subscribes to.
//!
//! Transport adapters (the CDP adapter, in-memory test feeds) push
//! [`ObservedResponse`]s into an unbounded channel. The session owns the
//! receiving [`ResponseSubscription`] and detaches it when the window closes.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Deferred access to a response body.
#[async_trait]
pub trait ResponseBody: Send + Sync {
    async fn text(&self) -> anyhow::Result<String>;
}

/// A body that is already in memory.
#[derive(Debug, Clone)]
pub struct StaticBody(pub String);

#[async_trait]
impl ResponseBody for StaticBody {
    async fn text(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

/// Body of a response that must never be read (redirects).
#[derive(Debug, Clone, Copy)]
pub struct NoBody;

#[async_trait]
impl ResponseBody for NoBody {
    async fn text(&self) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("response has no readable body"))
    }
}

/// One network response as seen by the page.
pub struct ObservedResponse {
    pub url: String,
    pub method: String,
    pub status: u16,
    /// Lowercased `content-type` header, empty when absent.
    pub content_type: String,
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for ObservedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedResponse")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl ObservedResponse {
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        status: u16,
        content_type: &str,
        body: impl ResponseBody + 'static,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            status,
            content_type: content_type.trim().to_ascii_lowercase(),
            body: Box::new(body),
        }
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

pub type ResponseSender = mpsc::UnboundedSender<ObservedResponse>;

type DetachFn = Box<dyn FnOnce() + Send>;

/// Receiving end of a response feed plus the hook that unregisters the
/// producer. Detaching is idempotent and also happens on drop.
pub struct ResponseSubscription {
    rx: mpsc::UnboundedReceiver<ObservedResponse>,
    on_detach: Option<DetachFn>,
    detached: bool,
}

impl ResponseSubscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<ObservedResponse>,
        on_detach: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            on_detach: Some(Box::new(on_detach)),
            detached: false,
        }
    }

    /// An in-memory feed with nothing to unregister.
    pub fn channel() -> (ResponseSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, || {}))
    }

    pub async fn next(&mut self) -> Option<ObservedResponse> {
        if self.detached {
            return None;
        }
        self.rx.recv().await
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Unregister the producer and discard anything still buffered.
    ///
    /// Returns how many buffered responses were discarded.
    pub fn detach(&mut self) -> usize {
        if self.detached {
            return 0;
        }
        self.detached = true;
        if let Some(hook) = self.on_detach.take() {
            hook();
        }
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("response feed detached; discarded {} late responses", discarded);
        }
        discarded
    }
}

impl Drop for ResponseSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_redirect_range() {
        assert!(ObservedResponse::new("u", "GET", 302, "", NoBody).is_redirect());
        assert!(ObservedResponse::new("u", "GET", 399, "", NoBody).is_redirect());
        assert!(!ObservedResponse::new("u", "GET", 200, "", NoBody).is_redirect());
        assert!(!ObservedResponse::new("u", "GET", 404, "", NoBody).is_redirect());
    }

    #[test]
    fn test_content_type_is_normalised() {
        let r = ObservedResponse::new("u", "GET", 200, " Application/JSON; charset=utf-8", NoBody);
        assert_eq!(r.content_type, "application/json; charset=utf-8");
    }

    #[tokio::test]
    async fn test_detach_runs_hook_once_and_discards_backlog() {
        let hooked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&hooked);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = ResponseSubscription::new(rx, move || flag.store(true, Ordering::SeqCst));

        tx.send(ObservedResponse::new("a", "GET", 200, "", StaticBody("x".into())))
            .unwrap();
        assert!(sub.next().await.is_some());

        tx.send(ObservedResponse::new("b", "GET", 200, "", NoBody)).unwrap();
        assert_eq!(sub.detach(), 1);
        assert!(hooked.load(Ordering::SeqCst));
        assert_eq!(sub.detach(), 0);

        assert!(tx.send(ObservedResponse::new("c", "GET", 200, "", NoBody)).is_err());
        assert!(sub.next().await.is_none());
    }
}
