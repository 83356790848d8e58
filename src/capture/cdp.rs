//! chromiumoxide adapter: Network domain events into a [`ResponseSubscription`].
//!
//! A response is forwarded once its body has finished loading, so a body read
//! never races the browser. Redirect hops surface from `requestWillBeSent` and
//! carry no readable body.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, GetResponseBodyParams, RequestId, Response,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::feed::{NoBody, ObservedResponse, ResponseBody, ResponseSubscription};

/// Reads a finished response body over CDP.
pub struct CdpBody {
    page: Page,
    request_id: RequestId,
}

#[async_trait]
impl ResponseBody for CdpBody {
    async fn text(&self) -> anyhow::Result<String> {
        let reply = self
            .page
            .execute(GetResponseBodyParams::new(self.request_id.clone()))
            .await
            .map_err(|e| anyhow!("Network.getResponseBody failed: {}", e))?;
        let body = &reply.result;
        if body.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(body.body.as_bytes())
                .context("response body is not valid base64")?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(body.body.clone())
        }
    }
}

fn header_content_type(response: &Response) -> String {
    let from_headers = response
        .headers
        .inner()
        .as_object()
        .and_then(|headers| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                .and_then(|(_, value)| value.as_str())
        })
        .map(str::to_string);
    from_headers.unwrap_or_else(|| response.mime_type.clone())
}

fn status_of(response: &Response) -> u16 {
    u16::try_from(response.status).unwrap_or(0)
}

struct PendingResponse {
    url: String,
    status: u16,
    content_type: String,
}

/// Subscribe to every response the page receives from now on.
///
/// The returned subscription stops the listener task when detached.
pub async fn subscribe(page: &Page) -> anyhow::Result<ResponseSubscription> {
    page.execute(EnableParams::default())
        .await
        .map_err(|e| anyhow!("Network.enable failed: {}", e))?;

    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| anyhow!("requestWillBeSent listener: {}", e))?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| anyhow!("responseReceived listener: {}", e))?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(|e| anyhow!("loadingFinished listener: {}", e))?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(|e| anyhow!("loadingFailed listener: {}", e))?;

    let (tx, rx) = mpsc::unbounded_channel::<ObservedResponse>();
    let page = page.clone();

    let listener = tokio::spawn(async move {
        let mut methods: HashMap<RequestId, String> = HashMap::new();
        let mut pending: HashMap<RequestId, PendingResponse> = HashMap::new();

        loop {
            tokio::select! {
                Some(event) = requests.next() => {
                    if let Some(hop) = &event.redirect_response {
                        let method = methods
                            .get(&event.request_id)
                            .cloned()
                            .unwrap_or_else(|| "GET".to_string());
                        let redirect = ObservedResponse::new(
                            hop.url.clone(),
                            method,
                            status_of(hop),
                            &header_content_type(hop),
                            NoBody,
                        );
                        if tx.send(redirect).is_err() {
                            break;
                        }
                    }
                    methods.insert(event.request_id.clone(), event.request.method.clone());
                }
                Some(event) = responses.next() => {
                    pending.insert(
                        event.request_id.clone(),
                        PendingResponse {
                            url: event.response.url.clone(),
                            status: status_of(&event.response),
                            content_type: header_content_type(&event.response),
                        },
                    );
                }
                Some(event) = finished.next() => {
                    let Some(done) = pending.remove(&event.request_id) else {
                        continue;
                    };
                    let method = methods
                        .remove(&event.request_id)
                        .unwrap_or_else(|| "GET".to_string());
                    let observed = ObservedResponse::new(
                        done.url,
                        method,
                        done.status,
                        &done.content_type,
                        CdpBody {
                            page: page.clone(),
                            request_id: event.request_id.clone(),
                        },
                    );
                    if tx.send(observed).is_err() {
                        break;
                    }
                }
                Some(event) = failed.next() => {
                    if let Some(lost) = pending.remove(&event.request_id) {
                        debug!("capture: loading failed for {}: {}", lost.url, event.error_text);
                    }
                    methods.remove(&event.request_id);
                }
                else => {
                    warn!("capture: page event streams ended");
                    break;
                }
            }
        }
    });

    let abort = listener.abort_handle();
    Ok(ResponseSubscription::new(rx, move || abort.abort()))
}
