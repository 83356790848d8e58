//! Alternate page fetch outside the browser, for comparing the server-rendered
//! HTML against what the browser ends up with.

use anyhow::{anyhow, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use super::antibot::{navigation_headers, random_desktop_profile};

pub struct AltFetcher {
    client: Client,
}

impl AltFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| anyhow!("failed to build alternate fetch client: {}", e))?;
        Ok(Self { client })
    }

    /// GET `url` with a randomly chosen desktop browser identity.
    ///
    /// Any failure, a non-2xx status, or an empty body yields `None`.
    pub async fn fetch_html(&self, url: &str) -> Option<String> {
        let profile = random_desktop_profile();
        let response = match self
            .client
            .get(url)
            .headers(navigation_headers(&profile))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("alt fetch: request to {} failed: {}", url, e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("alt fetch: {} returned HTTP {}", url, status);
            return None;
        }

        match response.text().await {
            Ok(text) if text.trim().is_empty() => {
                warn!("alt fetch: empty body from {}", url);
                None
            }
            Ok(text) => {
                info!("alt fetch: {} bytes from {}", text.len(), url);
                Some(text)
            }
            Err(e) => {
                warn!("alt fetch: could not read body from {}: {}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_yields_none() {
        let fetcher = AltFetcher::new().unwrap();
        // Port 9 on loopback is discard; nothing listens in test environments.
        assert!(fetcher.fetch_html("http://127.0.0.1:9/").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_yields_none() {
        let fetcher = AltFetcher::new().unwrap();
        assert!(fetcher.fetch_html("not a url").await.is_none());
    }
}
