//! Browser acquisition and page preparation.
//!
//! Two ways to get a browser:
//! * attach over CDP to one that is already running (an anti-detect profile or
//!   a manually started Chrome), with retries while it comes up;
//! * launch a visible local Chromium-family browser.
//!
//! The operator watches and drives the page, so the browser is never headless.

use anyhow::{anyhow, Result};
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Handler, Page};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::error::ScoutError;

/// Find a usable Chromium-family browser executable.
///
/// `CHROME_EXECUTABLE` wins, then `PATH`, then well-known install locations.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let names = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
            "brave",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in names {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    let known: &[&str] = &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    ];
    #[cfg(target_os = "linux")]
    let known: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/local/bin/chromium",
        "/usr/bin/brave-browser",
    ];
    #[cfg(target_os = "windows")]
    let known: &[&str] = &[
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    ];
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    let known: &[&str] = &[];

    known
        .iter()
        .find(|c| Path::new(c).exists())
        .map(|c| c.to_string())
}

fn spawn_handler_task(mut handler: Handler) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                warn!("chromiumoxide handler event error: {}", e);
            }
        }
    })
}

/// Resolve an `http://host:port` DevTools address to its browser websocket
/// URL. `ws://` endpoints are returned as they are.
async fn resolve_ws_endpoint(endpoint: &str) -> Result<String> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_string());
    }
    let json_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    let json: serde_json::Value = reqwest::get(&json_url)
        .await
        .map_err(|e| anyhow!("HTTP request to {} failed: {}", json_url, e))?
        .json()
        .await
        .map_err(|e| anyhow!("JSON parse failed: {}", e))?;
    json["webSocketDebuggerUrl"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no webSocketDebuggerUrl at {}", json_url))
}

/// A browser plus the task pumping its CDP connection.
pub struct BrowserSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    owned: bool,
}

impl BrowserSession {
    /// Attach to a running browser, retrying while its DevTools port comes up.
    pub async fn connect(endpoint: &str) -> Result<Self, ScoutError> {
        let (browser, handler) = retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(500))
                .with_max_interval(Duration::from_secs(3))
                .with_max_elapsed_time(Some(Duration::from_secs(20)))
                .build(),
            || async {
                let ws_url = resolve_ws_endpoint(endpoint)
                    .await
                    .map_err(backoff::Error::transient)?;
                info!("browser: connecting to {}", ws_url);
                Browser::connect(ws_url)
                    .await
                    .map_err(|e| backoff::Error::transient(anyhow!("connect failed: {}", e)))
            },
        )
        .await
        .map_err(|e| ScoutError::BrowserConnect(format!("{}: {}", endpoint, e)))?;

        Ok(Self {
            browser,
            handler_task: spawn_handler_task(handler),
            owned: false,
        })
    }

    /// Launch a visible local browser.
    pub async fn launch_visible(viewport: (u32, u32)) -> Result<Self, ScoutError> {
        let exe = find_chrome_executable().ok_or_else(|| {
            ScoutError::BrowserConnect(
                "browser executable not found (tried Chrome, Chromium, Brave)".to_string(),
            )
        })?;
        let (width, height) = viewport;
        let config = BrowserConfig::builder()
            .with_head()
            .chrome_executable(&exe)
            .viewport(Viewport {
                width,
                height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(width, height)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(|e| ScoutError::BrowserConnect(format!("invalid browser config: {}", e)))?;

        info!("browser: launching {}", exe);
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| ScoutError::BrowserConnect(format!("failed to launch {}: {}", exe, e)))?;

        Ok(Self {
            browser,
            handler_task: spawn_handler_task(handler),
            owned: true,
        })
    }

    pub async fn open_page(&self) -> Result<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to open tab: {}", e))
    }

    /// Close a browser this process launched; only disconnect from one it
    /// attached to.
    pub async fn close(mut self) {
        if self.owned {
            if let Err(e) = self.browser.close().await {
                warn!("browser: close failed: {}", e);
            }
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();
    }
}

/// Fix the device metrics before a visit.
pub async fn prepare_page(page: &Page, viewport: (u32, u32)) -> Result<()> {
    let (width, height) = viewport;
    page.execute(SetDeviceMetricsOverrideParams::new(
        i64::from(width),
        i64::from(height),
        1.0,
        false,
    ))
    .await
    .map_err(|e| anyhow!("failed to set device metrics: {}", e))?;
    Ok(())
}

/// Script that applies `zoom` to the body once the document has loaded.
pub fn zoom_script(zoom: &str) -> Result<String> {
    let zoom_literal = serde_json::to_string(zoom)?;
    Ok(format!(
        "document.addEventListener('DOMContentLoaded', () => {{ \
         document.body.style.zoom = {}; }});",
        zoom_literal
    ))
}

/// Install the zoom for every document the page loads from now on.
///
/// The browser keeps the script for the lifetime of the page, so this runs
/// once per page rather than once per visit.
pub async fn install_zoom(page: &Page, zoom: &str) -> Result<()> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(zoom_script(zoom)?))
        .await
        .map_err(|e| anyhow!("failed to install zoom script: {}", e))?;
    Ok(())
}

/// Navigate with a hard time bound. Failures are logged, never returned: the
/// capture window stays open either way.
pub async fn navigate(page: &Page, url: &str, timeout: Duration) {
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(Ok(_)) => info!("browser: loaded {}", url),
        Ok(Err(e)) => warn!("browser: navigation to {} failed: {}", url, e),
        Err(_) => warn!(
            "browser: timeout after {}s navigating to {}; proceeding anyway",
            timeout.as_secs(),
            url
        ),
    }
}

/// Rendered DOM of the page as HTML.
pub async fn page_html(page: &Page) -> Result<String> {
    page.content()
        .await
        .map_err(|e| anyhow!("failed to read page HTML: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ws_endpoint_passthrough() {
        let ws = "ws://127.0.0.1:9222/devtools/browser/abc";
        assert_eq!(resolve_ws_endpoint(ws).await.unwrap(), ws);
    }

    #[tokio::test]
    async fn test_http_endpoint_without_browser_fails() {
        assert!(resolve_ws_endpoint("http://127.0.0.1:9").await.is_err());
    }

    #[test]
    fn test_zoom_script_quotes_the_value() {
        let script = zoom_script("80%").unwrap();
        assert!(script.contains(r#"document.body.style.zoom = "80%";"#));
        assert!(script.starts_with("document.addEventListener('DOMContentLoaded'"));

        let hostile = zoom_script(r#"1"; alert(1); ""#).unwrap();
        assert!(hostile.contains(r#"= "1\"; alert(1); \"";"#));
    }

    #[test]
    fn test_discovered_executable_exists() {
        let found = find_chrome_executable();
        if let Some(path) = found {
            assert!(Path::new(&path).exists());
        }
    }
}
