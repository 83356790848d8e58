//! Screenshot consumer. Serves queued requests one at a time against the
//! page that is current when each request comes up.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::operator::ScreenshotRequest;
use super::persistence::{path_file_stem, unique_screenshot_path, SiteLayout};

#[async_trait]
pub trait ScreenshotTaker: Send + Sync {
    async fn current_url(&self) -> Result<String>;
    async fn capture_png(&self) -> Result<Vec<u8>>;
}

#[async_trait]
impl ScreenshotTaker for Page {
    async fn current_url(&self) -> Result<String> {
        self.url()
            .await
            .map_err(|e| anyhow!("failed to read page URL: {}", e))?
            .ok_or_else(|| anyhow!("page has no URL yet"))
    }

    async fn capture_png(&self) -> Result<Vec<u8>> {
        self.screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
        )
        .await
        .map_err(|e| anyhow!("screenshot failed: {}", e))
    }
}

/// Take one screenshot and write it under the page's site directory.
pub async fn take_screenshot(taker: &dyn ScreenshotTaker, output_dir: &Path) -> Result<PathBuf> {
    let url = taker.current_url().await?;
    let png = taker.capture_png().await?;
    let dir = SiteLayout::for_url(output_dir, &url).screenshots();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| anyhow!("failed to create {}: {}", dir.display(), e))?;
    let path = unique_screenshot_path(&dir, &path_file_stem(&url));
    tokio::fs::write(&path, png)
        .await
        .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))?;
    Ok(path)
}

/// Serve requests until `Stop` or until every sender is gone. Returns how
/// many screenshots were written.
pub async fn run_screenshot_consumer<T>(
    taker: T,
    output_dir: PathBuf,
    mut requests: mpsc::UnboundedReceiver<ScreenshotRequest>,
) -> usize
where
    T: ScreenshotTaker,
{
    let mut taken = 0usize;
    while let Some(request) = requests.recv().await {
        match request {
            ScreenshotRequest::Stop => break,
            ScreenshotRequest::Capture => match take_screenshot(&taker, &output_dir).await {
                Ok(path) => {
                    taken += 1;
                    info!("screenshot: saved {}", path.display());
                }
                Err(e) => warn!("screenshot: {}", e),
            },
        }
    }
    info!("screenshot: consumer stopped after {} captures", taken);
    taken
}
