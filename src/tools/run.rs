//! Whole-run driver: read the URL list, visit each URL in order on one tab,
//! and shut the screenshot consumer down once the list is exhausted.

use anyhow::Result;
use chromiumoxide::Page;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::visit::{visit_url, VisitOptions};
use crate::capture::CapturePolicy;
use crate::core::error::ScoutError;
use crate::features::operator::{OperatorInbox, OperatorSignals};
use crate::features::screenshots::run_screenshot_consumer;
use crate::scraping::alt_fetch::AltFetcher;
use crate::scraping::browser_manager;

/// Target URLs, one per line. Blank lines and `#` comments are skipped.
pub fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub async fn read_url_list(path: &Path) -> Result<Vec<String>, ScoutError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ScoutError::UrlList {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(parse_url_list(&contents))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub visited: usize,
    pub failed: usize,
    pub screenshots: usize,
}

/// Visit every URL on `page`, one capture window each.
///
/// A visit that fails outright is logged and the run moves on.
pub async fn run_urls(
    page: &Page,
    urls: &[String],
    policy: CapturePolicy,
    signals: OperatorSignals,
    inbox: OperatorInbox,
    alt_fetcher: Option<AltFetcher>,
    options: VisitOptions,
) -> RunReport {
    let OperatorInbox {
        mut advance,
        screenshots,
    } = inbox;
    let consumer = tokio::spawn(run_screenshot_consumer(
        page.clone(),
        options.output_dir.clone(),
        screenshots,
    ));

    if let Err(e) = browser_manager::install_zoom(page, &options.zoom).await {
        warn!("run: page zoom not applied: {}", e);
    }

    let policy = Arc::new(policy);
    let mut report = RunReport::default();
    for (i, url) in urls.iter().enumerate() {
        info!("run: [{}/{}] {}", i + 1, urls.len(), url);
        match visit_url(
            page,
            url,
            Arc::clone(&policy),
            &mut advance,
            alt_fetcher.as_ref(),
            &options,
        )
        .await
        {
            Ok(_) => report.visited += 1,
            Err(e) => {
                report.failed += 1;
                error!("run: visit to {} failed: {:#}", url, e);
            }
        }
    }

    signals.stop_screenshots();
    report.screenshots = match consumer.await {
        Ok(n) => n,
        Err(e) => {
            warn!("run: screenshot consumer ended abnormally: {}", e);
            0
        }
    };
    info!(
        "run: finished, {} visited, {} failed, {} screenshots",
        report.visited, report.failed, report.screenshots
    );
    report
}
