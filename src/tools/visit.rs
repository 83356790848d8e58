//! One URL, end to end: capture network traffic until the operator advances,
//! then persist it and rank the inline scripts of the rendered and the
//! alternately fetched HTML.

use anyhow::Result;
use chromiumoxide::Page;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::capture::cdp;
use crate::capture::{AdvanceSignal, CapturePolicy, CaptureSession};
use crate::core::types::{RankedResultSet, VisitCapture};
use crate::extraction::keywords::KeywordExtractor;
use crate::extraction::scripts::rank_inline_scripts;
use crate::features::persistence::{self, SiteLayout};
use crate::scraping::alt_fetch::AltFetcher;
use crate::scraping::browser_manager;

/// Settings shared by every visit of a run.
pub struct VisitOptions {
    pub output_dir: PathBuf,
    pub navigation_timeout: Duration,
    pub viewport: (u32, u32),
    pub zoom: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VisitSummary {
    pub exchanges: usize,
    pub ranked: usize,
    pub dropped: usize,
    pub browser_scripts: usize,
    pub alternate_scripts: Option<usize>,
}

/// Write the network side of a closed capture window:
/// `jsons/responses.json` plus one `apis/` file per exchange.
///
/// A failed exchange file is logged and skipped.
pub async fn persist_capture(layout: &SiteLayout, capture: &VisitCapture) -> Result<()> {
    persistence::write_json(&layout.jsons().join("responses.json"), &capture.ranked).await?;
    let skeletons: Vec<serde_json::Value> = capture
        .ranked
        .iter()
        .filter_map(|r| r.json_objects.first())
        .map(persistence::json_skeleton)
        .collect();
    persistence::write_json(&layout.jsons().join("skeletons.json"), &skeletons).await?;
    for exchange in &capture.exchanges {
        if let Err(e) = persistence::write_exchange(layout, exchange).await {
            warn!("visit: {}", e);
        }
    }
    Ok(())
}

/// Store `html` as `htmls/<name>.html` and its ranked scripts as `jsons/<name>.json`.
pub async fn harvest_html(
    layout: &SiteLayout,
    name: &str,
    html: &str,
    extractor: &KeywordExtractor,
) -> Result<RankedResultSet> {
    persistence::write_text(&layout.htmls().join(format!("{}.html", name)), html).await?;
    let ranked = rank_inline_scripts(html, extractor);
    persistence::write_json(&layout.jsons().join(format!("{}.json", name)), &ranked).await?;
    Ok(ranked)
}

/// Visit `url` on `page`.
///
/// Navigation problems never abort the visit; the capture window still closes
/// on the operator's advance. Only a failure to observe the page at all, or
/// to create the output directory, is returned.
pub async fn visit_url(
    page: &Page,
    url: &str,
    policy: Arc<CapturePolicy>,
    advance: &mut AdvanceSignal,
    alt_fetcher: Option<&AltFetcher>,
    options: &VisitOptions,
) -> Result<VisitSummary> {
    info!("visit: {}", url);
    let layout = SiteLayout::for_url(&options.output_dir, url);
    layout.create_dirs().await?;

    if let Err(e) = browser_manager::prepare_page(page, options.viewport).await {
        warn!("visit: page preparation failed for {}: {}", url, e);
    }

    let subscription = cdp::subscribe(page).await?;
    let navigation = browser_manager::navigate(page, url, options.navigation_timeout);
    let capture = CaptureSession::with_shared_policy(Arc::clone(&policy))
        .capture(subscription, navigation, advance)
        .await?;

    let mut summary = VisitSummary {
        exchanges: capture.exchanges.len(),
        ranked: capture.ranked.len(),
        dropped: capture.dropped,
        ..VisitSummary::default()
    };
    if let Err(e) = persist_capture(&layout, &capture).await {
        warn!("visit: failed to persist captured responses for {}: {}", url, e);
    }

    match browser_manager::page_html(page).await {
        Ok(html) => match harvest_html(&layout, "browser", &html, &policy.extractor).await {
            Ok(ranked) => summary.browser_scripts = ranked.len(),
            Err(e) => warn!("visit: {}", e),
        },
        Err(e) => warn!("visit: {}", e),
    }

    if let Some(fetcher) = alt_fetcher {
        if let Some(html) = fetcher.fetch_html(url).await {
            match harvest_html(&layout, "cc", &html, &policy.extractor).await {
                Ok(ranked) => summary.alternate_scripts = Some(ranked.len()),
                Err(e) => warn!("visit: {}", e),
            }
        }
    }

    log_summary(url, layout.root(), &summary);
    Ok(summary)
}

fn log_summary(url: &str, dir: &Path, summary: &VisitSummary) {
    info!(
        "visit: {} done -> {} | exchanges={} ranked={} dropped={} \
         browser_scripts={} alt_scripts={}",
        url,
        dir.display(),
        summary.exchanges,
        summary.ranked,
        summary.dropped,
        summary.browser_scripts,
        summary
            .alternate_scripts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CapturedExchange, KeywordMatchResult, RawBody};
    use chrono::Utc;
    use serde_json::json;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "catalog-scout-{}-{}-{}",
            name,
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_persist_capture_layout() {
        let out = scratch_dir("visit");
        let layout = SiteLayout::for_url(&out, "https://shop.example.com:8443/c");
        layout.create_dirs().await.unwrap();

        let keywords = ["sku".to_string(), "price".to_string()].into_iter().collect();
        let capture = VisitCapture {
            ranked: vec![KeywordMatchResult::new(
                r#"{"sku":"A","price":1}"#.to_string(),
                keywords,
                vec![json!({"sku": "A", "price": 1})],
            )
            .with_url("https://shop.example.com:8443/api/items")],
            exchanges: vec![CapturedExchange {
                url: "https://shop.example.com:8443/api/items".to_string(),
                method: "GET".to_string(),
                content_type: "application/json".to_string(),
                status_code: 200,
                raw_body: RawBody::Json(json!({"sku": "A", "price": 1})),
                captured_at: Utc::now(),
            }],
            dropped: 0,
        };
        persist_capture(&layout, &capture).await.unwrap();

        let site = out.join("shop.example.com_8443");
        let responses: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(site.join("jsons").join("responses.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(responses.as_array().unwrap().len(), 1);
        assert_eq!(responses[0]["score"], 2);
        assert!(site.join("apis").join("api_items.json").exists());
        let skeletons: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(site.join("jsons").join("skeletons.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(skeletons, json!([{"sku": "A", "price": 1}]));
        std::fs::remove_dir_all(&out).ok();
    }

    #[tokio::test]
    async fn test_harvest_html_writes_page_and_ranking() {
        let out = scratch_dir("harvest");
        let layout = SiteLayout::for_url(&out, "https://shop.example.com/");
        layout.create_dirs().await.unwrap();

        let html = r#"<html><head>
            <script>window.__STATE__ = {"product": {"sku": "A1", "price": 9.5, "name": "Mug"}};</script>
            <script>console.log("hello");</script>
        </head><body></body></html>"#;
        let ranked = harvest_html(&layout, "browser", html, &KeywordExtractor::default())
            .await
            .unwrap();
        assert!(!ranked.is_empty());
        assert!(ranked[0].keywords_found.contains("sku"));
        assert!(layout.htmls().join("browser.html").exists());
        assert!(layout.jsons().join("browser.json").exists());
        std::fs::remove_dir_all(&out).ok();
    }
}
