use tracing::{error, info};

use catalog_scout::capture::CapturePolicy;
use catalog_scout::core::config::{load_scout_config, ScoutConfig};
use catalog_scout::features::{operator_channels, KeyListener, ProfileApiClient};
use catalog_scout::scraping::{AltFetcher, BrowserSession};
use catalog_scout::tools::{read_url_list, run_urls, VisitOptions};
use catalog_scout::ScoutError;

/// Value of `--name value` or `--name=value`.
fn flag_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    let mut iter = args.iter();
    while let Some(a) = iter.next() {
        if a == name {
            return iter.next().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        }
        if let Some(rest) = a.strip_prefix(&prefix) {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// Command-line flags win over the config file and environment.
fn apply_cli_overrides(config: &mut ScoutConfig, args: &[String]) {
    if let Some(v) = flag_value(args, "--urls") {
        config.url_list_path = Some(v);
    }
    if let Some(v) = flag_value(args, "--out") {
        config.output_dir = Some(v);
    }
    if let Some(v) = flag_value(args, "--profile") {
        config.profile_id = Some(v);
    }
    if let Some(v) = flag_value(args, "--cdp") {
        config.cdp_endpoint = Some(v);
    }
    if let Some(v) = flag_value(args, "--policy") {
        config.relevance_policy = Some(v);
    }
}

/// Anti-detect profile first, then an explicit CDP endpoint, then a local launch.
async fn acquire_browser(config: &ScoutConfig) -> Result<BrowserSession, ScoutError> {
    if let Some(profile_id) = config.resolve_profile_id() {
        let token = config.resolve_profile_api_token().ok_or_else(|| {
            ScoutError::Config(
                "a profile id is set but PROFILE_API_TOKEN / profile_api_token is missing"
                    .to_string(),
            )
        })?;
        let api = ProfileApiClient::new(config.resolve_profile_api_url())?;
        let ws_url = api.launch(&token, &profile_id).await?;
        return BrowserSession::connect(&ws_url).await;
    }
    if let Some(endpoint) = config.resolve_cdp_endpoint() {
        return BrowserSession::connect(&endpoint).await;
    }
    BrowserSession::launch_visible(config.resolve_viewport()).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = load_scout_config();
    apply_cli_overrides(&mut config, &args);

    let url_list = config.resolve_url_list_path();
    let urls = read_url_list(&url_list).await?;
    if urls.is_empty() {
        info!("no URLs in {}; nothing to do", url_list.display());
        return Ok(());
    }
    info!("{} URLs loaded from {}", urls.len(), url_list.display());

    let browser = match acquire_browser(&config).await {
        Ok(b) => b,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    let page = browser.open_page().await?;

    let alt_fetcher = if config.resolve_alt_fetch_enabled() {
        Some(AltFetcher::new()?)
    } else {
        None
    };
    let options = VisitOptions {
        output_dir: config.resolve_output_dir(),
        navigation_timeout: config.resolve_navigation_timeout(),
        viewport: config.resolve_viewport(),
        zoom: config.resolve_page_zoom(),
    };
    let policy = CapturePolicy::from_config(&config);
    info!(
        "relevance policy: {}, output: {}",
        policy.gate.policy.as_str(),
        options.output_dir.display()
    );

    let (signals, inbox) = operator_channels();
    let listener = KeyListener::start(signals.clone());
    let report = run_urls(&page, &urls, policy, signals, inbox, alt_fetcher, options).await;
    listener.stop();
    browser.close().await;

    if report.failed > 0 {
        error!("{} of {} visits failed", report.failed, urls.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flag_forms() {
        let a = args(&["catalog-scout", "--urls", "list.txt", "--out=dump", "--cdp"]);
        assert_eq!(flag_value(&a, "--urls").as_deref(), Some("list.txt"));
        assert_eq!(flag_value(&a, "--out").as_deref(), Some("dump"));
        assert_eq!(flag_value(&a, "--cdp"), None);
        assert_eq!(flag_value(&a, "--profile"), None);
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = ScoutConfig {
            output_dir: Some("from-file".to_string()),
            ..ScoutConfig::default()
        };
        let cli = args(&["x", "--out", "from-cli", "--policy", "blocklist"]);
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.output_dir.as_deref(), Some("from-cli"));
        assert_eq!(config.relevance_policy.as_deref(), Some("blocklist"));
    }
}
