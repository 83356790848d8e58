use std::path::PathBuf;
use std::time::Duration;

use crate::filters::{BodyGate, RelevancePolicy};

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (catalog-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "CATALOG_SCOUT_CONFIG";
pub const ENV_URL_LIST: &str = "CATALOG_SCOUT_URLS";
pub const ENV_OUTPUT_DIR: &str = "CATALOG_SCOUT_OUTPUT";
pub const ENV_NAV_TIMEOUT_SECS: &str = "CATALOG_SCOUT_NAV_TIMEOUT_SECS";
pub const ENV_URL_THRESHOLD: &str = "CATALOG_SCOUT_URL_THRESHOLD";
pub const ENV_RELEVANCE_POLICY: &str = "CATALOG_SCOUT_RELEVANCE_POLICY";
pub const ENV_BODY_GATE: &str = "CATALOG_SCOUT_BODY_GATE";
pub const ENV_BODY_THRESHOLD: &str = "CATALOG_SCOUT_BODY_THRESHOLD";
pub const ENV_ALT_FETCH: &str = "CATALOG_SCOUT_ALT_FETCH";
pub const ENV_PROFILE_API_URL: &str = "PROFILE_API_URL";
pub const ENV_PROFILE_ID: &str = "PROFILE_ID";
pub const ENV_PROFILE_API_TOKEN: &str = "PROFILE_API_TOKEN";
pub const ENV_CDP_ENDPOINT: &str = "CDP_ENDPOINT";

/// Top-level config loaded from `catalog-scout.json`.
///
/// Every field is optional; the `resolve_*` methods apply
/// JSON field → env var → built-in default.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    /// One target URL per line.
    pub url_list_path: Option<String>,
    /// Root of the per-domain output tree.
    pub output_dir: Option<String>,
    pub navigation_timeout_secs: Option<u64>,
    /// Minimum URL score for a response to be captured. Tunable, not a law.
    pub url_threshold: Option<f64>,
    /// `scored` (weighted keywords only) or `blocklist` (tracker blocklist first).
    pub relevance_policy: Option<String>,
    /// `off`, `keywords` (distinct keyword count) or `weighted` (product-data detector).
    pub body_gate: Option<String>,
    pub body_threshold: Option<f64>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    /// CSS zoom applied to `document.body` before navigation, e.g. `"70%"`.
    pub page_zoom: Option<String>,
    pub profile_api_url: Option<String>,
    pub profile_id: Option<String>,
    /// Never logged.
    pub profile_api_token: Option<String>,
    /// Explicit `ws://` DevTools endpoint of an already running browser.
    pub cdp_endpoint: Option<String>,
    pub alt_fetch_enabled: Option<bool>,
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ScoutConfig {
    /// URL list path: JSON field → `CATALOG_SCOUT_URLS` → `urls.txt`.
    pub fn resolve_url_list_path(&self) -> PathBuf {
        non_empty(&self.url_list_path)
            .or_else(|| env_trimmed(ENV_URL_LIST))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("urls.txt"))
    }

    /// Output root: JSON field → `CATALOG_SCOUT_OUTPUT` → `websites`.
    pub fn resolve_output_dir(&self) -> PathBuf {
        non_empty(&self.output_dir)
            .or_else(|| env_trimmed(ENV_OUTPUT_DIR))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("websites"))
    }

    /// Navigation bound: JSON field → `CATALOG_SCOUT_NAV_TIMEOUT_SECS` → 60s.
    pub fn resolve_navigation_timeout(&self) -> Duration {
        let secs = self
            .navigation_timeout_secs
            .or_else(|| env_trimmed(ENV_NAV_TIMEOUT_SECS).and_then(|v| v.parse().ok()))
            .unwrap_or(60);
        Duration::from_secs(secs.max(1))
    }

    /// URL threshold: JSON field → `CATALOG_SCOUT_URL_THRESHOLD` → 4.0.
    pub fn resolve_url_threshold(&self) -> f64 {
        self.url_threshold
            .or_else(|| env_trimmed(ENV_URL_THRESHOLD).and_then(|v| v.parse().ok()))
            .unwrap_or(crate::filters::url_relevance::DEFAULT_THRESHOLD)
    }

    /// Relevance policy: JSON field → `CATALOG_SCOUT_RELEVANCE_POLICY` → scored.
    ///
    /// Unknown values log a warning and fall back to the default.
    pub fn resolve_relevance_policy(&self) -> RelevancePolicy {
        let raw = non_empty(&self.relevance_policy).or_else(|| env_trimmed(ENV_RELEVANCE_POLICY));
        match raw {
            None => RelevancePolicy::Scored,
            Some(v) => RelevancePolicy::parse_str(&v).unwrap_or_else(|| {
                tracing::warn!("unknown relevance_policy '{}', using 'scored'", v);
                RelevancePolicy::Scored
            }),
        }
    }

    /// Body gate: JSON field → `CATALOG_SCOUT_BODY_GATE` → off. The threshold comes
    /// from `body_threshold` → `CATALOG_SCOUT_BODY_THRESHOLD` → 4.
    pub fn resolve_body_gate(&self) -> BodyGate {
        let threshold = self
            .body_threshold
            .or_else(|| env_trimmed(ENV_BODY_THRESHOLD).and_then(|v| v.parse().ok()))
            .unwrap_or(4.0);
        let raw = non_empty(&self.body_gate).or_else(|| env_trimmed(ENV_BODY_GATE));
        match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("off") | Some("none") => BodyGate::Off,
            Some("keywords") => BodyGate::KeywordCount(threshold.max(0.0).ceil() as usize),
            Some("weighted") => BodyGate::Weighted(threshold),
            Some(other) => {
                tracing::warn!("unknown body_gate '{}', gate disabled", other);
                BodyGate::Off
            }
        }
    }

    pub fn resolve_viewport(&self) -> (u32, u32) {
        (
            self.viewport_width.unwrap_or(1280),
            self.viewport_height.unwrap_or(1120),
        )
    }

    pub fn resolve_page_zoom(&self) -> String {
        non_empty(&self.page_zoom).unwrap_or_else(|| "70%".to_string())
    }

    /// Profile service base URL: JSON field → `PROFILE_API_URL` → `http://localhost:3001`.
    pub fn resolve_profile_api_url(&self) -> String {
        non_empty(&self.profile_api_url)
            .or_else(|| env_trimmed(ENV_PROFILE_API_URL))
            .unwrap_or_else(|| "http://localhost:3001".to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn resolve_profile_id(&self) -> Option<String> {
        non_empty(&self.profile_id).or_else(|| env_trimmed(ENV_PROFILE_ID))
    }

    pub fn resolve_profile_api_token(&self) -> Option<String> {
        non_empty(&self.profile_api_token).or_else(|| env_trimmed(ENV_PROFILE_API_TOKEN))
    }

    pub fn resolve_cdp_endpoint(&self) -> Option<String> {
        non_empty(&self.cdp_endpoint).or_else(|| env_trimmed(ENV_CDP_ENDPOINT))
    }

    /// Alternate fetch: JSON field → `CATALOG_SCOUT_ALT_FETCH` ("0" disables) → true.
    pub fn resolve_alt_fetch_enabled(&self) -> bool {
        if let Some(b) = self.alt_fetch_enabled {
            return b;
        }
        env_trimmed(ENV_ALT_FETCH)
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true)
    }
}

/// Load `catalog-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `CATALOG_SCOUT_CONFIG` env var path
/// 2. `./catalog-scout.json`
/// 3. `~/.catalog-scout/catalog-scout.json`
///
/// Missing file → `ScoutConfig::default()` (silent, all env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![PathBuf::from("catalog-scout.json")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".catalog-scout").join("catalog-scout.json"));
    }
    if let Some(env_path) = env_trimmed(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match parse_scout_config(&contents) {
            Ok(cfg) => {
                tracing::info!("catalog-scout.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "catalog-scout.json parse error at {}: {}; using defaults",
                    path.display(),
                    e
                );
                ScoutConfig::default()
            }
        };
    }

    ScoutConfig::default()
}

pub fn parse_scout_config(contents: &str) -> Result<ScoutConfig, serde_json::Error> {
    serde_json::from_str(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_values_take_precedence() {
        let cfg = parse_scout_config(
            r#"{
                "url_list_path": "targets.txt",
                "output_dir": "out",
                "navigation_timeout_secs": 15,
                "url_threshold": 6.5,
                "relevance_policy": "blocklist",
                "body_gate": "weighted",
                "body_threshold": 5,
                "alt_fetch_enabled": false
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.resolve_url_list_path(), PathBuf::from("targets.txt"));
        assert_eq!(cfg.resolve_output_dir(), PathBuf::from("out"));
        assert_eq!(cfg.resolve_navigation_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.resolve_url_threshold(), 6.5);
        assert_eq!(cfg.resolve_relevance_policy(), RelevancePolicy::BlocklistThenScored);
        assert_eq!(cfg.resolve_body_gate(), BodyGate::Weighted(5.0));
        assert!(!cfg.resolve_alt_fetch_enabled());
    }

    #[test]
    fn test_keyword_gate_rounds_threshold_up() {
        let cfg =
            parse_scout_config(r#"{"body_gate": "keywords", "body_threshold": 3.2}"#).unwrap();
        assert_eq!(cfg.resolve_body_gate(), BodyGate::KeywordCount(4));
    }

    #[test]
    fn test_blank_strings_fall_through() {
        let cfg = parse_scout_config(r#"{"profile_api_url": "  ", "page_zoom": ""}"#).unwrap();
        assert_eq!(cfg.resolve_page_zoom(), "70%");
        assert!(cfg.resolve_profile_api_url().starts_with("http"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        assert!(parse_scout_config(r#"{"something_else": 1}"#).is_ok());
        assert!(parse_scout_config("not json").is_err());
    }
}
