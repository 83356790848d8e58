//! On-disk layout for everything a visit produces.
//!
//! ```text
//! <out>/<host, ':' as '_'>/
//!     jsons/responses.json   ranked network results
//!     jsons/skeletons.json   shape of each ranked result's first JSON object
//!     jsons/browser.json     ranked scripts of the rendered page
//!     jsons/cc.json          ranked scripts of the alternate fetch
//!     htmls/browser.html
//!     htmls/cc.html
//!     apis/<path>.json       one raw body per captured exchange
//!     screenshots/<path>_<n>.png
//! ```

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use url::Url;

use crate::core::types::{CapturedExchange, RawBody};

/// Directory name for a URL's host, port included.
pub fn site_dir_name(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "unknown_host".to_string();
    };
    let host = parsed.host_str().unwrap_or("");
    if host.is_empty() {
        return "unknown_host".to_string();
    }
    match parsed.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host.replace(':', "_"),
    }
}

/// File stem for a URL path: ASCII alphanumerics and `._-` survive, anything
/// else becomes `_`. The root path maps to `index`.
pub fn path_file_stem(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let stem: String = path
        .trim_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "index".to_string()
    } else {
        stem
    }
}

/// `<dir>/<stem>_<n>.png` for the first `n >= 1` not already taken.
pub fn unique_screenshot_path(dir: &Path, stem: &str) -> PathBuf {
    (1..)
        .map(|i| dir.join(format!("{}_{}.png", stem, i)))
        .find(|p| !p.exists())
        .unwrap_or_else(|| dir.join(format!("{}.png", stem)))
}

#[derive(Debug, Clone)]
pub struct SiteLayout {
    root: PathBuf,
}

impl SiteLayout {
    pub fn for_url(output_dir: &Path, url: &str) -> Self {
        Self {
            root: output_dir.join(site_dir_name(url)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jsons(&self) -> PathBuf {
        self.root.join("jsons")
    }

    pub fn htmls(&self) -> PathBuf {
        self.root.join("htmls")
    }

    pub fn apis(&self) -> PathBuf {
        self.root.join("apis")
    }

    pub fn screenshots(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    pub async fn create_dirs(&self) -> Result<()> {
        for dir in [self.jsons(), self.htmls(), self.apis(), self.screenshots()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| anyhow!("failed to create {}: {}", dir.display(), e))?;
        }
        Ok(())
    }

    pub fn exchange_path(&self, exchange_url: &str) -> PathBuf {
        self.apis().join(format!("{}.json", path_file_stem(exchange_url)))
    }
}

async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))
}

/// Pretty-printed JSON, e.g. a ranked result set.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_file(path, json).await
}

pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    write_file(path, text).await
}

/// Shape of `value`: objects keep every key, arrays keep only their first
/// element, scalars stay as they are.
pub fn json_skeleton(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_skeleton(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.first().map(json_skeleton).into_iter().collect()),
        scalar => scalar.clone(),
    }
}

/// Raw body of one exchange: pretty JSON when it parses, the text otherwise.
pub async fn write_exchange(layout: &SiteLayout, exchange: &CapturedExchange) -> Result<PathBuf> {
    let path = layout.exchange_path(&exchange.url);
    let contents = match &exchange.raw_body {
        RawBody::Json(value) => serde_json::to_string_pretty(value)?,
        RawBody::Text(text) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => serde_json::to_string_pretty(&value)?,
            Err(_) => text.clone(),
        },
    };
    write_file(&path, contents).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_json_skeleton_keeps_first_array_element() {
        let listing = json!({
            "total": 3,
            "items": [
                {"sku": "A", "tags": ["x", "y"], "price": 1},
                {"sku": "B", "tags": [], "price": 2},
                {"sku": "C", "price": 3}
            ],
            "empty": []
        });
        assert_eq!(
            json_skeleton(&listing),
            json!({
                "total": 3,
                "items": [{"sku": "A", "tags": ["x"], "price": 1}],
                "empty": []
            })
        );
        assert_eq!(json_skeleton(&json!([[1, 2], [3]])), json!([[1]]));
        assert_eq!(json_skeleton(&json!("plain")), json!("plain"));
    }

    #[test]
    fn test_site_dir_name() {
        assert_eq!(site_dir_name("https://shop.example.com/a"), "shop.example.com");
        assert_eq!(site_dir_name("http://localhost:8080/x"), "localhost_8080");
        assert_eq!(site_dir_name("nonsense"), "unknown_host");
    }

    #[test]
    fn test_path_file_stem() {
        assert_eq!(path_file_stem("https://x.com/api/v2/products?page=1"), "api_v2_products");
        assert_eq!(path_file_stem("https://x.com/"), "index");
        assert_eq!(path_file_stem("https://x.com"), "index");
        assert_eq!(path_file_stem("https://x.com/a b/c.json"), "a_20b_c.json");
    }

    #[test]
    fn test_unique_screenshot_path_skips_taken() {
        let dir = scratch_dir("shots");
        assert_eq!(unique_screenshot_path(&dir, "index"), dir.join("index_1.png"));
        std::fs::write(dir.join("index_1.png"), b"x").unwrap();
        std::fs::write(dir.join("index_2.png"), b"x").unwrap();
        assert_eq!(unique_screenshot_path(&dir, "index"), dir.join("index_3.png"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_write_exchange_pretty_and_raw() {
        let dir = scratch_dir("apis");
        let layout = SiteLayout::for_url(&dir, "https://shop.example.com/");
        layout.create_dirs().await.unwrap();

        let mut exchange = CapturedExchange {
            url: "https://shop.example.com/api/items".to_string(),
            method: "GET".to_string(),
            content_type: "application/json".to_string(),
            status_code: 200,
            raw_body: RawBody::Json(json!({"sku": "A"})),
            captured_at: Utc::now(),
        };
        let path = write_exchange(&layout, &exchange).await.unwrap();
        assert!(path.ends_with("apis/api_items.json"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&written).unwrap(),
            json!({"sku": "A"})
        );

        exchange.url = "https://shop.example.com/app.js".to_string();
        exchange.raw_body = RawBody::Text("var a = 1;".to_string());
        let path = write_exchange(&layout, &exchange).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "var a = 1;");
        std::fs::remove_dir_all(&dir).ok();
    }
}
